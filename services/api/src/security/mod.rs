pub mod password;
pub mod token;

pub use password::{PasswordError, PasswordHasher};
pub use token::{Clock, SystemClock, TokenError, TokenIssuer};
