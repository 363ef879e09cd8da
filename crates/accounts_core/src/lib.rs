pub mod domain;
pub mod ports;

pub use domain::{Account, AccountState, SessionTokens, TokenClaims};
pub use ports::{AccountStore, Mailer, PortError, PortResult};
