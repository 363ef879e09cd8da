//! services/api/src/validation.rs
//!
//! Input checks applied before any state is touched: email normalization and
//! format, and password strength scoring.

use regex::Regex;
use std::sync::LazyLock;

/// Passwords scoring below this are rejected as weak.
pub const MIN_PASSWORD_STRENGTH: u8 = 3;

const MAX_EMAIL_LENGTH: usize = 254;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?\.)+[A-Za-z](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?$",
    )
    .expect("email pattern compiles")
});

/// Canonical form used for storage and lookup: trimmed and lower-cased.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= MAX_EMAIL_LENGTH && EMAIL_REGEX.is_match(email)
}

/// Scores a password from 0 (trivial) to 4 (very strong).
pub fn password_strength(password: &str) -> u8 {
    // A blank password is an error for zxcvbn; it is simply the weakest here.
    zxcvbn::zxcvbn(password, &[]).map(|entropy| entropy.score()).unwrap_or(0)
}

pub fn is_weak_password(password: &str) -> bool {
    password_strength(password) < MIN_PASSWORD_STRENGTH
}
