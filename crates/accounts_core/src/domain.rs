//! crates/accounts_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// An immutable snapshot of a persisted account.
///
/// Only the account store creates these; every other component receives a
/// copy and never writes back through it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    /// Encoded one-way hash of the current password.
    pub password_hash: String,
    /// Present only while the account awaits activation.
    pub activation_token: Option<Uuid>,
    /// Present only while a password reset is open.
    pub password_reset_token: Option<Uuid>,
    pub activated_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Lifecycle position of an account, derived from its markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountState {
    PendingActivation,
    Active,
    ActiveResetPending,
}

impl Account {
    pub fn state(&self) -> AccountState {
        match (self.active, self.password_reset_token.is_some()) {
            (false, _) => AccountState::PendingActivation,
            (true, false) => AccountState::Active,
            (true, true) => AccountState::ActiveResetPending,
        }
    }
}

/// The bearer-token pair handed out on a successful login.
///
/// Not persisted; both tokens share the `jti` of the request that issued them.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Claims carried by both session tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub issuer: String,
    pub subject: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub not_before: Option<DateTime<Utc>>,
    /// Correlation id of the login request.
    pub jti: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(active: bool, reset: bool) -> Account {
        Account {
            id: Uuid::new_v4(),
            email: "john.doe@sixpack.com".to_string(),
            password_hash: String::new(),
            activation_token: (!active).then(Uuid::new_v4),
            password_reset_token: reset.then(Uuid::new_v4),
            activated_at: active.then(Utc::now),
            active,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn state_follows_markers() {
        assert_eq!(account(false, false).state(), AccountState::PendingActivation);
        assert_eq!(account(true, false).state(), AccountState::Active);
        assert_eq!(account(true, true).state(), AccountState::ActiveResetPending);
    }

    #[test]
    fn pending_account_holds_activation_token() {
        let pending = account(false, false);
        assert_eq!(pending.state(), AccountState::PendingActivation);
        assert!(pending.activation_token.is_some());

        let active = account(true, false);
        assert!(active.activation_token.is_none());
    }
}
