//! crates/accounts_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or SMTP.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::Account;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// No row matched the lookup or the conditional transition.
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The email is already held by another account.
    #[error("Duplicate email")]
    DuplicateEmail,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Owns persisted accounts and every lifecycle transition between them.
///
/// Each method is a single atomic conditional write (or a plain read). Callers
/// racing on the same token or email see at most one success; the rest get
/// `NotFound` or `DuplicateEmail`.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Inserts a pending account with a fresh activation token.
    async fn create_account(&self, email: &str, password_hash: &str) -> PortResult<Account>;

    /// Consumes an activation token of a not-yet-active account.
    async fn activate_account(&self, activation_token: Uuid) -> PortResult<Account>;

    async fn find_account_by_email(&self, email: &str) -> PortResult<Account>;

    async fn find_account_by_id(&self, id: Uuid) -> PortResult<Account>;

    /// Assigns a fresh reset token to the active account holding `email`.
    async fn issue_password_reset_token(&self, email: &str) -> PortResult<Account>;

    /// Replaces the password hash of the active account holding `reset_token`
    /// and clears the token.
    async fn consume_password_reset_token(
        &self,
        reset_token: Uuid,
        new_password_hash: &str,
    ) -> PortResult<Account>;
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Sends a plain-text message to a single recipient.
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> PortResult<()>;
}
