//! services/api/src/accounts.rs
//!
//! The account lifecycle orchestrator. Each operation handles one inbound request:
//! validate, run a single store transition, trigger the email side effect, and
//! hand back a snapshot. Errors leave here as an `AccountError`; the web layer
//! decides the status codes.

use accounts_core::domain::{Account, AccountState, SessionTokens};
use accounts_core::ports::{AccountStore, Mailer, PortError};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::security::{PasswordError, PasswordHasher, TokenIssuer};
use crate::validation;

//=========================================================================================
// Errors
//=========================================================================================

/// Outcome kinds of a failed account operation. The message is safe to show to
/// the client.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("{0}")]
    Conflict(&'static str),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Unauthorized(&'static str),
    /// Details are logged where the failure happens, never returned.
    #[error("internal server error")]
    Internal,
}

/// Logs a downstream failure and collapses it into `AccountError::Internal`.
fn internal(context: &str, err: impl Display) -> AccountError {
    warn!(error = %err, "{}", context);
    AccountError::Internal
}

//=========================================================================================
// Links
//=========================================================================================

/// Builds the links mailed to users.
#[derive(Clone, Debug)]
pub struct Links {
    base_url: String,
    password_reset_path: String,
}

impl Links {
    pub fn new(base_url: &str, password_reset_path: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            password_reset_path: password_reset_path.trim_matches('/').to_string(),
        }
    }

    pub fn activation(&self, token: Uuid) -> String {
        format!("{}/users/activate/{}", self.base_url, token)
    }

    pub fn password_reset(&self, token: Uuid) -> String {
        format!("{}/{}/{}", self.base_url, self.password_reset_path, token)
    }
}

//=========================================================================================
// The Service
//=========================================================================================

/// Stateless between requests; everything shared lives behind the ports.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn AccountStore>,
    mailer: Arc<dyn Mailer>,
    tokens: Arc<TokenIssuer>,
    hasher: PasswordHasher,
    links: Links,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn AccountStore>,
        mailer: Arc<dyn Mailer>,
        tokens: Arc<TokenIssuer>,
        links: Links,
    ) -> Self {
        Self {
            store,
            mailer,
            tokens,
            hasher: PasswordHasher::new(),
            links,
        }
    }

    /// Creates a pending account and mails its activation link.
    ///
    /// If the mail cannot be sent the account stays pending and the caller gets
    /// `Internal`.
    pub async fn register(&self, email: &str, password: &str) -> Result<Account, AccountError> {
        let email = checked_email(email)?;
        checked_new_password(password)?;

        let password_hash = self.hash_password(password).await?;
        let account = self
            .store
            .create_account(&email, &password_hash)
            .await
            .map_err(|e| match e {
                PortError::DuplicateEmail => AccountError::Conflict("already registered"),
                e => internal("create account", e),
            })?;

        let token = account
            .activation_token
            .ok_or_else(|| internal("create account", "new account has no activation token"))?;
        let link = self.links.activation(token);
        self.mailer
            .send(&account.email, "Account activation", &link)
            .await
            .map_err(|e| internal("send activation link", e))?;

        Ok(account)
    }

    /// Consumes an activation token. Unknown, consumed and malformed tokens are
    /// indistinguishable to the caller.
    pub async fn activate(&self, token: &str) -> Result<Account, AccountError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AccountError::Validation("empty activation token"));
        }
        let token = Uuid::parse_str(token).map_err(|_| AccountError::NotFound("invalid activation token"))?;

        self.store.activate_account(token).await.map_err(|e| match e {
            PortError::NotFound(_) => AccountError::NotFound("invalid activation token"),
            e => internal("activate account", e),
        })
    }

    /// Checks credentials and issues a session token pair tagged with
    /// `correlation_id`.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        correlation_id: &str,
    ) -> Result<(Account, SessionTokens), AccountError> {
        let email = checked_email(email)?;
        if password.is_empty() {
            return Err(AccountError::Validation("empty password"));
        }

        let account = match self.store.find_account_by_email(&email).await {
            Ok(account) => Some(account),
            Err(PortError::NotFound(_)) => None,
            Err(e) => return Err(internal("find account by email", e)),
        };

        let valid = match &account {
            Some(account) => self.verify_password(&account.password_hash, password).await?,
            None => self.verify_decoy(password).await?,
        };
        let account = match account {
            Some(account) if valid => account,
            _ => return Err(AccountError::Unauthorized("invalid credentials")),
        };

        // Only reported once the password is proven.
        if account.state() == AccountState::PendingActivation {
            return Err(AccountError::Unauthorized("account not activated"));
        }

        let tokens = self
            .tokens
            .issue_session_tokens(account.id, correlation_id)
            .map_err(|e| internal("issue session tokens", e))?;
        Ok((account, tokens))
    }

    /// Opens a reset window and mails the link. An unknown or inactive email
    /// succeeds silently.
    ///
    /// The mail is sent before returning so a delivery failure reaches the
    /// caller; known emails therefore answer slower than unknown ones.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AccountError> {
        let email = checked_email(email)?;

        let account = match self.store.issue_password_reset_token(&email).await {
            Ok(account) => account,
            Err(PortError::NotFound(_)) => {
                debug!("password reset requested for unknown or inactive account");
                return Ok(());
            }
            Err(e) => return Err(internal("issue password reset token", e)),
        };

        let token = account
            .password_reset_token
            .ok_or_else(|| internal("issue password reset token", "account has no reset token"))?;
        let link = self.links.password_reset(token);
        self.mailer
            .send(&account.email, "Password reset", &link)
            .await
            .map_err(|e| internal("send password reset link", e))
    }

    /// Replaces the password of the account holding `reset_token`. No session is
    /// issued.
    pub async fn reset_password(&self, reset_token: &str, password: &str) -> Result<Account, AccountError> {
        let reset_token = reset_token.trim();
        if reset_token.is_empty() {
            return Err(AccountError::Validation("empty password reset token"));
        }
        checked_new_password(password)?;
        let reset_token =
            Uuid::parse_str(reset_token).map_err(|_| AccountError::NotFound("invalid password reset token"))?;

        let password_hash = self.hash_password(password).await?;
        self.store
            .consume_password_reset_token(reset_token, &password_hash)
            .await
            .map_err(|e| match e {
                PortError::NotFound(_) => AccountError::NotFound("invalid password reset token"),
                e => internal("consume password reset token", e),
            })
    }

    pub fn check_password_strength(&self, password: &str) -> Result<u8, AccountError> {
        if password.is_empty() {
            return Err(AccountError::Validation("empty password"));
        }
        Ok(validation::password_strength(password))
    }

    pub async fn account(&self, id: Uuid) -> Result<Account, AccountError> {
        self.store.find_account_by_id(id).await.map_err(|e| match e {
            PortError::NotFound(_) => AccountError::NotFound("account not found"),
            e => internal("find account by id", e),
        })
    }

    // Argon2 is CPU bound; keep it off the async workers.

    async fn hash_password(&self, password: &str) -> Result<String, AccountError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| internal("hash password task", e))?
            .map_err(|e| match e {
                PasswordError::EmptyInput => AccountError::Validation("empty password"),
                e => internal("hash password", e),
            })
    }

    async fn verify_password(&self, hash: &str, password: &str) -> Result<bool, AccountError> {
        let hasher = self.hasher.clone();
        let (hash, password) = (hash.to_string(), password.to_string());
        tokio::task::spawn_blocking(move || hasher.verify(&hash, &password))
            .await
            .map_err(|e| internal("verify password task", e))
    }

    async fn verify_decoy(&self, password: &str) -> Result<bool, AccountError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.verify_decoy(&password))
            .await
            .map_err(|e| internal("verify password task", e))
    }
}

//=========================================================================================
// Input Checks
//=========================================================================================

fn checked_email(raw: &str) -> Result<String, AccountError> {
    let email = validation::normalize_email(raw);
    if email.is_empty() {
        return Err(AccountError::Validation("empty email"));
    }
    if !validation::is_valid_email(&email) {
        return Err(AccountError::Validation("invalid email"));
    }
    Ok(email)
}

fn checked_new_password(password: &str) -> Result<(), AccountError> {
    if password.is_empty() {
        return Err(AccountError::Validation("empty password"));
    }
    if validation::is_weak_password(password) {
        return Err(AccountError::Validation("weak password"));
    }
    Ok(())
}
