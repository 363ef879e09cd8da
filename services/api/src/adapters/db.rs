//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `AccountStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! Every lifecycle transition is one conditional `UPDATE ... RETURNING`: the
//! `WHERE` clause is the guard, so concurrent callers on the same token see a
//! single winner and everyone else gets no row back.

use accounts_core::domain::Account;
use accounts_core::ports::{AccountStore, PortError, PortResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `AccountStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct AccountRecord {
    id: Uuid,
    email: String,
    password: String,
    activation_token: Option<Uuid>,
    password_reset_token: Option<Uuid>,
    activated_at: Option<DateTime<Utc>>,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl AccountRecord {
    fn to_domain(self) -> Account {
        Account {
            id: self.id,
            email: self.email,
            password_hash: self.password,
            activation_token: self.activation_token,
            password_reset_token: self.password_reset_token,
            activated_at: self.activated_at,
            active: self.active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Maps driver errors onto port errors by kind.
fn to_port_error(e: sqlx::Error) -> PortError {
    match &e {
        sqlx::Error::RowNotFound => PortError::NotFound("account not found".to_string()),
        sqlx::Error::Database(db)
            if db.is_unique_violation() && db.constraint() == Some("users_email_key") =>
        {
            PortError::DuplicateEmail
        }
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn not_found(what: &str) -> PortError {
    PortError::NotFound(what.to_string())
}

//=========================================================================================
// `AccountStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl AccountStore for DbAdapter {
    async fn create_account(&self, email: &str, password_hash: &str) -> PortResult<Account> {
        let record = sqlx::query_as::<_, AccountRecord>(
            "INSERT INTO users (email, password) VALUES ($1, $2) \
             RETURNING id, email, password, activation_token, password_reset_token, \
                       activated_at, active, created_at, updated_at",
        )
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(to_port_error)?;
        Ok(record.to_domain())
    }

    async fn activate_account(&self, activation_token: Uuid) -> PortResult<Account> {
        let record = sqlx::query_as::<_, AccountRecord>(
            "UPDATE users \
             SET active = TRUE, activation_token = NULL, activated_at = now(), updated_at = now() \
             WHERE active = FALSE AND activation_token = $1 \
             RETURNING id, email, password, activation_token, password_reset_token, \
                       activated_at, active, created_at, updated_at",
        )
        .bind(activation_token)
        .fetch_optional(&self.pool)
        .await
        .map_err(to_port_error)?;

        record
            .map(AccountRecord::to_domain)
            .ok_or_else(|| not_found("pending account for activation token"))
    }

    async fn find_account_by_email(&self, email: &str) -> PortResult<Account> {
        let record = sqlx::query_as::<_, AccountRecord>(
            "SELECT id, email, password, activation_token, password_reset_token, \
                    activated_at, active, created_at, updated_at \
             FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(to_port_error)?;

        record.map(AccountRecord::to_domain).ok_or_else(|| not_found("account for email"))
    }

    async fn find_account_by_id(&self, id: Uuid) -> PortResult<Account> {
        let record = sqlx::query_as::<_, AccountRecord>(
            "SELECT id, email, password, activation_token, password_reset_token, \
                    activated_at, active, created_at, updated_at \
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(to_port_error)?;

        record
            .map(AccountRecord::to_domain)
            .ok_or_else(|| PortError::NotFound(format!("Account {} not found", id)))
    }

    async fn issue_password_reset_token(&self, email: &str) -> PortResult<Account> {
        let record = sqlx::query_as::<_, AccountRecord>(
            "UPDATE users \
             SET password_reset_token = gen_random_uuid(), updated_at = now() \
             WHERE active = TRUE AND email = $1 \
             RETURNING id, email, password, activation_token, password_reset_token, \
                       activated_at, active, created_at, updated_at",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(to_port_error)?;

        record
            .map(AccountRecord::to_domain)
            .ok_or_else(|| not_found("active account for email"))
    }

    async fn consume_password_reset_token(
        &self,
        reset_token: Uuid,
        new_password_hash: &str,
    ) -> PortResult<Account> {
        let record = sqlx::query_as::<_, AccountRecord>(
            "UPDATE users \
             SET password = $2, password_reset_token = NULL, updated_at = now() \
             WHERE active = TRUE AND password_reset_token = $1 \
             RETURNING id, email, password, activation_token, password_reset_token, \
                       activated_at, active, created_at, updated_at",
        )
        .bind(reset_token)
        .bind(new_password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(to_port_error)?;

        record
            .map(AccountRecord::to_domain)
            .ok_or_else(|| not_found("active account for password reset token"))
    }
}
