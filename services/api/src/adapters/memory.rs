//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of the `AccountStore` port.
//!
//! Each operation runs under one short mutex section, which gives the same
//! at-most-one-winner behavior as the conditional updates of the database
//! adapter. The lock is never held across an `.await`.

use accounts_core::domain::{Account, AccountState};
use accounts_core::ports::{AccountStore, PortError, PortResult};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: Mutex<HashMap<Uuid, Account>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> PortResult<MutexGuard<'_, HashMap<Uuid, Account>>> {
        self.accounts
            .lock()
            .map_err(|_| PortError::Unexpected("account map lock poisoned".to_string()))
    }
}

/// A token no other account holds.
fn fresh_token(accounts: &HashMap<Uuid, Account>) -> Uuid {
    loop {
        let token = Uuid::new_v4();
        let taken = accounts
            .values()
            .any(|a| a.activation_token == Some(token) || a.password_reset_token == Some(token));
        if !taken {
            return token;
        }
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn create_account(&self, email: &str, password_hash: &str) -> PortResult<Account> {
        let mut accounts = self.lock()?;
        if accounts.values().any(|a| a.email == email) {
            return Err(PortError::DuplicateEmail);
        }

        let account = Account {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            activation_token: Some(fresh_token(&accounts)),
            password_reset_token: None,
            activated_at: None,
            active: false,
            created_at: Utc::now(),
            updated_at: None,
        };
        accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn activate_account(&self, activation_token: Uuid) -> PortResult<Account> {
        let mut accounts = self.lock()?;
        let account = accounts
            .values_mut()
            .find(|a| {
                a.state() == AccountState::PendingActivation && a.activation_token == Some(activation_token)
            })
            .ok_or_else(|| PortError::NotFound("pending account for activation token".to_string()))?;

        let now = Utc::now();
        account.active = true;
        account.activation_token = None;
        account.activated_at = Some(now);
        account.updated_at = Some(now);
        Ok(account.clone())
    }

    async fn find_account_by_email(&self, email: &str) -> PortResult<Account> {
        self.lock()?
            .values()
            .find(|a| a.email == email)
            .cloned()
            .ok_or_else(|| PortError::NotFound("account for email".to_string()))
    }

    async fn find_account_by_id(&self, id: Uuid) -> PortResult<Account> {
        self.lock()?
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Account {} not found", id)))
    }

    async fn issue_password_reset_token(&self, email: &str) -> PortResult<Account> {
        let mut accounts = self.lock()?;
        let token = fresh_token(&accounts);
        let account = accounts
            .values_mut()
            .find(|a| a.state() != AccountState::PendingActivation && a.email == email)
            .ok_or_else(|| PortError::NotFound("active account for email".to_string()))?;

        account.password_reset_token = Some(token);
        account.updated_at = Some(Utc::now());
        Ok(account.clone())
    }

    async fn consume_password_reset_token(
        &self,
        reset_token: Uuid,
        new_password_hash: &str,
    ) -> PortResult<Account> {
        let mut accounts = self.lock()?;
        let account = accounts
            .values_mut()
            .find(|a| {
                a.state() == AccountState::ActiveResetPending && a.password_reset_token == Some(reset_token)
            })
            .ok_or_else(|| PortError::NotFound("active account for password reset token".to_string()))?;

        account.password_hash = new_password_hash.to_string();
        account.password_reset_token = None;
        account.updated_at = Some(Utc::now());
        Ok(account.clone())
    }
}
