//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::accounts::AccountService;
use crate::security::TokenIssuer;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountService,
    /// Verifies bearer tokens on protected routes.
    pub tokens: Arc<TokenIssuer>,
}
