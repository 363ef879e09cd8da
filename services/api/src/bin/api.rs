//! services/api/src/bin/api.rs

use accounts_core::ports::{AccountStore, Mailer};
use api_lib::{
    accounts::{AccountService, Links},
    adapters::{DbAdapter, LogMailer, MemoryAccountStore, SmtpMailer},
    config::Config,
    error::ApiError,
    security::TokenIssuer,
    telemetry,
    web::{self, AppState},
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    telemetry::init(&config.log_filter, config.log_format)?;
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    let (store, pool): (Arc<dyn AccountStore>, Option<PgPool>) = match &config.database_url {
        Some(url) => {
            info!("Connecting to database...");
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await?;
            let db_adapter = DbAdapter::new(pool.clone());
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            (Arc::new(db_adapter), Some(pool))
        }
        None => {
            warn!("DATABASE_URL is not set, accounts are kept in memory and lost on exit");
            (Arc::new(MemoryAccountStore::new()), None)
        }
    };

    // --- 3. Initialize Service Adapters ---
    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => {
            info!(host = %smtp.host, port = smtp.port, "Sending mail through SMTP");
            Arc::new(SmtpMailer::new(smtp)?)
        }
        None => {
            warn!("SMTP_HOST is not set, outgoing mail is only logged");
            Arc::new(LogMailer)
        }
    };

    let tokens = Arc::new(TokenIssuer::new(
        config.jwt.issuer.clone(),
        &config.jwt.secret,
        config.jwt.access_token_ttl,
        config.jwt.refresh_token_ttl,
    )?);
    let links = Links::new(&config.external_url, &config.frontend_password_reset_path);

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        accounts: AccountService::new(store, mailer, tokens.clone(), links),
        tokens,
    });

    // --- 5. Create the Web Router ---
    let app = web::router(app_state, config.request_timeout);

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // --- 7. Release Resources ---
    if let Some(pool) = pool {
        info!("Closing database pool...");
        if tokio::time::timeout(config.shutdown_timeout, pool.close()).await.is_err() {
            warn!(
                timeout_secs = config.shutdown_timeout.as_secs(),
                "Database pool did not close in time"
            );
        }
    }
    info!("Gracefully shut down");

    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
