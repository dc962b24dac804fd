#![allow(clippy::result_large_err)]

use glam_booking::{
    api::{self, AppState},
    config::{
        database,
        env::{EnvSettings, IdentityMode},
        settings::{ShopSettings, load_default_config},
    },
    core::{catalog, token::TokenCodec},
    errors::{Error, Result},
    providers::{
        http_client,
        identity::{DevIdentityVerifier, IdentityVerifier, LineIdentityVerifier},
        payment::{OmiseClient, PaymentProvider},
    },
};
use dotenvy::dotenv;
use std::{path::Path, sync::Arc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load shop settings and catalog seed, then process environment
    let config = load_default_config()
        .inspect_err(|e| error!("Critical error loading config.toml: {}", e))?;
    let settings = ShopSettings::from_config(&config.shop)?;
    let env = EnvSettings::from_env().inspect_err(|e| error!("Invalid environment: {}", e))?;
    info!("Successfully processed application configuration.");

    // 4. Initialize database and seed the catalog
    ensure_sqlite_dir(&env.database_url)?;
    let db = database::create_connection(&env.database_url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;
    catalog::seed_catalog(&db, &config)
        .await
        .inspect_err(|e| error!("Failed to seed catalog: {}", e))?;

    // 5. External providers
    let client = http_client(env.upstream_timeout)?;
    let identity: Arc<dyn IdentityVerifier> = match (env.identity_mode, &env.line_channel_id) {
        (IdentityMode::Line, Some(channel_id)) => {
            Arc::new(LineIdentityVerifier::new(channel_id.clone(), client.clone()))
        }
        (IdentityMode::Line, None) => {
            return Err(Error::Config {
                message: "LINE_CHANNEL_ID must be set when IDENTITY_MODE=line".to_string(),
            });
        }
        (IdentityMode::Dev, _) => {
            warn!("IDENTITY_MODE=dev: bearer credentials are trusted as customer ids");
            Arc::new(DevIdentityVerifier)
        }
    };
    let payments = env.omise_secret_key.clone().map(|key| {
        Arc::new(OmiseClient::new(key, client.clone())) as Arc<dyn PaymentProvider>
    });
    if payments.is_none() {
        warn!("OMISE_SECRET_KEY not set, payment endpoints are disabled");
    }

    // 6. Serve
    let state = AppState {
        db: Arc::new(db),
        settings: Arc::new(settings),
        codec: Arc::new(TokenCodec::new(env.token_secret.clone())),
        identity,
        staff_api_key: Arc::from(env.staff_api_key.as_str()),
        payments,
    };
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&env.bind_addr)
        .await
        .inspect_err(|e| error!("Failed to bind {}: {}", env.bind_addr, e))?;
    info!("Listening on {}", env.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped.");
    Ok(())
}

/// Creates the parent directory of a file-backed `SQLite` database.
fn ensure_sqlite_dir(database_url: &str) -> Result<()> {
    let Some(path) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let file = path.split('?').next().unwrap_or_default();
    if let Some(parent) = Path::new(file).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received.");
}
