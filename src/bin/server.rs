use std::{
    error::Error,
    fs::OpenOptions,
    io,
    net::{IpAddr, SocketAddr},
    path::Path,
    sync::Arc,
};

use axum::{
    Router,
    extract::{MatchedPath, Request},
};
use axum_server::Handle;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use rescue_ledger::{
    AdminInitConfig, AppState, Config, Database, PaginationConfig,
    auth::{AdminInitOutcome, PasswordHash, TokenManager, init_first_admin},
    build_router, graceful_shutdown,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = Config::parse();
    setup_logging(config.log_path.as_deref())?;
    tracing::debug!("starting with {config:?}");

    if config.tokens.jwt_secret.trim().is_empty() {
        return Err("JWT_SECRET must not be empty".into());
    }

    let database = Database::open(&config.database.db_path)?;
    tracing::info!("opened database at {:?}", database.path());

    if config.admin_init.admin_init_enabled {
        initialize_admin(&database, &config.admin_init)?;
    }

    let token_manager = TokenManager::new(
        &config.tokens.jwt_secret,
        config.tokens.access_token_ttl(),
        config.tokens.refresh_token_ttl(),
    );
    let state = AppState::new(
        database,
        token_manager,
        PaginationConfig::default(),
        PasswordHash::DEFAULT_COST,
    );

    let host: IpAddr = config.host.parse()?;
    let addr = SocketAddr::from((host, config.port));

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(build_router(state));

    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await?;

    Ok(())
}

fn initialize_admin(database: &Database, config: &AdminInitConfig) -> Result<(), Box<dyn Error>> {
    let mut connection = database.connect()?;

    let outcome = init_first_admin(
        &config.admin_init_phone,
        &config.admin_init_password,
        PasswordHash::DEFAULT_COST,
        &mut connection,
    )?;

    if outcome == AdminInitOutcome::AlreadyInitialized {
        tracing::info!("an admin already exists, skipping admin initialization");
    }

    Ok(())
}

fn setup_logging(log_path: Option<&Path>) -> Result<(), io::Error> {
    let stdout_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    let debug_log = match log_path {
        Some(log_path) => {
            let log_file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)?;

            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(log_file))
                    .with_filter(filter::LevelFilter::DEBUG),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stdout_log)
        .with(debug_log)
        .init();

    Ok(())
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // Errors are logged where they are turned into responses.
        .on_failure(());

    router.layer(tracing_layer)
}
