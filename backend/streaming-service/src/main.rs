use actix_web::{middleware::Logger, App, HttpServer};
use anyhow::Context;
use jwt_security::SystemClock;
use std::sync::Arc;
use std::time::Duration;
use streaming_service::config::Config;
use streaming_service::db::{InMemoryUserStore, SharedUserStore};
use streaming_service::{routes, AppState};
use tracing::info;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,actix_web=info".into());
    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = Config::from_env().context("Failed to load configuration")?;
    let bind_addr = config.server.bind_addr();
    let sweep_every = Duration::from_secs(config.streaming.stream_timeout_secs);

    let store: SharedUserStore = Arc::new(InMemoryUserStore::new());
    let state = AppState::build(config, store, Arc::new(SystemClock))
        .context("Failed to initialize services")?;

    let maintenance = state.sweeper().spawn(sweep_every);

    info!(
        %bind_addr,
        rate_limit = state.config.rate_limit.max_requests,
        rate_window_secs = state.config.rate_limit.window_seconds,
        trust_proxy = state.config.rate_limit.trust_forwarded_headers,
        "Starting stream gatekeeper"
    );

    let server_state = state.clone();
    let served = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .configure(routes::configure(server_state.clone()))
    })
    .bind(&bind_addr)
    .with_context(|| format!("Failed to bind on {bind_addr}"))?
    .run()
    .await
    .context("HTTP server error");

    maintenance.shutdown().await;
    served
}
