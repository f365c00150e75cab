use std::sync::Arc;
use std::time::Instant;

use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use searcher::backend::HttpBackend;
use searcher::config::Settings;
use searcher::error::Result;
use searcher::preferences::Preferences;
use searcher::registry::SessionRegistry;
use searcher::server::{router, AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    if let Err(e) = run().await {
        warn!(error = %e, "searcher stopped");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config_path = std::env::args().nth(1);
    let settings = Settings::load(config_path.as_deref())?;
    let backend = Arc::new(HttpBackend::new(&settings)?);
    let preferences = Preferences::from_settings(settings.preference_db.as_deref(), settings.preference_ttl_months)?;
    let registry = Arc::new(SessionRegistry::new(backend, preferences, settings.timing()));

    let sweeper = Arc::clone(&registry);
    let period = settings.sweep_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            sweeper.sweep(Instant::now()).await;
        }
    });

    let app = router(AppState {
        registry,
        backend_url: settings.backend_url.clone(),
    });
    let listener = tokio::net::TcpListener::bind(&settings.listen).await?;
    info!(listen = %settings.listen, backend = %settings.backend_url, "searcher listening");
    axum::serve(listener, app).await?;
    Ok(())
}
