mod config;
mod error;
mod prompt;
mod relay;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use readingtype_core::Dictionary;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{api_key_from_env, ServiceConfig};
use crate::relay::Upstream;
use crate::routes::{router, AppState};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    init_tracing();
    let config = ServiceConfig::from_env()?;
    let dictionary = load_dictionary(&config)?;
    let upstream = match api_key_from_env() {
        Some(api_key) => {
            info!(url = %config.upstream.url, model = %config.upstream.model, "upstream configured");
            Some(Upstream::new(config.upstream.clone(), api_key)?)
        }
        None => {
            warn!("DEEPSEEK_API_KEY not configured, chat relay runs in demo mode");
            None
        }
    };
    let state = Arc::new(AppState::new(dictionary, upstream));
    let app = router(state);
    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8000".to_string())
        .parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening" = %addr);
    axum::serve(listener, app).await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// The dictionary lives for the whole process; handlers borrow it as `'static`.
fn load_dictionary(config: &ServiceConfig) -> anyhow::Result<&'static Dictionary> {
    let dictionary = match &config.dictionary.path {
        Some(path) => Dictionary::load(path)
            .with_context(|| format!("failed to load dictionary {}", path.display()))?,
        None => Dictionary::standard(),
    };
    let stats = dictionary.stats();
    info!(fields = stats.fields, values = stats.values, "dictionary loaded");
    Ok(Box::leak(Box::new(dictionary)))
}
