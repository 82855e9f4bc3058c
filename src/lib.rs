pub mod api;
pub mod config;
pub mod content;
pub mod error;
pub mod limiter;
pub mod sanitize;
pub mod state;
pub mod views;

use tracing_subscriber::{EnvFilter, fmt::time::ChronoLocal};

use config::Config;
use state::AppState;

pub async fn run() -> error::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string()))
        .with_env_filter(EnvFilter::from_env("PRESSNOTE_LOG"))
        .init();

    let config = Config::load()?;
    tracing::info!(
        listen_addr = %config.listen_addr,
        cms = config.cms_base_url.as_deref().unwrap_or("<samples>"),
        revalidate_secs = config.revalidate_secs,
        "configuration loaded"
    );

    let app = AppState::from_config(&config)?;

    api::run_server(app, &config.listen_addr).await
}
