use std::path::PathBuf;
use std::process::ExitCode;

use jemallocator::Jemalloc;
use tracing::error;
use tracing_subscriber::EnvFilter;

use retail_insights::{Dashboard, DashboardConfig, TextRenderer};

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

/// Runs one dashboard cycle against the configured source, printing as
/// plain text. An optional argument names the configuration file,
/// otherwise `dashboard.toml` is picked up when present.
fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match DashboardConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!("failed to load configuration: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let mut dashboard = Dashboard::new(config, TextRenderer::new());
    match dashboard.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("dashboard cycle failed: {}", err);
            ExitCode::FAILURE
        }
    }
}
