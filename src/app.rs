use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::infrastructure::bootstrap::build_state;
use crate::infrastructure::config::Settings;
use crate::interfaces::http::start_server;

pub async fn run() -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let settings = Settings::load().map_err(|err| {
        error!(error = %err, "Failed to load configuration");
        std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string())
    })?;

    let host = settings.server.host.clone();
    let port = settings.server.port;
    let state = build_state(settings);

    info!(host = %host, port, "Starting HTTP server");
    start_server(state)?.await
}
