use tracing::error;
use tracing_subscriber::EnvFilter;

use routewatch::agent::Agent;
use routewatch::config::Config;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "routewatch.toml";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("ROUTEWATCH_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            std::process::exit(2);
        }
    };

    if let Err(err) = Agent::new(config).run().await {
        error!("agent failed: {err}");
        std::process::exit(1);
    }
}
