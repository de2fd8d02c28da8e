//! veg CLI - vegetation plot surveys and canopy photo analysis.

use clap::Parser;
use std::time::Duration;
use veg_model::client::ClientConfig;

#[derive(Parser)]
#[command(
    name = "veg-cli",
    version,
    about = "Vegetation field data toolkit"
)]
struct Cli {
    /// SQLite database file (":memory:" for a throwaway store)
    #[arg(long, global = true, env = "VEG_DB", default_value = "veg.sqlite3")]
    db: String,

    /// Base URL of the canopy analysis service
    #[arg(long, global = true, env = "VEG_API_BASE_URL", default_value = "http://localhost:8000")]
    api_base_url: String,

    /// Request timeout for the analysis service
    #[arg(long, global = true, env = "VEG_API_TIMEOUT_SECS", default_value_t = 60)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: veg_cmd::Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let settings = veg_cmd::Settings {
        db_path: cli.db,
        client: ClientConfig {
            api_base_url: cli.api_base_url,
            timeout: Duration::from_secs(cli.timeout_secs),
        },
    };
    log::debug!("using database {}", settings.db_path);
    veg_cmd::run(cli.command, &settings).await
}
