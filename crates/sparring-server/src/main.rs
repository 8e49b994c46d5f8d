use std::io;
use std::path::PathBuf;

use clap::Parser;
use sparring_server::logging::init_logging;
use sparring_server::{default_data_dir, resolve_store_path, run_server};

#[derive(Parser, Debug, Clone)]
#[command(name = "sparring-server")]
#[command(about = "Orchestrator for synthetic testing teammates")]
#[command(version)]
struct Cli {
    /// Enable debug mode
    #[arg(long, env = "DEBUG", default_value = "false")]
    debug: bool,

    /// Server port
    #[arg(long, env = "PORT", default_value = "8090")]
    port: u16,

    /// JSON config file (defaults to <data-dir>/config.json)
    #[arg(long, env = "SPARRING_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for the config file and SQLite database
    #[arg(long, env = "SPARRING_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (overrides debug flag)
    #[arg(long, env = "RUST_LOG")]
    log_level: Option<String>,
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    let cli = Cli::parse();

    if cli.log_level.is_some() {
        env_logger::init();
    } else {
        init_logging(cli.debug);
    }

    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| data_dir.join("config.json"));

    let config = sparring_core::load_config(&config_path)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    let config = resolve_store_path(config, &data_dir);

    if cli.debug {
        log::debug!("Debug mode enabled");
        log::debug!("  Port: {}", cli.port);
        log::debug!("  Data dir: {:?}", data_dir);
        log::debug!("  Config: {:?}", config);
    }

    run_server(cli.port, config).await
}
