mod api;
mod cart;
mod cli;
mod config;
mod logging;
mod search;
mod tui;

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser};
use dotenvy::dotenv;
use tracing::info;

use crate::config::{AppConfig, CliOverrides};
use crate::logging::LogTarget;
use crate::tui::TuiApp;
use crate::tui::commands::ShopExecutor;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "shopmux",
    version,
    about = "Search several online shops at once and manage the shared cart"
)]
pub struct Cli {
    /// Use plain line mode (disable TUI)
    #[arg(long, action = ArgAction::SetTrue)]
    no_tui: bool,

    /// Aggregator API origin, e.g. http://127.0.0.1:5000
    #[arg(long)]
    base_url: Option<String>,

    /// Log level (error,warn,info,debug,trace)
    #[arg(long)]
    log_level: Option<String>,

    /// Log file path
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log to stderr instead of a file (line mode only)
    #[arg(long, action = ArgAction::SetTrue)]
    log_stderr: bool,

    /// Period between result updates, in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Show only the initial search response
    #[arg(long, action = ArgAction::SetTrue)]
    no_poll: bool,

    /// Explicit config file
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            base_url: self.base_url.clone(),
            poll_interval_ms: self.poll_interval_ms,
            no_poll: self.no_poll,
            log_level: self.log_level.clone(),
            log_file: self.log_file.clone(),
            config_path: self.config.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let cfg = AppConfig::from_cli(&cli)?;
    let target = if cli.log_stderr && cli.no_tui {
        LogTarget::Stderr
    } else {
        LogTarget::File(&cfg.log_file)
    };
    logging::init_logging(&cfg.log_level, target)?;
    info!(?cfg, "app config");

    if cli.no_tui {
        cli::run_cli_loop(cfg).await
    } else {
        // The event loop polls the terminal synchronously.
        tokio::task::block_in_place(|| run_tui(cfg))
    }
}

fn run_tui(cfg: AppConfig) -> Result<()> {
    let executor = ShopExecutor::from_config(&cfg)?;
    executor.load_cart();
    let mut app = TuiApp::new(
        format!("shopmux - {} - /help, Ctrl+C twice to exit", cfg.base_url),
        &cfg.theme,
    )
    .with_handler(Box::new(executor));
    app.push_log("Type a query and press Enter to search all shops");
    app.run()
}
