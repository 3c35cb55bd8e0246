pub mod commands;
pub mod dispatch;

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "messages-web")]
#[command(version, about = "Send and read text messages through Messages for Web")]
#[command(
    long_about = "Drives Messages for Web in Chrome: pairs by QR code once, then restores the saved session to send messages and list conversations"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<commands::Command>,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Run Chrome in headless mode")]
    pub headless: Option<bool>,

    #[arg(long, global = true, help = "Chrome debugging port")]
    pub port: Option<u16>,

    #[arg(long, global = true, help = "Path to Chrome executable")]
    pub chrome_path: Option<PathBuf>,

    #[arg(long, global = true, help = "Navigation timeout in seconds")]
    pub timeout: Option<u64>,

    #[arg(long, global = true, help = "Path to credentials file")]
    pub credentials: Option<PathBuf>,
}

pub async fn run() -> crate::Result<()> {
    let cli = Cli::parse();

    let config = if let Some(config_path) = &cli.config {
        let content = std::fs::read_to_string(config_path)?;
        toml::from_str(&content)?
    } else {
        crate::config::Config::load()?
    };

    let overrides = crate::config::ConfigOverrides {
        headless: cli.headless,
        port: cli.port,
        json: cli.json.then_some(true),
        chrome_path: cli.chrome_path.clone(),
        timeout: cli.timeout,
        credentials: cli.credentials.clone(),
    };

    let config = Arc::new(config.load_with_overrides(overrides));
    config.validate()?;

    dispatch::dispatch(cli, config).await
}
