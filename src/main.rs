use anyhow::Result;
use clap::Parser;
use research_panel_rs::{cli, launch};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // .env 中的密钥与默认值
    dotenvy::dotenv().ok();

    let args = cli::Args::parse();
    let config = args.into_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    launch(&config).await
}
