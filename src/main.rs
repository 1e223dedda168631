use anyhow::Result;
use clap::Parser;
use smiffer_cli::cli;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = cli::Cli::parse();
    cli::run(args).await
}
