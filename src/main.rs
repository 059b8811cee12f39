mod buildlog;
mod cli;
mod config;
mod error;
mod harvest;
mod jenkins;
mod normalize;
mod output;
mod record;
mod store;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting OELens - Yocto build metrics harvester");
    cli.execute().await?;

    Ok(())
}
