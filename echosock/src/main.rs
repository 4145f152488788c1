use anyhow::{anyhow, Context, Result};
use clap::Parser;
use echosock::app;
use echosock::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    echosock_server::logging::init_logging().map_err(|e| anyhow!(e))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build the tokio runtime")?;

    let executor = runtime.handle().clone();
    runtime.block_on(app::run(cli, executor))
}
