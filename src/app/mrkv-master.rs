use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use mrkv::cmd::master::Args;
use mrkv::config::Config;
use mrkv::master::{Master, ProcessLauncher};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mut config = Config::load(&args.config)?;
    if let Some(worker) = args.worker {
        config.worker_binary = Some(worker);
    }
    if let Some(timeout) = args.timeout {
        config.barrier_timeout_secs = Some(timeout);
    }

    let launcher = ProcessLauncher::from_config(&config, &args.config)?;
    let mut master = Master::new(Arc::new(config), launcher);
    let summary = master.run().await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
