use anyhow::Result;
use clap::Parser;
use mrkv::cmd::worker::{Args, Commands};
use mrkv::config::{Config, Endpoints};
use mrkv::worker::{run_mapper, run_reducer};
use mrkv::workload;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    match args.command {
        Commands::Map(task) => {
            let config = Config::load(&task.config)?;
            let endpoints = Endpoints { master: task.master, kv_store: task.kv_store };
            run_mapper(task.id, endpoints, workload::select(&config)?).await
        }
        Commands::Reduce(task) => {
            let config = Config::load(&task.config)?;
            let endpoints = Endpoints { master: task.master, kv_store: task.kv_store };
            run_reducer(task.id, config.reducer_count, endpoints, workload::select(&config)?).await
        }
    }
}
