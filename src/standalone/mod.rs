//! A whole cluster in one process: the KV store on an ephemeral port, the
//! master, and every worker as a task.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::info;

use crate::config::{Config, OperationName};
use crate::kvstore::{KvClient, KvStoreServer};
use crate::master::{InProcessLauncher, Master, RunSummary};
use crate::workload;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a job described by a config file
    Run {
        /// Path to the JSON config
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Run a job on a directory of text files, staging under `output`
    Submit {
        /// Directory holding the raw input documents
        #[arg(short, long)]
        input: PathBuf,

        /// Name of the workload (wordcount or invertedindex)
        #[arg(short, long)]
        workload: OperationName,

        /// Working directory for the staging areas and final output
        #[arg(short, long)]
        output: PathBuf,

        /// Number of mappers
        #[arg(short, long, default_value_t = 2)]
        mappers: usize,

        /// Number of reducers
        #[arg(short, long, default_value_t = 2)]
        reducers: usize,
    },
}

impl Commands {
    pub fn into_config(self) -> Result<Config> {
        match self {
            Commands::Run { config } => Config::load(config),
            Commands::Submit { input, workload, output, mappers, reducers } => {
                let mut config = Config::local(output, workload);
                config.raw_input_data_path = input;
                config.mapper_count = mappers;
                config.reducer_count = reducers;
                config.validate()?;
                Ok(config)
            }
        }
    }
}

/// Runs one job end to end and returns its summary with the final output.
pub async fn run_local(mut config: Config) -> Result<(RunSummary, Value)> {
    let workload = workload::select(&config)?;

    let server = KvStoreServer::bind(Arc::new(config.clone()), &config.kv_store_addr()).await?;
    config.kv_store_port = server.local_addr()?.port();
    let kv = KvClient::new(server.local_addr()?);
    info!(kv_store = %kv.addr(), "local KV store started");

    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(server.serve_with_shutdown(async move {
        let _ = stopped.await;
    }));

    let config = Arc::new(config);
    let launcher = InProcessLauncher::new(workload, config.reducer_count);
    let mut master = Master::new(config.clone(), launcher);
    let result = match master.run().await {
        Ok(summary) => kv
            .get_final_output(config.operation_name)
            .await
            .map(|output| (summary, output)),
        Err(e) => Err(e),
    };

    let _ = stop.send(());
    server.await.context("KV store task panicked")??;
    result
}
