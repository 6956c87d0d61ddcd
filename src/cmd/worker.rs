use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::WorkerId;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one mapper task
    Map(Task),
    /// Run one reducer task
    Reduce(Task),
}

#[derive(ClapArgs, Debug)]
pub struct Task {
    /// Worker id, e.g. mapper1 or reducer2
    #[arg(long)]
    pub id: WorkerId,
    /// Where to send the completion ACK
    #[arg(long)]
    pub master: SocketAddr,
    /// Address of the KV store
    #[arg(long)]
    pub kv_store: SocketAddr,
    /// Path to the JSON config, for the operation and reducer count
    #[arg(long)]
    pub config: PathBuf,
}
