use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::OperationName;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Commands,
    /// Path to the JSON config, used to find the KV store
    #[clap(short, long)]
    pub config: PathBuf,
    /// [OPT] KV store address, overriding the config
    #[clap(short = 'J', long, default_value = None)]
    pub host: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the combined output of a finished run
    FinalOutput {
        /// Operation whose output to fetch; defaults to the configured one
        #[arg(short, long, default_value = None)]
        operation: Option<OperationName>,
    },
    /// Empty every staging area and remove this operation's final output
    Cleanup {},
}
