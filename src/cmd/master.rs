use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to the JSON config
    #[clap(short, long)]
    pub config: PathBuf,
    /// [OPT] Worker executable, overriding `worker_binary` in the config
    #[clap(short, long, default_value = None)]
    pub worker: Option<PathBuf>,
    /// [OPT] Seconds each barrier waits for ACKs, overriding the config
    #[clap(short, long, default_value = None)]
    pub timeout: Option<u64>,
}
