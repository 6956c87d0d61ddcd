use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to the JSON config
    #[clap(short, long)]
    pub config: PathBuf,
    /// [OPT] Address to listen on instead of `kv_store_host:kv_store_port`
    #[clap(short, long, default_value = None)]
    pub listen: Option<String>,
}
