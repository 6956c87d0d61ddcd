use anyhow::Result;
use clap::Parser;
use mrkv::cmd::ctl::{Args, Commands};
use mrkv::config::{resolve, Config};
use mrkv::kvstore::KvClient;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = Config::load(&args.config)?;
    let host = args.host.unwrap_or_else(|| config.kv_store_addr());
    let kv = KvClient::new(resolve(&host).await?);

    match args.command {
        Commands::FinalOutput { operation } => {
            let operation = operation.unwrap_or(config.operation_name);
            let output = kv.get_final_output(operation).await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Cleanup {} => {
            kv.cleanup().await?;
            println!("Staging areas cleaned");
        }
    }
    Ok(())
}
