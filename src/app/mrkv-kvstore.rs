use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use mrkv::cmd::kvstore::Args;
use mrkv::config::Config;
use mrkv::kvstore::KvStoreServer;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = Config::load(&args.config)?;
    let addr = args.listen.unwrap_or_else(|| config.kv_store_addr());
    let server = KvStoreServer::bind(Arc::new(config), &addr).await?;
    server
        .serve_with_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}
