use anyhow::Result;
use clap::Parser;
use mrkv::standalone::{run_local, Args};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = args.command.into_config()?;
    let (summary, output) = run_local(config).await?;
    eprintln!(
        "{} finished in {:?}: {} documents, {} lines -> {}",
        summary.operation,
        summary.elapsed,
        summary.documents,
        summary.lines,
        summary.final_output.display()
    );
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
