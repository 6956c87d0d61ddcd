//! Mapper and reducer task bodies.
//!
//! A worker runs exactly one task: fetch its input from the KV store, apply
//! the workload's function, store the result, then tell the master it is
//! done. Any failure ends the task without an ACK.

use std::net::SocketAddr;

use anyhow::{ensure, Context, Result};
use tokio::net::TcpStream;
use tracing::{info, instrument};

use crate::codec::{write_frame, Ack};
use crate::config::Endpoints;
use crate::kvstore::KvClient;
use crate::shuffle::group_for;
use crate::workload::Workload;
use crate::{count_lines, Role, WorkerId};

#[instrument(skip(endpoints, workload), fields(operation = %workload.operation))]
pub async fn run_mapper(id: WorkerId, endpoints: Endpoints, workload: Workload) -> Result<()> {
    ensure!(id.role == Role::Mapper, "{id} is not a mapper");
    let kv = KvClient::new(endpoints.kv_store);

    let shard = kv.get_input(id).await?;
    info!(documents = shard.len(), lines = count_lines(&shard), "mapper input fetched");

    let output = (workload.map_fn)(&shard).with_context(|| format!("{id} map function"))?;
    kv.set_mapper_output(id, output).await?;
    info!("mapper output stored");

    send_ack(endpoints.master, id).await
}

#[instrument(skip(endpoints, workload), fields(operation = %workload.operation))]
pub async fn run_reducer(
    id: WorkerId,
    reducer_count: usize,
    endpoints: Endpoints,
    workload: Workload,
) -> Result<()> {
    let group = group_for(id, reducer_count)?;
    let kv = KvClient::new(endpoints.kv_store);

    let input = kv.get_mapper_output(group.clone(), id).await?;
    info!(%group, "reducer input fetched");

    let output = (workload.reduce_fn)(input).with_context(|| format!("{id} reduce function"))?;
    kv.set_reducer_output(id, output).await?;
    info!("reducer output stored");

    send_ack(endpoints.master, id).await
}

/// Sends a single framed `DONE` ACK to the master's control listener.
pub async fn send_ack(master: SocketAddr, id: WorkerId) -> Result<()> {
    let mut stream = TcpStream::connect(master)
        .await
        .with_context(|| format!("connecting to master at {master}"))?;
    write_frame(&mut stream, &Ack::done(id)).await?;
    info!(worker = %id, "ACK sent");
    Ok(())
}
