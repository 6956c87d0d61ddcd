//! Client side of the KV store protocol. Every call opens a fresh connection.

use std::net::SocketAddr;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tokio::net::TcpStream;
use tracing::debug;

use crate::codec::{
    read_frame, write_frame, CleanupRequest, CombineRequest, GetRequest, Request, Response,
    SetRequest,
};
use crate::config::OperationName;
use crate::shuffle::LetterGroup;
use crate::{Dataset, WorkerId};

#[derive(Debug, Clone, Copy)]
pub struct KvClient {
    addr: SocketAddr,
}

impl KvClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Sends `request` on a new connection and waits for the response.
    pub async fn call(&self, request: &Request) -> Result<Response> {
        let mut stream = TcpStream::connect(self.addr)
            .await
            .with_context(|| format!("connecting to KV store at {}", self.addr))?;
        write_frame(&mut stream, request).await?;
        let response: Response = read_frame(&mut stream).await?;
        debug!(
            command = request.command(),
            category = request.category(),
            ?response,
            "KV store replied"
        );
        Ok(response)
    }

    pub async fn set_input(&self, dataset: Dataset, mapper_count: usize) -> Result<()> {
        self.call(&Request::Set(SetRequest::Input { dataset, mapper_count }))
            .await?
            .expect_stored()
            .context("staging mapper input")
    }

    pub async fn get_input(&self, mapper_id: WorkerId) -> Result<Dataset> {
        let value = self
            .call(&Request::Get(GetRequest::Input { mapper_id }))
            .await?
            .into_value()
            .with_context(|| format!("fetching input for {mapper_id}"))?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn set_mapper_output(&self, mapper_id: WorkerId, output: Value) -> Result<()> {
        self.call(&Request::Set(SetRequest::MapperOutput { mapper_id, output }))
            .await?
            .expect_stored()
            .with_context(|| format!("storing output of {mapper_id}"))
    }

    pub async fn get_mapper_output(&self, group: LetterGroup, reducer_id: WorkerId) -> Result<Value> {
        self.call(&Request::Get(GetRequest::MapperOutput { group, reducer_id }))
            .await?
            .into_value()
            .with_context(|| format!("fetching reducer input for {reducer_id}"))
    }

    pub async fn set_reducer_output(&self, reducer_id: WorkerId, output: Value) -> Result<()> {
        self.call(&Request::Set(SetRequest::ReducerOutput { reducer_id, output }))
            .await?
            .expect_stored()
            .with_context(|| format!("storing output of {reducer_id}"))
    }

    pub async fn get_final_output(&self, operation: OperationName) -> Result<Value> {
        self.call(&Request::Get(GetRequest::FinalOutput { operation }))
            .await?
            .into_value()
            .with_context(|| format!("fetching final output for {operation}"))
    }

    pub async fn combine(&self) -> Result<()> {
        self.call(&Request::Combine(CombineRequest::FinalOutput))
            .await?
            .expect_stored()
            .context("combining reducer outputs")
    }

    pub async fn cleanup(&self) -> Result<()> {
        match self.call(&Request::Cleanup(CleanupRequest::All)).await? {
            Response::Done => Ok(()),
            other => bail!("cleanup failed: {other:?}"),
        }
    }
}
