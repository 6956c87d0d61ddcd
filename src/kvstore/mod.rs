//! The KV store service.
//!
//! One TCP listener; every accepted connection is served on its own task and
//! carries exactly one request and one response. Store failures are turned
//! into in-band [`Response`] values and never abort the connection.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::codec::{
    read_payload, write_frame, CleanupRequest, CombineRequest, ErrorToken, GetRequest, Request,
    Response, SetRequest,
};
use crate::config::Config;
use crate::shuffle::group_for;

pub mod client;
pub mod store;

pub use client::KvClient;
pub use store::{FileStore, StoreError};

pub struct KvStoreServer {
    listener: TcpListener,
    store: Arc<FileStore>,
}

impl KvStoreServer {
    /// Prepares the staging directories and binds `addr`.
    pub async fn bind(config: Arc<Config>, addr: &str) -> Result<Self> {
        let store = FileStore::new(config)?;
        store.init().await.context("creating staging directories")?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding KV store to {addr}"))?;
        Ok(Self { listener, store: Arc::new(store) })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves connections forever.
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Serves connections until `shutdown` resolves. In-flight requests keep
    /// running on their own tasks.
    pub async fn serve_with_shutdown(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        info!(addr = %self.local_addr()?, "KV store listening");
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("KV store shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    debug!(%peer, "client connected");
                    let store = self.store.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(&store, stream, peer).await {
                            warn!(%peer, "connection failed: {e:#}");
                        }
                    });
                }
            }
        }
    }
}

async fn handle_connection(store: &FileStore, mut stream: TcpStream, peer: SocketAddr) -> Result<()> {
    let response = match read_payload(&mut stream).await {
        Ok(payload) => match serde_json::from_slice::<Request>(&payload) {
            Ok(request) => {
                info!(%peer, command = request.command(), category = request.category(), "request received");
                handle_request(store, request).await
            }
            Err(e) => {
                warn!(%peer, "undecodable request: {e}");
                Response::Error(ErrorToken::ClientError)
            }
        },
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            warn!(%peer, "bad frame: {e}");
            Response::Error(ErrorToken::ClientError)
        }
        Err(e) => return Err(e).context("reading request"),
    };
    write_frame(&mut stream, &response).await?;
    stream.shutdown().await?;
    debug!(%peer, "connection closed");
    Ok(())
}

/// Executes one request against the store.
pub async fn handle_request(store: &FileStore, request: Request) -> Response {
    match request {
        Request::Set(SetRequest::Input { dataset, mapper_count }) => {
            stored_or_not(store.store_input(&dataset, mapper_count).await, "mapper input")
        }
        Request::Set(SetRequest::MapperOutput { mapper_id, output }) => stored_or_not(
            store.store_mapper_output(mapper_id, &output).await,
            "mapper output",
        ),
        Request::Set(SetRequest::ReducerOutput { reducer_id, output }) => stored_or_not(
            store.store_reducer_output(reducer_id, &output).await,
            "reducer output",
        ),
        Request::Get(GetRequest::Input { mapper_id }) => match store.load_input(mapper_id).await {
            Ok(dataset) => match serde_json::to_value(dataset) {
                Ok(value) => Response::Value(value),
                Err(e) => {
                    error!(mapper = %mapper_id, "encoding mapper input: {e}");
                    Response::Error(ErrorToken::InvalidMapperId)
                }
            },
            Err(e) => {
                error!(mapper = %mapper_id, "retrieving mapper input: {e}");
                Response::Error(ErrorToken::InvalidMapperId)
            }
        },
        Request::Get(GetRequest::MapperOutput { group, reducer_id }) => {
            let owned = match group_for(reducer_id, store.config().reducer_count) {
                Ok(owned) if owned == group => owned,
                Ok(owned) => {
                    error!(reducer = %reducer_id, requested = %group, %owned, "letter group does not match reducer");
                    return Response::Error(ErrorToken::InvalidMapperFileParameters);
                }
                Err(e) => {
                    error!(reducer = %reducer_id, "no letter group: {e:#}");
                    return Response::Error(ErrorToken::InvalidMapperFileParameters);
                }
            };
            info!(reducer = %reducer_id, group = %owned, "building reducer input");
            match store.reducer_input(&owned).await {
                Ok(value) => Response::Value(value),
                Err(e) => {
                    error!(reducer = %reducer_id, "building reducer input: {e}");
                    Response::Error(ErrorToken::InvalidMapperFileParameters)
                }
            }
        }
        Request::Get(GetRequest::FinalOutput { operation }) => {
            match store.final_output(operation).await {
                Ok(value) => Response::Value(value),
                Err(e) => {
                    warn!(%operation, "retrieving final output: {e}");
                    Response::Error(ErrorToken::FinalOutputNotFound)
                }
            }
        }
        Request::Combine(CombineRequest::FinalOutput) => match store.combine().await {
            Ok(_) => Response::Stored,
            Err(e @ StoreError::Write { .. }) => {
                error!("writing final output: {e}");
                Response::NotStored
            }
            Err(e) => {
                error!("combining reducer outputs: {e}");
                Response::Error(ErrorToken::ReducerOutputReadError)
            }
        },
        Request::Cleanup(CleanupRequest::All) => match store.cleanup().await {
            Ok(_) => Response::Done,
            Err(e) => {
                error!("cleaning up staging areas: {e}");
                Response::NotStored
            }
        },
    }
}

fn stored_or_not(result: Result<(), StoreError>, what: &str) -> Response {
    match result {
        Ok(()) => Response::Stored,
        Err(e) => {
            error!("storing {what}: {e}");
            Response::NotStored
        }
    }
}
