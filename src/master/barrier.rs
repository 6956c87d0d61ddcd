//! Phase barriers: block until every worker of a role has reported `DONE`.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{anyhow, Result};
use itertools::Itertools;
use tokio::net::TcpListener;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::codec::{read_frame, Ack};
use crate::{Role, WorkerId};

/// Distinct `DONE` ACKs seen from one role.
#[derive(Debug)]
pub struct AckCounter {
    role: Role,
    expected: usize,
    seen: HashSet<String>,
}

impl AckCounter {
    pub fn new(role: Role, expected: usize) -> Self {
        Self { role, expected, seen: HashSet::new() }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Records `ack`. Returns true only for a well-formed ACK from a worker
    /// of this role that had not been counted yet.
    pub fn observe(&mut self, ack: &Ack) -> bool {
        if !ack.is_done_from(self.role) {
            return false;
        }
        self.seen.insert(ack.worker_id.clone())
    }

    pub fn received(&self) -> usize {
        self.seen.len()
    }

    pub fn is_complete(&self) -> bool {
        self.seen.len() >= self.expected
    }

    /// Workers whose ACK was counted, in id order.
    pub fn acked(&self) -> Vec<WorkerId> {
        self.seen.iter().filter_map(|id| id.parse::<WorkerId>().ok()).sorted().collect()
    }

    /// Expected workers with no ACK yet, in id order.
    pub fn missing(&self) -> Vec<WorkerId> {
        WorkerId::all(self.role, self.expected)
            .into_iter()
            .filter(|id| !self.seen.contains(&id.to_string()))
            .collect()
    }
}

fn timed_out(counter: &AckCounter) -> anyhow::Error {
    anyhow!(
        "{} barrier timed out with {}/{} ACKs; missing: {}",
        counter.role,
        counter.received(),
        counter.expected,
        counter.missing().iter().join(", ")
    )
}

/// Accepts ACK connections on `listener` until `counter` is complete.
///
/// Malformed or foreign messages are logged and skipped. With a `deadline`
/// the barrier fails once it elapses, naming the workers still missing,
/// even while a connected peer is still mid-frame;
/// without one it waits indefinitely.
pub async fn wait_for_acks(
    listener: &TcpListener,
    mut counter: AckCounter,
    deadline: Option<Duration>,
) -> Result<AckCounter> {
    let role = counter.role();
    let expires = deadline.map(|d| Instant::now() + d);
    info!(%role, expected = counter.expected, "waiting on barrier");

    while !counter.is_complete() {
        let (mut stream, peer) = match expires {
            Some(at) => match timeout_at(at, listener.accept()).await {
                Ok(accepted) => accepted?,
                Err(_) => return Err(timed_out(&counter)),
            },
            None => listener.accept().await?,
        };

        let frame = match expires {
            Some(at) => match timeout_at(at, read_frame::<_, Ack>(&mut stream)).await {
                Ok(frame) => frame,
                Err(_) => {
                    warn!(%role, %peer, "peer sent no complete ACK before the deadline");
                    return Err(timed_out(&counter));
                }
            },
            None => read_frame::<_, Ack>(&mut stream).await,
        };

        match frame {
            Ok(ack) if counter.observe(&ack) => {
                info!(%role, worker = %ack.worker_id, received = counter.received(), "ACK counted");
            }
            Ok(ack) => debug!(%role, ?ack, %peer, "ACK ignored"),
            Err(e) => warn!(%role, %peer, "malformed ACK: {e:#}"),
        }
    }

    info!(%role, "barrier passed");
    Ok(counter)
}
