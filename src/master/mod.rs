//! The master drives one run through a fixed sequence of phases:
//!
//! `Init -> Cleanup -> Load -> MapDispatch -> MapBarrier -> ReduceDispatch
//! -> ReduceBarrier -> Combine -> Teardown`
//!
//! There is no retry. A failed phase ends the run, but teardown always runs.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::config::{resolve, Config, Endpoints, OperationName};
use crate::dataset::load_dataset;
use crate::kvstore::KvClient;
use crate::workload;
use crate::{count_lines, Role, WorkerId};

pub mod barrier;
pub mod launcher;

pub use barrier::{wait_for_acks, AckCounter};
pub use launcher::{InProcessLauncher, Launcher, ProcessLauncher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Cleanup,
    Load,
    MapDispatch,
    MapBarrier,
    ReduceDispatch,
    ReduceBarrier,
    Combine,
    Teardown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Init => "INIT",
            Phase::Cleanup => "CLEANUP",
            Phase::Load => "LOAD",
            Phase::MapDispatch => "MAP_DISPATCH",
            Phase::MapBarrier => "MAP_BARRIER",
            Phase::ReduceDispatch => "REDUCE_DISPATCH",
            Phase::ReduceBarrier => "REDUCE_BARRIER",
            Phase::Combine => "COMBINE",
            Phase::Teardown => "TEARDOWN",
        };
        f.write_str(name)
    }
}

/// What a successful run did.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub operation: OperationName,
    pub mapper_count: usize,
    pub reducer_count: usize,
    pub documents: usize,
    pub lines: usize,
    pub mappers_acked: Vec<WorkerId>,
    pub reducers_acked: Vec<WorkerId>,
    /// Where the KV store wrote the combined result.
    pub final_output: PathBuf,
    pub elapsed: Duration,
}

pub struct Master<L> {
    config: Arc<Config>,
    launcher: L,
    phase: Phase,
}

impl<L: Launcher> Master<L> {
    pub fn new(config: Arc<Config>, launcher: L) -> Self {
        Self { config, launcher, phase: Phase::Init }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Runs every phase once. Teardown happens whether or not the run
    /// succeeded.
    pub async fn run(&mut self) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id, operation = %self.config.operation_name);
        let result = self.execute(run_id).instrument(span.clone()).await;

        let _enter = span.enter();
        self.enter(Phase::Teardown);
        self.launcher.teardown();
        match &result {
            Ok(summary) => info!(
                final_output = %summary.final_output.display(),
                elapsed = ?summary.elapsed,
                "run complete"
            ),
            Err(e) => error!("run failed: {e:#}"),
        }
        result
    }

    fn enter(&mut self, phase: Phase) {
        info!(from = %self.phase, to = %phase, "phase transition");
        self.phase = phase;
    }

    async fn execute(&mut self, run_id: Uuid) -> Result<RunSummary> {
        let started = Instant::now();
        let config = self.config.clone();

        // INIT
        workload::select(&config)?;
        let control = TcpListener::bind(config.master_addr())
            .await
            .with_context(|| format!("binding control listener on {}", config.master_addr()))?;
        let endpoints = Endpoints {
            master: control.local_addr()?,
            kv_store: resolve(&config.kv_store_addr()).await?,
        };
        info!(master = %endpoints.master, kv_store = %endpoints.kv_store, "endpoints resolved");
        let kv = KvClient::new(endpoints.kv_store);

        self.enter(Phase::Cleanup);
        kv.cleanup().await?;

        self.enter(Phase::Load);
        let dataset = load_dataset(&config.raw_input_data_path).await?;
        let documents = dataset.len();
        let lines = count_lines(&dataset);
        info!(documents, lines, "dataset loaded");
        kv.set_input(dataset, config.mapper_count).await?;

        self.enter(Phase::MapDispatch);
        self.launcher
            .launch(Role::Mapper, &WorkerId::all(Role::Mapper, config.mapper_count), endpoints)?;

        self.enter(Phase::MapBarrier);
        let counter = AckCounter::new(Role::Mapper, config.mapper_count);
        let mappers = wait_for_acks(&control, counter, config.barrier_timeout()).await?;

        self.enter(Phase::ReduceDispatch);
        self.launcher
            .launch(Role::Reducer, &WorkerId::all(Role::Reducer, config.reducer_count), endpoints)?;

        self.enter(Phase::ReduceBarrier);
        let counter = AckCounter::new(Role::Reducer, config.reducer_count);
        let reducers = wait_for_acks(&control, counter, config.barrier_timeout()).await?;

        self.enter(Phase::Combine);
        kv.combine().await?;

        Ok(RunSummary {
            run_id,
            operation: config.operation_name,
            mapper_count: config.mapper_count,
            reducer_count: config.reducer_count,
            documents,
            lines,
            mappers_acked: mappers.acked(),
            reducers_acked: reducers.acked(),
            final_output: config.final_output_path.join(config.final_output_file_name()),
            elapsed: started.elapsed(),
        })
    }
}
