//! Starting workers.
//!
//! The master only needs workers to exist and eventually ACK; how they are
//! started is up to the [`Launcher`].

use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{anyhow, Context, Result};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::{Config, Endpoints};
use crate::worker::{run_mapper, run_reducer};
use crate::workload::Workload;
use crate::{Role, WorkerId};

pub trait Launcher {
    /// Starts one worker per id. Does not wait for them.
    fn launch(&mut self, role: Role, ids: &[WorkerId], endpoints: Endpoints) -> Result<()>;

    /// Stops whatever is still running.
    fn teardown(&mut self);
}

/// Runs every worker as a `mrkv-worker` child process.
#[derive(Debug)]
pub struct ProcessLauncher {
    binary: PathBuf,
    config_path: PathBuf,
    children: Vec<(WorkerId, Child)>,
}

impl ProcessLauncher {
    pub fn new(binary: impl Into<PathBuf>, config_path: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into(), config_path: config_path.into(), children: Vec::new() }
    }

    /// Uses `worker_binary` from the config, falling back to the
    /// `mrkv-worker` next to the running executable.
    pub fn from_config(config: &Config, config_path: &Path) -> Result<Self> {
        let binary = match &config.worker_binary {
            Some(path) => path.clone(),
            None => sibling_binary("mrkv-worker")?,
        };
        Ok(Self::new(binary, config_path))
    }

    pub fn running(&self) -> usize {
        self.children.len()
    }
}

fn sibling_binary(name: &str) -> Result<PathBuf> {
    let exe = env::current_exe().context("locating the running executable")?;
    let dir = exe
        .parent()
        .ok_or_else(|| anyhow!("{} has no parent directory", exe.display()))?;
    Ok(dir.join(name))
}

impl Launcher for ProcessLauncher {
    fn launch(&mut self, role: Role, ids: &[WorkerId], endpoints: Endpoints) -> Result<()> {
        let task = match role {
            Role::Mapper => "map",
            Role::Reducer => "reduce",
        };
        for &id in ids {
            let child = Command::new(&self.binary)
                .arg(task)
                .arg("--id")
                .arg(id.to_string())
                .arg("--master")
                .arg(endpoints.master.to_string())
                .arg("--kv-store")
                .arg(endpoints.kv_store.to_string())
                .arg("--config")
                .arg(&self.config_path)
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .spawn()
                .with_context(|| format!("spawning {} for {id}", self.binary.display()))?;
            info!(worker = %id, pid = child.id(), "worker process started");
            self.children.push((id, child));
        }
        Ok(())
    }

    fn teardown(&mut self) {
        for (id, mut child) in self.children.drain(..) {
            match child.try_wait() {
                Ok(Some(status)) => info!(worker = %id, %status, "worker exited"),
                Ok(None) => {
                    warn!(worker = %id, "killing worker still running at teardown");
                    if let Err(e) = child.start_kill() {
                        error!(worker = %id, "failed to kill worker: {e}");
                    }
                }
                Err(e) => error!(worker = %id, "failed to poll worker: {e}"),
            }
        }
    }
}

/// Runs every worker as a task on the current runtime.
#[derive(Debug)]
pub struct InProcessLauncher {
    workload: Workload,
    reducer_count: usize,
    tasks: Vec<(WorkerId, JoinHandle<()>)>,
}

impl InProcessLauncher {
    pub fn new(workload: Workload, reducer_count: usize) -> Self {
        Self { workload, reducer_count, tasks: Vec::new() }
    }

    pub fn running(&self) -> usize {
        self.tasks.iter().filter(|(_, task)| !task.is_finished()).count()
    }
}

impl Launcher for InProcessLauncher {
    fn launch(&mut self, role: Role, ids: &[WorkerId], endpoints: Endpoints) -> Result<()> {
        for &id in ids {
            let workload = self.workload;
            let reducer_count = self.reducer_count;
            let task = tokio::spawn(async move {
                let result = match role {
                    Role::Mapper => run_mapper(id, endpoints, workload).await,
                    Role::Reducer => run_reducer(id, reducer_count, endpoints, workload).await,
                };
                if let Err(e) = result {
                    error!(worker = %id, "worker failed: {e:#}");
                }
            });
            self.tasks.push((id, task));
        }
        Ok(())
    }

    fn teardown(&mut self) {
        for (id, task) in self.tasks.drain(..) {
            if !task.is_finished() {
                warn!(worker = %id, "aborting worker still running at teardown");
                task.abort();
            }
        }
    }
}
