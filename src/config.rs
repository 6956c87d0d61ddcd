//! Run configuration.
//!
//! [`Config`] is loaded once and never mutated afterwards. Addresses that are
//! only known once the run is underway (the master's bound control socket,
//! the resolved KV store address) live in [`Endpoints`] instead.

use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

/// The operations this engine knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationName {
    WordCount,
    InvertedIndex,
}

impl OperationName {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationName::WordCount => "wordcount",
            OperationName::InvertedIndex => "invertedindex",
        }
    }

    /// Name of the map function implementing this operation.
    pub fn mapper_function(self) -> String {
        format!("{}_map", self.as_str())
    }

    /// Name of the reduce function implementing this operation.
    pub fn reducer_function(self) -> String {
        format!("{}_reduce", self.as_str())
    }
}

impl fmt::Display for OperationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "wordcount" => Ok(OperationName::WordCount),
            "invertedindex" => Ok(OperationName::InvertedIndex),
            _ => bail!("unknown operation `{s}` (expected wordcount or invertedindex)"),
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub operation_name: OperationName,
    pub mapper_count: usize,
    pub reducer_count: usize,

    pub master_host: String,
    pub master_port: u16,
    pub kv_store_host: String,
    pub kv_store_port: u16,

    pub raw_input_data_path: PathBuf,
    pub input_data_path: PathBuf,
    pub mapper_output_path: PathBuf,
    pub reducer_output_path: PathBuf,
    pub final_output_path: PathBuf,

    /// e.g. `wordcount_map`. Must agree with `operation_name` unless
    /// `ignore_function_names` is set.
    #[serde(default)]
    pub mapper_function: Option<String>,
    #[serde(default)]
    pub reducer_function: Option<String>,
    /// Derive the function pair from `operation_name`.
    #[serde(default = "default_true")]
    pub ignore_function_names: bool,

    /// How long each barrier waits for ACKs. Absent means forever.
    #[serde(default)]
    pub barrier_timeout_secs: Option<u64>,

    /// Worker executable used by the process launcher.
    #[serde(default)]
    pub worker_binary: Option<PathBuf>,
}

impl Config {
    /// Reads and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.mapper_count == 0 {
            bail!("mapper_count must be positive");
        }
        if self.reducer_count == 0 {
            bail!("reducer_count must be positive");
        }
        if !self.ignore_function_names {
            let expected_map = self.operation_name.mapper_function();
            let expected_reduce = self.operation_name.reducer_function();
            match self.mapper_function.as_deref() {
                Some(name) if name == expected_map => {}
                other => bail!(
                    "mapper_function {other:?} does not implement {}, expected `{expected_map}`",
                    self.operation_name
                ),
            }
            match self.reducer_function.as_deref() {
                Some(name) if name == expected_reduce => {}
                other => bail!(
                    "reducer_function {other:?} does not implement {}, expected `{expected_reduce}`",
                    self.operation_name
                ),
            }
        }
        Ok(())
    }

    pub fn master_addr(&self) -> String {
        format!("{}:{}", self.master_host, self.master_port)
    }

    pub fn kv_store_addr(&self) -> String {
        format!("{}:{}", self.kv_store_host, self.kv_store_port)
    }

    pub fn barrier_timeout(&self) -> Option<Duration> {
        self.barrier_timeout_secs.map(Duration::from_secs)
    }

    /// `final-output-<operation>.json`
    pub fn final_output_file_name(&self) -> String {
        final_output_file_name(self.operation_name)
    }

    /// A config rooted at `dir`, with every staging area underneath it and
    /// both servers on ephemeral local ports.
    pub fn local(dir: impl AsRef<Path>, operation_name: OperationName) -> Self {
        let dir = dir.as_ref();
        Self {
            operation_name,
            mapper_count: 2,
            reducer_count: 2,
            master_host: "127.0.0.1".into(),
            master_port: 0,
            kv_store_host: "127.0.0.1".into(),
            kv_store_port: 0,
            raw_input_data_path: dir.join("raw-input"),
            input_data_path: dir.join("input"),
            mapper_output_path: dir.join("mapper-output"),
            reducer_output_path: dir.join("reducer-output"),
            final_output_path: dir.join("final-output"),
            mapper_function: None,
            reducer_function: None,
            ignore_function_names: true,
            barrier_timeout_secs: None,
            worker_binary: None,
        }
    }
}

pub fn final_output_file_name(operation: OperationName) -> String {
    format!("final-output-{}.json", operation.as_str())
}

/// Addresses resolved while the run starts up, handed to every worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    /// Where workers send their completion ACKs.
    pub master: SocketAddr,
    pub kv_store: SocketAddr,
}

/// Resolves `host:port` to the first socket address it names.
pub async fn resolve(addr: &str) -> Result<SocketAddr> {
    tokio::net::lookup_host(addr)
        .await
        .with_context(|| format!("resolving {addr}"))?
        .next()
        .ok_or_else(|| anyhow!("{addr} did not resolve to any address"))
}
