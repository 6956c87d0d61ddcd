//! A MapReduce (lite) engine staged through a key-value store.
//!
//! A master partitions an input corpus, dispatches map and reduce work to
//! independent workers, and assembles a single sorted result. All bulk data
//! moves through a single file-backed KV store; control signals (worker
//! completion ACKs) travel over a small framed TCP protocol.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub mod codec;
pub mod config;
pub mod dataset;
pub mod kvstore;
pub mod master;
pub mod partition;
pub mod shuffle;
pub mod standalone;
pub mod utils;
pub mod worker;
pub mod workload;
pub mod cmd;

/////////////////////////////////////////////////////////////////////////////
// Datasets
/////////////////////////////////////////////////////////////////////////////

/// A mapping from document name to its ordered, cleaned text lines.
///
/// Document order is insertion order; the partitioner relies on it.
pub type Dataset = IndexMap<String, Vec<String>>;

/// Total number of lines across every document of `dataset`.
pub fn count_lines(dataset: &Dataset) -> usize {
    dataset.values().map(Vec::len).sum()
}

/////////////////////////////////////////////////////////////////////////////
// Workers
/////////////////////////////////////////////////////////////////////////////

/// The two kinds of worker the master dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Mapper,
    Reducer,
}

impl Role {
    /// The prefix every id of this role starts with.
    pub fn prefix(self) -> &'static str {
        match self {
            Role::Mapper => "mapper",
            Role::Reducer => "reducer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A worker id such as `mapper1` or `reducer3`.
///
/// Indices are 1-based, matching the file names in the staging areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId {
    pub role: Role,
    pub index: usize,
}

impl WorkerId {
    pub fn mapper(index: usize) -> Self {
        Self { role: Role::Mapper, index }
    }

    pub fn reducer(index: usize) -> Self {
        Self { role: Role::Reducer, index }
    }

    /// All ids `<role>1..=<role>count`.
    pub fn all(role: Role, count: usize) -> Vec<WorkerId> {
        (1..=count).map(|index| WorkerId { role, index }).collect()
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.role.prefix(), self.index)
    }
}

impl FromStr for WorkerId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        for role in [Role::Reducer, Role::Mapper] {
            if let Some(rest) = s.strip_prefix(role.prefix()) {
                let index: usize = rest
                    .parse()
                    .map_err(|_| anyhow!("`{s}` has no numeric worker index"))?;
                if index == 0 {
                    bail!("worker indices start at 1, got `{s}`");
                }
                return Ok(WorkerId { role, index });
            }
        }
        bail!("`{s}` is neither a mapper nor a reducer id")
    }
}

impl Serialize for WorkerId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WorkerId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_ids_round_trip_through_strings() {
        let id: WorkerId = "reducer12".parse().unwrap();
        assert_eq!(id, WorkerId::reducer(12));
        assert_eq!(id.to_string(), "reducer12");
        assert_eq!(WorkerId::mapper(3).to_string(), "mapper3");
    }

    #[test]
    fn malformed_worker_ids_are_rejected() {
        assert!("mapper".parse::<WorkerId>().is_err());
        assert!("mapper0".parse::<WorkerId>().is_err());
        assert!("combiner1".parse::<WorkerId>().is_err());
        assert!("mapperx".parse::<WorkerId>().is_err());
    }

    #[test]
    fn all_ids_are_one_based() {
        let ids = WorkerId::all(Role::Mapper, 3);
        let names: Vec<String> = ids.iter().map(ToString::to_string).collect();
        assert_eq!(names, ["mapper1", "mapper2", "mapper3"]);
    }

    #[test]
    fn line_count_spans_documents() {
        let mut dataset = Dataset::new();
        dataset.insert("a".into(), vec!["x".into(), "y".into()]);
        dataset.insert("b".into(), vec![]);
        dataset.insert("c".into(), vec!["z".into()]);
        assert_eq!(count_lines(&dataset), 3);
    }
}
