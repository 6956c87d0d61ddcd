//! Converts operation names to actual application code.
//!
//! Each operation supplies a map function, a reduce function, and the
//! shuffle filter the KV store applies to mapper output before handing it to
//! a reducer. Operations are written against their own typed intermediates
//! and erased to [`serde_json::Value`] here, which is also what gets staged
//! on disk and sent over the wire.
//!
//! # Example
//!
//! ```
//! # use anyhow::Result;
//! use mrkv::workload;
//! # fn main() -> Result<()> {
//! let wc = workload::named("wordcount")?;
//! assert_eq!(wc.operation.as_str(), "wordcount");
//! # Ok(())
//! # }
//! ```

use anyhow::{bail, Result};
use serde_json::Value;

use crate::config::{Config, OperationName};
use crate::shuffle::LetterGroup;
use crate::Dataset;

pub mod inverted_index;
pub mod wc;

/// A map function turns a mapper's shard into intermediate records.
pub type MapFn = fn(shard: &Dataset) -> Result<Value>;

/// Selects, from every mapper's output, the records owned by `group` and
/// merges them into one reducer input.
pub type FilterFn = fn(mapper_outputs: Vec<Value>, group: &LetterGroup) -> Result<Value>;

/// A reduce function aggregates a reducer input into `key -> value` output.
pub type ReduceFn = fn(input: Value) -> Result<Value>;

/// A map reduce application.
#[derive(Copy, Clone)]
pub struct Workload {
    pub operation: OperationName,
    pub map_fn: MapFn,
    pub filter_fn: FilterFn,
    pub reduce_fn: ReduceFn,
}

impl std::fmt::Debug for Workload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workload").field("operation", &self.operation).finish()
    }
}

/// The [`Workload`] implementing `operation`.
pub fn for_operation(operation: OperationName) -> Workload {
    match operation {
        OperationName::WordCount => Workload {
            operation,
            map_fn: wc::map,
            filter_fn: wc::filter,
            reduce_fn: wc::reduce,
        },
        OperationName::InvertedIndex => Workload {
            operation,
            map_fn: inverted_index::map,
            filter_fn: inverted_index::filter,
            reduce_fn: inverted_index::reduce,
        },
    }
}

/// Gets the [`Workload`] named `name`.
///
/// Returns [`None`] if no application with the given name was found.
pub fn try_named(name: &str) -> Option<Workload> {
    match name {
        "wordcount" | "wc" => Some(for_operation(OperationName::WordCount)),
        "invertedindex" | "ii" => Some(for_operation(OperationName::InvertedIndex)),
        _ => None,
    }
}

/// Gets the [`Workload`] named `name`.
///
/// Returns an [`anyhow::Error`] if no application with the given name was found.
pub fn named(name: &str) -> Result<Workload> {
    match try_named(name) {
        Some(app) => Ok(app),
        None => bail!("No app named `{}` found.", name),
    }
}

/// Picks the workload a validated [`Config`] asks for.
pub fn select(config: &Config) -> Result<Workload> {
    config.validate()?;
    Ok(for_operation(config.operation_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_resolve_to_operations() {
        assert_eq!(named("wc").unwrap().operation, OperationName::WordCount);
        assert_eq!(named("invertedindex").unwrap().operation, OperationName::InvertedIndex);
        assert!(named("grep").is_err());
    }

    #[test]
    fn select_follows_the_config() {
        let config = Config::local("/tmp/unused", OperationName::InvertedIndex);
        assert_eq!(select(&config).unwrap().operation, OperationName::InvertedIndex);
    }
}
