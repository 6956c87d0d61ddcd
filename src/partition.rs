//! Splits a [`Dataset`] into one shard per mapper.
//!
//! A single greedy left-to-right pass: shards fill up to
//! `total_lines / mapper_count` lines each, documents may straddle two
//! adjacent shards, and the last shard takes whatever is left over. Lines are
//! never reordered, dropped or duplicated.

use anyhow::{bail, Result};

use crate::{count_lines, Dataset, WorkerId};

/// A mapper's slice of the input.
#[derive(Debug, Clone, PartialEq)]
pub struct Shard {
    pub mapper_id: WorkerId,
    pub dataset: Dataset,
}

/// Partitions `dataset` into exactly `mapper_count` shards, `mapper1` first.
///
/// Shards may be empty when there are fewer lines than mappers. Documents
/// without lines are kept (empty) in whichever shard is open when they are
/// reached.
pub fn partition(dataset: &Dataset, mapper_count: usize) -> Result<Vec<Shard>> {
    if mapper_count == 0 {
        bail!("cannot partition a dataset across zero mappers");
    }
    let target = count_lines(dataset) / mapper_count;
    let last = mapper_count - 1;

    let mut shards: Vec<Shard> = WorkerId::all(crate::Role::Mapper, mapper_count)
        .into_iter()
        .map(|mapper_id| Shard { mapper_id, dataset: Dataset::new() })
        .collect();
    let mut current = 0;
    let mut filled = 0;

    for (doc, lines) in dataset {
        if lines.is_empty() {
            shards[current].dataset.entry(doc.clone()).or_default();
            continue;
        }
        let mut rest = &lines[..];
        while !rest.is_empty() {
            let take = if current == last {
                rest.len()
            } else {
                (target - filled).min(rest.len())
            };
            if take == 0 {
                // target is zero: everything lands in the last shard.
                current += 1;
                filled = 0;
                continue;
            }
            shards[current]
                .dataset
                .entry(doc.clone())
                .or_default()
                .extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            filled += take;
            if current != last && filled == target {
                current += 1;
                filled = 0;
            }
        }
    }
    Ok(shards)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(docs: &[(&str, usize)]) -> Dataset {
        docs.iter()
            .map(|(name, n)| {
                let lines = (0..*n).map(|i| format!("{name} line {i}")).collect();
                (name.to_string(), lines)
            })
            .collect()
    }

    /// Every (document, line) pair in shard order.
    fn flatten(shards: &[Shard]) -> Vec<(String, String)> {
        shards
            .iter()
            .flat_map(|shard| {
                shard.dataset.iter().flat_map(|(doc, lines)| {
                    lines.iter().map(move |line| (doc.clone(), line.clone()))
                })
            })
            .collect()
    }

    fn sizes(shards: &[Shard]) -> Vec<usize> {
        shards.iter().map(|s| count_lines(&s.dataset)).collect()
    }

    #[test]
    fn two_single_line_documents_split_one_each() {
        let mut ds = Dataset::new();
        ds.insert("doc1".into(), vec!["the cat sat".into()]);
        ds.insert("doc2".into(), vec!["the dog ran".into()]);

        let shards = partition(&ds, 2).unwrap();
        assert_eq!(shards[0].mapper_id.to_string(), "mapper1");
        assert_eq!(shards[0].dataset.keys().collect::<Vec<_>>(), ["doc1"]);
        assert_eq!(shards[1].dataset.keys().collect::<Vec<_>>(), ["doc2"]);
    }

    #[test]
    fn every_line_lands_in_exactly_one_shard() {
        let ds = dataset(&[("a", 7), ("b", 0), ("c", 3), ("d", 11), ("e", 1)]);
        let expected: Vec<(String, String)> = ds
            .iter()
            .flat_map(|(doc, lines)| lines.iter().map(move |l| (doc.clone(), l.clone())))
            .collect();

        for n in 1..=25 {
            let shards = partition(&ds, n).unwrap();
            assert_eq!(shards.len(), n);
            assert_eq!(flatten(&shards), expected, "mapper_count = {n}");
        }
    }

    #[test]
    fn documents_straddle_shards_and_last_takes_remainder() {
        let ds = dataset(&[("a", 5), ("b", 5)]);
        let shards = partition(&ds, 3).unwrap();
        // target = 10 / 3 = 3
        assert_eq!(sizes(&shards), [3, 3, 4]);
        assert_eq!(shards[1].dataset["a"].len(), 2);
        assert_eq!(shards[1].dataset["b"].len(), 1);
        assert_eq!(shards[2].dataset.keys().collect::<Vec<_>>(), ["b"]);
    }

    #[test]
    fn fewer_lines_than_mappers_fills_the_last_shard() {
        let ds = dataset(&[("a", 2)]);
        let shards = partition(&ds, 4).unwrap();
        assert_eq!(sizes(&shards), [0, 0, 0, 2]);
    }

    #[test]
    fn zero_mappers_is_an_error() {
        assert!(partition(&dataset(&[("a", 1)]), 0).is_err());
    }

    #[test]
    fn reordering_documents_changes_the_partition() {
        let forward = dataset(&[("a", 1), ("b", 3)]);
        let backward = dataset(&[("b", 3), ("a", 1)]);
        let f = partition(&forward, 2).unwrap();
        let b = partition(&backward, 2).unwrap();
        assert_ne!(f[0].dataset, b[0].dataset);
    }
}
