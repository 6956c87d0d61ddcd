//! Word count.
//!
//! Map emits `token -> [1, 1, ...]` (one `1` per occurrence), the shuffle
//! concatenates those lists across mappers, and reduce sums them.

use std::collections::BTreeMap;

use anyhow::Result;
use serde_json::Value;

use crate::shuffle::LetterGroup;
use crate::utils::tokens;
use crate::Dataset;

/// Intermediate records: count contributions per token.
pub type Counts = BTreeMap<String, Vec<u64>>;

pub fn count_tokens(shard: &Dataset) -> Counts {
    let mut counts = Counts::new();
    for line in shard.values().flatten() {
        for token in tokens(line) {
            counts.entry(token.to_string()).or_default().push(1);
        }
    }
    counts
}

pub fn merge_group(outputs: Vec<Counts>, group: &LetterGroup) -> Counts {
    let mut merged = Counts::new();
    for output in outputs {
        for (token, mut contributions) in output {
            if group.contains_key(&token) {
                merged.entry(token).or_default().append(&mut contributions);
            }
        }
    }
    merged
}

pub fn sum_counts(input: Counts) -> BTreeMap<String, u64> {
    input
        .into_iter()
        .map(|(token, contributions)| (token, contributions.into_iter().sum()))
        .collect()
}

pub fn map(shard: &Dataset) -> Result<Value> {
    Ok(serde_json::to_value(count_tokens(shard))?)
}

pub fn filter(mapper_outputs: Vec<Value>, group: &LetterGroup) -> Result<Value> {
    let outputs = mapper_outputs
        .into_iter()
        .map(serde_json::from_value::<Counts>)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(serde_json::to_value(merge_group(outputs, group))?)
}

pub fn reduce(input: Value) -> Result<Value> {
    let counts: Counts = serde_json::from_value(input)?;
    Ok(serde_json::to_value(sum_counts(counts))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shuffle::letter_groups;
    use serde_json::json;

    fn shard(lines: &[&str]) -> Dataset {
        let mut ds = Dataset::new();
        ds.insert("doc".into(), lines.iter().map(|l| l.to_string()).collect());
        ds
    }

    #[test]
    fn map_emits_one_contribution_per_occurrence() {
        let out = map(&shard(&["the cat sat", "the end"])).unwrap();
        assert_eq!(out, json!({ "cat": [1], "end": [1], "sat": [1], "the": [1, 1] }));
    }

    #[test]
    fn filter_concatenates_across_mappers() {
        let groups = letter_groups(2);
        let outputs = vec![
            json!({ "the": [1], "cat": [1], "sat": [1] }),
            json!({ "the": [1], "dog": [1], "ran": [1] }),
        ];
        // group 0 = a c e g i k m o q s u w y, group 1 = b d f h j l n p r t v x z
        let first = filter(outputs.clone(), &groups[0]).unwrap();
        assert_eq!(first, json!({ "cat": [1], "sat": [1] }));
        let second = filter(outputs, &groups[1]).unwrap();
        assert_eq!(second, json!({ "dog": [1], "ran": [1], "the": [1, 1] }));
    }

    #[test]
    fn filter_rejects_foreign_shapes() {
        let groups = letter_groups(1);
        assert!(filter(vec![json!(["not", "a", "map"])], &groups[0]).is_err());
    }

    #[test]
    fn reduce_sums() {
        let out = reduce(json!({ "the": [1, 1, 1], "cat": [1] })).unwrap();
        assert_eq!(out, json!({ "cat": 1, "the": 3 }));
    }
}
