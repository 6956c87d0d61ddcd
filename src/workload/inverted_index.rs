//! Inverted index: which documents each token appears in.
//!

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::shuffle::LetterGroup;
use crate::utils::tokens;
use crate::Dataset;

/// A `(token, document)` pair.
pub type Posting = (String, String);

/// A mapper's output: every distinct posting under one synthetic key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Postings {
    pub default_mapper_key: Vec<Posting>,
}

pub fn collect_postings(shard: &Dataset) -> Postings {
    let mut unique = BTreeSet::new();
    for (doc, lines) in shard {
        for line in lines {
            for token in tokens(line) {
                unique.insert((token.to_string(), doc.clone()));
            }
        }
    }
    Postings { default_mapper_key: unique.into_iter().collect() }
}

pub fn merge_group(outputs: Vec<Postings>, group: &LetterGroup) -> Vec<Posting> {
    outputs
        .into_iter()
        .flat_map(|output| output.default_mapper_key)
        .filter(|(token, _)| group.contains_key(token))
        .collect()
}

pub fn index(postings: Vec<Posting>) -> BTreeMap<String, BTreeSet<String>> {
    let mut index: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (token, doc) in postings {
        index.entry(token).or_default().insert(doc);
    }
    index
}

pub fn map(shard: &Dataset) -> Result<Value> {
    Ok(serde_json::to_value(collect_postings(shard))?)
}

pub fn filter(mapper_outputs: Vec<Value>, group: &LetterGroup) -> Result<Value> {
    let outputs = mapper_outputs
        .into_iter()
        .map(serde_json::from_value::<Postings>)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(serde_json::to_value(merge_group(outputs, group))?)
}

pub fn reduce(input: Value) -> Result<Value> {
    let postings: Vec<Posting> = serde_json::from_value(input)?;
    Ok(serde_json::to_value(index(postings))?)
}
