//! Routes intermediate keys to reducers by the key's first letter.
//!
//! Letter `i` (`a` = 0 .. `z` = 25) goes to group `i % reducer_count`, so
//! groups interleave: with three reducers group 0 is `adgjmpsvy`, group 1 is
//! `behknqtwz` and group 2 is `cfilorux`.

use std::fmt;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::{Role, WorkerId};

pub const ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz";

/// The set of first letters one reducer is responsible for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LetterGroup {
    /// 0-based position among the groups; reducer `n` owns group `n - 1`.
    pub index: usize,
    pub letters: String,
}

impl LetterGroup {
    /// Whether a key whose first character is `first` belongs here.
    ///
    /// Keys that do not start with `a`..=`z` (after case folding) have no
    /// letter group; the first group takes them so no record is lost.
    pub fn owns(&self, first: char) -> bool {
        let first = first.to_ascii_lowercase();
        if first.is_ascii_lowercase() {
            self.letters.contains(first)
        } else {
            self.index == 0
        }
    }

    /// Whether `key` belongs here. The empty key belongs to the first group.
    pub fn contains_key(&self, key: &str) -> bool {
        match key.chars().next() {
            Some(first) => self.owns(first),
            None => self.index == 0,
        }
    }
}

impl fmt::Display for LetterGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group{}[{}]", self.index, self.letters)
    }
}

/// Builds the `reducer_count` interleaved letter groups.
///
/// With more than 26 reducers the surplus groups are empty.
pub fn letter_groups(reducer_count: usize) -> Vec<LetterGroup> {
    let mut groups: Vec<LetterGroup> = (0..reducer_count)
        .map(|index| LetterGroup { index, letters: String::new() })
        .collect();
    if reducer_count == 0 {
        return groups;
    }
    for (i, letter) in ALPHABET.chars().enumerate() {
        groups[i % reducer_count].letters.push(letter);
    }
    groups
}

/// The group owned by `reducer` when there are `reducer_count` reducers.
pub fn group_for(reducer: WorkerId, reducer_count: usize) -> Result<LetterGroup> {
    if reducer.role != Role::Reducer {
        bail!("{reducer} is not a reducer");
    }
    if reducer.index == 0 || reducer.index > reducer_count {
        bail!("{reducer} is out of range for {reducer_count} reducers");
    }
    Ok(letter_groups(reducer_count).swap_remove(reducer.index - 1))
}
