// Rank assignment: object → rank, plus the inverse rank → objects

use crate::error::{RankError, Result};
use std::collections::{BTreeMap, HashMap};

/// Ranks of a set of objects, 0 = best; ties share a rank
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankAssignment {
    by_object: HashMap<String, usize>,
    by_rank: BTreeMap<usize, Vec<String>>,
}

impl RankAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `object` at `rank`, moving it if it was already ranked
    pub fn insert(&mut self, object: &str, rank: usize) {
        if let Some(old) = self.by_object.insert(object.to_string(), rank) {
            if let Some(members) = self.by_rank.get_mut(&old) {
                members.retain(|m| m != object);
                if members.is_empty() {
                    self.by_rank.remove(&old);
                }
            }
        }
        self.by_rank.entry(rank).or_default().push(object.to_string());
    }

    pub fn rank_of(&self, object: &str) -> Result<usize> {
        self.by_object
            .get(object)
            .copied()
            .ok_or_else(|| RankError::UnknownObject {
                object: object.to_string(),
            })
    }

    /// Objects at each rank
    pub fn ranks(&self) -> &BTreeMap<usize, Vec<String>> {
        &self.by_rank
    }

    pub fn objects_at(&self, rank: usize) -> &[String] {
        self.by_rank.get(&rank).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, object: &str) -> bool {
        self.by_object.contains_key(object)
    }

    /// Number of ranked objects
    pub fn len(&self) -> usize {
        self.by_object.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_object.is_empty()
    }

    /// Number of distinct rank levels
    pub fn levels(&self) -> usize {
        self.by_rank.len()
    }

    /// `(object, rank)` pairs ordered by rank, then by insertion within a rank
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.by_rank
            .iter()
            .flat_map(|(&rank, members)| members.iter().map(move |m| (m.as_str(), rank)))
    }

    /// Plain `object → rank` map
    pub fn to_map(&self) -> HashMap<String, usize> {
        self.by_object.clone()
    }
}
