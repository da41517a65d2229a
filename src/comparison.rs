//! Pairwise relation and the comparison matrix
//!
//! The matrix is indexed by object position (the comparer's object order).
//! Cells start unknown and are written in mirrored pairs, so for every
//! evaluated `x != y`:
//!
//! ```text
//! C[x][y] = Better  <=>  C[y][x] = Worse
//! C[x][y] = Equal   <=>  C[y][x] = Equal
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Outcome of comparing two objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    /// The first object is better (its upper bound lies below the other's lower bound)
    Better,
    /// Quantile ranges overlap
    Equal,
    /// The second object is better
    Worse,
}

impl Relation {
    /// Integer code used in exported matrices: 0=better, 1=equal, 2=worse
    pub fn code(self) -> i8 {
        match self {
            Relation::Better => 0,
            Relation::Equal => 1,
            Relation::Worse => 2,
        }
    }

    pub fn from_code(code: i8) -> Option<Self> {
        match code {
            0 => Some(Relation::Better),
            1 => Some(Relation::Equal),
            2 => Some(Relation::Worse),
            _ => None,
        }
    }

    /// The relation seen from the other object
    pub fn mirror(self) -> Self {
        match self {
            Relation::Better => Relation::Worse,
            Relation::Equal => Relation::Equal,
            Relation::Worse => Relation::Better,
        }
    }
}

/// Code exported for cells that were never evaluated
pub const UNKNOWN_CODE: i8 = -1;

/// Square, lazily filled matrix of pairwise relations
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonMatrix {
    size: usize,
    cells: Vec<Option<Relation>>,
}

impl ComparisonMatrix {
    /// An all-unknown matrix for `size` objects
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![None; size * size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Relation of object `i` to object `j`, if evaluated
    pub fn get(&self, i: usize, j: usize) -> Option<Relation> {
        if i >= self.size || j >= self.size {
            return None;
        }
        self.cells[i * self.size + j]
    }

    /// Write `C[i][j] = relation` and the mirrored cell `C[j][i]`
    pub fn set_pair(&mut self, i: usize, j: usize, relation: Relation) {
        debug_assert!(i != j, "diagonal cells are never written");
        self.cells[i * self.size + j] = Some(relation);
        self.cells[j * self.size + i] = Some(relation.mirror());
    }

    /// Reset every cell to unknown
    pub fn clear(&mut self) {
        self.cells.iter_mut().for_each(|c| *c = None);
    }

    /// True once every off-diagonal cell has been evaluated
    pub fn is_complete(&self) -> bool {
        (0..self.size).all(|i| (0..self.size).all(|j| i == j || self.get(i, j).is_some()))
    }

    /// First off-diagonal pair `(i, j)` with `i < j` still unknown
    pub fn first_pending(&self) -> Option<(usize, usize)> {
        (0..self.size)
            .flat_map(|i| ((i + 1)..self.size).map(move |j| (i, j)))
            .find(|&(i, j)| self.get(i, j).is_none())
    }

    /// Number of evaluated unordered pairs
    pub fn evaluated_pairs(&self) -> usize {
        (0..self.size)
            .flat_map(|i| ((i + 1)..self.size).map(move |j| (i, j)))
            .filter(|&(i, j)| self.get(i, j).is_some())
            .count()
    }

    /// Export as `object -> object -> code`, with `-1` for unknown cells
    ///
    /// Diagonal cells are exported as unknown since they are never evaluated.
    pub fn to_codes(&self, objects: &[String]) -> HashMap<String, HashMap<String, i8>> {
        let mut out = HashMap::with_capacity(objects.len());
        for (i, x) in objects.iter().enumerate().take(self.size) {
            let row = out.entry(x.clone()).or_insert_with(HashMap::new);
            for (j, y) in objects.iter().enumerate().take(self.size) {
                let code = self.get(i, j).map_or(UNKNOWN_CODE, Relation::code);
                row.insert(y.clone(), code);
            }
        }
        out
    }
}
