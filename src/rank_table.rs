//! Tabular rank output
//!
//! `RankTable` is the flat `{object_id, rank}` table produced by a single
//! ranking run. `QuantileRankTable` collects one rank column per quantile
//! pair (`rank:q75-q25`, ...) and reduces them to a `MeanRankTable`.
//!
//! CSV uses a header row and RFC 4180 style quoting for ids containing
//! commas, quotes or newlines.

use crate::error::{RankError, Result};
use crate::quantile::QuantilePair;
use crate::ranking::RankAssignment;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const RANK_HEADER: &str = "object_id,rank";
const MEAN_RANK_COLUMN: &str = "mean-rank";

/// One row of a rank table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankRecord {
    pub object_id: String,
    pub rank: usize,
}

/// Escape CSV field (handle commas, quotes, newlines)
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Split CSV text into records of unescaped fields
///
/// Quoted fields may contain separators, doubled quotes and line breaks.
/// Blank lines are skipped.
fn parse_csv(text: &str) -> Result<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut field_started = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() && !field_started => {
                in_quotes = true;
                field_started = true;
            }
            '"' => return Err(RankError::Table("unexpected quote inside unquoted field".to_string())),
            ',' => {
                record.push(std::mem::take(&mut field));
                field_started = false;
            }
            '\r' => {}
            '\n' => {
                if field_started || !field.is_empty() || !record.is_empty() {
                    record.push(std::mem::take(&mut field));
                    records.push(std::mem::take(&mut record));
                }
                field_started = false;
            }
            _ => {
                field.push(c);
                field_started = true;
            }
        }
    }

    if in_quotes {
        return Err(RankError::Table("unterminated quoted field".to_string()));
    }
    if field_started || !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    Ok(records)
}

/// Flat `{object_id, rank}` table from one ranking run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankTable {
    records: Vec<RankRecord>,
}

impl RankTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows ordered by rank, then by the order objects were ranked in
    pub fn from_assignment(assignment: &RankAssignment) -> Self {
        let records = assignment
            .iter()
            .map(|(object, rank)| RankRecord {
                object_id: object.to_string(),
                rank,
            })
            .collect();
        Self { records }
    }

    pub fn push(&mut self, object_id: &str, rank: usize) {
        self.records.push(RankRecord {
            object_id: object_id.to_string(),
            rank,
        });
    }

    pub fn records(&self) -> &[RankRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn rank_of(&self, object_id: &str) -> Option<usize> {
        self.records
            .iter()
            .find(|r| r.object_id == object_id)
            .map(|r| r.rank)
    }

    /// Plain `object → rank` map
    pub fn to_map(&self) -> HashMap<String, usize> {
        self.records
            .iter()
            .map(|r| (r.object_id.clone(), r.rank))
            .collect()
    }

    pub fn to_csv(&self) -> String {
        let mut output = String::new();
        output.push_str(RANK_HEADER);
        output.push('\n');
        for record in &self.records {
            output.push_str(&escape_field(&record.object_id));
            output.push(',');
            output.push_str(&record.rank.to_string());
            output.push('\n');
        }
        output
    }

    /// Parse the output of `to_csv`
    pub fn from_csv(text: &str) -> Result<Self> {
        let rows = parse_csv(text)?;
        let Some((header, body)) = rows.split_first() else {
            return Err(RankError::Table("missing header row".to_string()));
        };
        if header.len() != 2 || header[0] != "object_id" || header[1] != "rank" {
            return Err(RankError::Table(format!(
                "expected header '{}', found '{}'",
                RANK_HEADER,
                header.join(",")
            )));
        }

        let mut table = Self::new();
        for (line, row) in body.iter().enumerate() {
            if row.len() != 2 {
                return Err(RankError::Table(format!(
                    "row {}: expected 2 fields, found {}",
                    line + 1,
                    row.len()
                )));
            }
            let rank = row[1].trim().parse::<usize>().map_err(|e| {
                RankError::Table(format!("row {}: invalid rank '{}': {}", line + 1, row[1], e))
            })?;
            table.push(&row[0], rank);
        }
        Ok(table)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| RankError::Table(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| RankError::Table(e.to_string()))
    }
}

/// Column name for the ranks computed at `pair`
pub fn rank_column_name(pair: &QuantilePair) -> String {
    format!("rank:{}", pair.label())
}

/// One rank column per quantile pair over a fixed object order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuantileRankTable {
    objects: Vec<String>,
    columns: Vec<(QuantilePair, HashMap<String, usize>)>,
}

impl QuantileRankTable {
    pub fn new(objects: Vec<String>) -> Self {
        Self {
            objects,
            columns: Vec::new(),
        }
    }

    /// Add the ranks obtained at `pair`; every object must be ranked
    pub fn add_column(&mut self, pair: QuantilePair, assignment: &RankAssignment) -> Result<()> {
        let mut column = HashMap::with_capacity(self.objects.len());
        for object in &self.objects {
            column.insert(object.clone(), assignment.rank_of(object)?);
        }
        self.columns.push((pair, column));
        Ok(())
    }

    pub fn objects(&self) -> &[String] {
        &self.objects
    }

    pub fn pairs(&self) -> Vec<QuantilePair> {
        self.columns.iter().map(|(pair, _)| *pair).collect()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|(pair, _)| rank_column_name(pair)).collect()
    }

    /// Rank of `object` in the column for `pair`
    pub fn rank(&self, object: &str, pair: &QuantilePair) -> Option<usize> {
        self.columns
            .iter()
            .find(|(p, _)| p == pair)
            .and_then(|(_, column)| column.get(object).copied())
    }

    /// Mean rank across every column, sorted ascending
    ///
    /// Ties keep the table's object order. With no columns, every mean is 0.
    pub fn mean_ranks(&self) -> MeanRankTable {
        let count = self.columns.len();
        let rows = self
            .objects
            .iter()
            .map(|object| {
                let total: usize = self
                    .columns
                    .iter()
                    .filter_map(|(_, column)| column.get(object))
                    .sum();
                let mean = if count == 0 {
                    0.0
                } else {
                    total as f64 / count as f64
                };
                MeanRankRecord {
                    object_id: object.clone(),
                    mean_rank: mean,
                }
            })
            .collect();
        MeanRankTable::from_unsorted(rows)
    }

    /// Mean rank scaled by the largest rank in the table, in `[0, 1]`
    ///
    /// A table whose ranks are all 0 scales by 1.
    pub fn normalized_scores(&self) -> MeanRankTable {
        let max_rank = self
            .columns
            .iter()
            .flat_map(|(_, column)| column.values().copied())
            .max()
            .unwrap_or(0)
            .max(1) as f64;
        let mut mean = self.mean_ranks();
        for record in &mut mean.records {
            record.mean_rank /= max_rank;
        }
        mean
    }

    pub fn to_csv(&self) -> String {
        let mut output = String::new();
        let mut header = vec!["object_id".to_string()];
        header.extend(self.column_names());
        output.push_str(&header.join(","));
        output.push('\n');

        for object in &self.objects {
            let mut fields = vec![escape_field(object)];
            for (_, column) in &self.columns {
                fields.push(column.get(object).map(|r| r.to_string()).unwrap_or_default());
            }
            output.push_str(&fields.join(","));
            output.push('\n');
        }
        output
    }
}

/// One row of the mean-rank table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanRankRecord {
    pub object_id: String,
    #[serde(rename = "mean-rank")]
    pub mean_rank: f64,
}

/// Mean rank per object, best (lowest) first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeanRankTable {
    records: Vec<MeanRankRecord>,
}

impl MeanRankTable {
    /// Sort rows ascending by mean rank; equal means keep their input order
    pub fn from_unsorted(mut records: Vec<MeanRankRecord>) -> Self {
        records.sort_by(|a, b| a.mean_rank.total_cmp(&b.mean_rank));
        Self { records }
    }

    pub fn records(&self) -> &[MeanRankRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn mean_rank(&self, object_id: &str) -> Option<f64> {
        self.records
            .iter()
            .find(|r| r.object_id == object_id)
            .map(|r| r.mean_rank)
    }

    /// Object ids, best first
    pub fn order(&self) -> Vec<String> {
        self.records.iter().map(|r| r.object_id.clone()).collect()
    }

    pub fn to_map(&self) -> HashMap<String, f64> {
        self.records
            .iter()
            .map(|r| (r.object_id.clone(), r.mean_rank))
            .collect()
    }

    pub fn to_csv(&self) -> String {
        let mut output = format!("object_id,{}\n", MEAN_RANK_COLUMN);
        for record in &self.records {
            output.push_str(&escape_field(&record.object_id));
            output.push(',');
            output.push_str(&record.mean_rank.to_string());
            output.push('\n');
        }
        output
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| RankError::Table(e.to_string()))
    }
}
