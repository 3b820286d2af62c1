use crate::dataset::{KeyedDataset, Record, RowKey};
use serde::Serialize;
use std::collections::HashSet;
use tabrecon_common::ChangeCategory;
use tracing::debug;

/// State of one tracked field for a key present on both sides
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldState {
    /// Same value in baseline and candidate
    Unchanged(String),
    /// Baseline value (`before`) differs from the candidate value (`after`)
    Changed { before: String, after: String },
}

impl FieldState {
    fn compare(before: &str, after: &str) -> Self {
        if before == after {
            FieldState::Unchanged(before.to_string())
        } else {
            FieldState::Changed {
                before: before.to_string(),
                after: after.to_string(),
            }
        }
    }

    pub fn is_changed(&self) -> bool {
        matches!(self, FieldState::Changed { .. })
    }

    /// Baseline value
    pub fn before(&self) -> &str {
        match self {
            FieldState::Unchanged(value) => value,
            FieldState::Changed { before, .. } => before,
        }
    }

    /// Candidate value
    pub fn after(&self) -> &str {
        match self {
            FieldState::Unchanged(value) => value,
            FieldState::Changed { after, .. } => after,
        }
    }
}

/// A key present on both sides whose source and/or translation differ
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeRecord {
    pub key: RowKey,
    pub id: String,
    pub name: String,
    pub source: FieldState,
    pub translation: FieldState,
}

impl ChangeRecord {
    pub fn category(&self) -> ChangeCategory {
        match (self.source.is_changed(), self.translation.is_changed()) {
            (true, true) => ChangeCategory::BothChanged,
            (true, false) => ChangeCategory::SourceChanged,
            (false, true) => ChangeCategory::TranslationChanged,
            (false, false) => ChangeCategory::Unchanged,
        }
    }
}

/// Result of reconciling a baseline against a candidate.
///
/// Unchanged common keys are not materialized; only their count is kept.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiffResult {
    /// Baseline records whose key is missing from the candidate
    pub only_in_baseline: Vec<Record>,
    /// Candidate records whose key is missing from the baseline
    pub only_in_candidate: Vec<Record>,
    /// Only the source field changed
    pub source_changes: Vec<ChangeRecord>,
    /// Only the translation field changed
    pub translation_changes: Vec<ChangeRecord>,
    /// Both tracked fields changed
    pub both_changes: Vec<ChangeRecord>,
    /// Number of common keys with no tracked-field difference
    pub unchanged_count: usize,
}

impl DiffResult {
    pub fn modified_count(&self) -> usize {
        self.source_changes.len() + self.translation_changes.len() + self.both_changes.len()
    }

    /// True when neither side has anything the other lacks and no key changed
    pub fn is_identical(&self) -> bool {
        self.only_in_baseline.is_empty()
            && self.only_in_candidate.is_empty()
            && self.modified_count() == 0
    }

    pub fn changes(&self, category: ChangeCategory) -> &[ChangeRecord] {
        match category {
            ChangeCategory::SourceChanged => &self.source_changes,
            ChangeCategory::TranslationChanged => &self.translation_changes,
            ChangeCategory::BothChanged => &self.both_changes,
            _ => &[],
        }
    }

    /// All change records, in category order
    pub fn all_changes(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.source_changes
            .iter()
            .chain(self.translation_changes.iter())
            .chain(self.both_changes.iter())
    }
}

/// Engine that diffs two keyed datasets
pub struct DiffEngine;

impl DiffEngine {
    pub fn new() -> Self {
        Self
    }

    /// Compare a baseline against a candidate.
    ///
    /// Only-in rows keep their dataset's order; common keys are classified in
    /// baseline order of first appearance.
    pub fn compare(&self, baseline: &KeyedDataset, candidate: &KeyedDataset) -> DiffResult {
        let mut result = DiffResult {
            only_in_baseline: Self::missing_from(baseline, candidate),
            only_in_candidate: Self::missing_from(candidate, baseline),
            ..DiffResult::default()
        };

        let mut seen = HashSet::with_capacity(baseline.key_count());
        for record in baseline.records() {
            let key = record.key();
            if !seen.insert(key.clone()) {
                continue;
            }

            let (Some(before), Some(after)) = (baseline.get(&key), candidate.get(&key)) else {
                continue;
            };

            let change = ChangeRecord {
                id: before.id().to_string(),
                name: before.name().to_string(),
                source: FieldState::compare(before.source(), after.source()),
                translation: FieldState::compare(before.translation(), after.translation()),
                key,
            };

            match change.category() {
                ChangeCategory::BothChanged => result.both_changes.push(change),
                ChangeCategory::SourceChanged => result.source_changes.push(change),
                ChangeCategory::TranslationChanged => result.translation_changes.push(change),
                _ => result.unchanged_count += 1,
            }
        }

        debug!(
            "Diff: {} only in baseline, {} only in candidate, {} source, {} translation, \
             {} both, {} unchanged",
            result.only_in_baseline.len(),
            result.only_in_candidate.len(),
            result.source_changes.len(),
            result.translation_changes.len(),
            result.both_changes.len(),
            result.unchanged_count
        );

        result
    }

    /// Records of `from` whose key does not exist in `other`
    fn missing_from(from: &KeyedDataset, other: &KeyedDataset) -> Vec<Record> {
        from.records()
            .iter()
            .filter(|record| !other.contains_key(&record.key()))
            .cloned()
            .collect()
    }
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self::new()
    }
}
