use crate::dataset::{
    KeyedDataset, Record, RowKey, Schema, ID_INDEX, NAME_INDEX, SOURCE_INDEX, TRANSLATION_INDEX,
};
use crate::differ::{ChangeRecord, DiffResult};
use serde::Serialize;
use std::collections::HashSet;
use tabrecon_common::{MergeConfig, MergeOptions, SourcePolicy, TabReconError};
use tracing::{debug, info};

/// Rows emitted by each merge step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub only_in_baseline: usize,
    pub only_in_candidate: usize,
    pub source_changes: usize,
    pub translation_changes: usize,
    pub both_changes: usize,
    /// Baseline rows carried over because their key was not emitted by an earlier step
    pub kept_from_baseline: usize,
    /// Source changes left at their baseline value because the policy was `Skip`
    pub source_changes_pending_review: usize,
}

/// Reconciled dataset, always in the baseline's schema
#[derive(Debug, Clone, Serialize)]
pub struct MergedDataset {
    pub schema: Schema,
    pub records: Vec<Record>,
    pub stats: MergeStats,
}

impl MergedDataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Engine that builds a merged dataset from a diff and a merge configuration
pub struct MergeEngine;

impl MergeEngine {
    pub fn new() -> Self {
        Self
    }

    /// Validate `options` and merge. Nothing is produced when validation fails.
    pub fn merge(
        &self,
        baseline: &KeyedDataset,
        candidate: &KeyedDataset,
        diff: &DiffResult,
        options: &MergeOptions,
    ) -> Result<MergedDataset, TabReconError> {
        let config = options.resolve()?;
        Ok(self.merge_with_config(baseline, candidate, diff, &config))
    }

    /// Merge with an already validated configuration.
    ///
    /// Steps run in a fixed order and a key emitted by one step is never emitted
    /// again. Any change whose category is disabled falls through to the final
    /// step and is written as the unmodified baseline row.
    pub fn merge_with_config(
        &self,
        baseline: &KeyedDataset,
        candidate: &KeyedDataset,
        diff: &DiffResult,
        config: &MergeConfig,
    ) -> MergedDataset {
        let mut out = Emitter::new(baseline.len() + diff.only_in_candidate.len());
        let mut stats = MergeStats::default();

        // 1. Records only in the baseline; a duplicated key is written once, as its last row
        if config.include_only_baseline {
            for record in &diff.only_in_baseline {
                let key = record.key();
                let row = baseline.get(&key).unwrap_or(record).clone();
                if out.emit(key, row) {
                    stats.only_in_baseline += 1;
                }
            }
        }

        // 2. Records only in the candidate
        if config.include_only_candidate {
            for record in &diff.only_in_candidate {
                let key = record.key();
                let latest = candidate.get(&key).unwrap_or(record);
                let projected = project_onto(baseline.schema(), candidate.schema(), latest);
                if out.emit(key, projected) {
                    stats.only_in_candidate += 1;
                }
            }
        }

        // 3. Source-only changes
        match config.source_policy {
            SourcePolicy::Skip => {
                stats.source_changes_pending_review = diff.source_changes.len();
            }
            policy => {
                for change in &diff.source_changes {
                    let source = match policy {
                        SourcePolicy::UseCandidate => change.source.after(),
                        _ => change.source.before(),
                    };
                    let row = changed_row(baseline, change, source, change.translation.before());
                    if out.emit(change.key.clone(), row) {
                        stats.source_changes += 1;
                    }
                }
            }
        }

        // 4. Translation-only changes
        if config.include_translation_changes {
            for change in &diff.translation_changes {
                let row = changed_row(
                    baseline,
                    change,
                    change.source.before(),
                    change.translation.after(),
                );
                if out.emit(change.key.clone(), row) {
                    stats.translation_changes += 1;
                }
            }
        }

        // 5. Both fields changed
        if config.include_both_changes {
            for change in &diff.both_changes {
                let row = changed_row(
                    baseline,
                    change,
                    change.source.after(),
                    change.translation.after(),
                );
                if out.emit(change.key.clone(), row) {
                    stats.both_changes += 1;
                }
            }
        }

        // 6. Everything else keeps its baseline row, once per key
        for record in baseline.records() {
            let key = record.key();
            if out.is_processed(&key) {
                continue;
            }
            let row = baseline.get(&key).unwrap_or(record).clone();
            if out.emit(key, row) {
                stats.kept_from_baseline += 1;
            }
        }

        debug!("Merge stats: {:?}", stats);
        info!("Merged dataset has {} records", out.records.len());

        MergedDataset {
            schema: baseline.schema().clone(),
            records: out.records,
            stats,
        }
    }
}

impl Default for MergeEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Output rows plus the set of keys already written
struct Emitter {
    records: Vec<Record>,
    processed: HashSet<RowKey>,
}

impl Emitter {
    fn new(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            processed: HashSet::with_capacity(capacity),
        }
    }

    /// Write `record` unless `key` was already written. Returns whether it was written.
    fn emit(&mut self, key: RowKey, record: Record) -> bool {
        if !self.processed.insert(key) {
            return false;
        }
        self.records.push(record);
        true
    }

    fn is_processed(&self, key: &RowKey) -> bool {
        self.processed.contains(key)
    }
}

/// Row for a changed key: baseline row as template, tracked fields overwritten
fn changed_row(
    baseline: &KeyedDataset,
    change: &ChangeRecord,
    source: &str,
    translation: &str,
) -> Record {
    let width = baseline.schema().len();
    let mut values = baseline
        .get(&change.key)
        .map(|record| record.values().to_vec())
        .unwrap_or_else(|| vec![String::new(); width]);

    values[ID_INDEX] = change.id.clone();
    values[NAME_INDEX] = change.name.clone();
    values[SOURCE_INDEX] = source.to_string();
    values[TRANSLATION_INDEX] = translation.to_string();
    Record::new(values)
}

/// Map a candidate record onto the baseline schema.
///
/// The four semantic fields map by position, trailing fields by name; fields the
/// candidate lacks are left empty.
fn project_onto(target: &Schema, source_schema: &Schema, record: &Record) -> Record {
    let values = target
        .fields()
        .iter()
        .enumerate()
        .map(|(idx, field)| {
            let from = if idx <= TRANSLATION_INDEX {
                Some(idx)
            } else {
                source_schema.position(field)
            };
            from.and_then(|i| record.get(i)).unwrap_or("").to_string()
        })
        .collect();
    Record::new(values)
}
