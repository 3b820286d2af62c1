use crate::dataset::{Record, Schema};
use crate::differ::{ChangeRecord, DiffResult, FieldState};
use serde::Serialize;
use tabrecon_common::ChangeCategory;

/// Values longer than this are cut in change remarks
const REMARK_VALUE_LIMIT: usize = 50;

/// Record counts per category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub only_in_baseline: usize,
    pub only_in_candidate: usize,
    pub source_changed: usize,
    pub translation_changed: usize,
    pub both_changed: usize,
    pub unchanged: usize,
    pub total_modified: usize,
}

impl DiffSummary {
    pub fn from_diff(diff: &DiffResult) -> Self {
        Self {
            only_in_baseline: diff.only_in_baseline.len(),
            only_in_candidate: diff.only_in_candidate.len(),
            source_changed: diff.source_changes.len(),
            translation_changed: diff.translation_changes.len(),
            both_changed: diff.both_changes.len(),
            unchanged: diff.unchanged_count,
            total_modified: diff.modified_count(),
        }
    }

    /// Rows of the summary sheet: label and count
    pub fn rows(&self) -> Vec<(String, usize)> {
        vec![
            (format!("1. {}", ChangeCategory::OnlyInBaseline.label()), self.only_in_baseline),
            (format!("2. {}", ChangeCategory::OnlyInCandidate.label()), self.only_in_candidate),
            (format!("3-1. {}", ChangeCategory::SourceChanged.label()), self.source_changed),
            (
                format!("3-2. {}", ChangeCategory::TranslationChanged.label()),
                self.translation_changed,
            ),
            (format!("3-3. {}", ChangeCategory::BothChanged.label()), self.both_changed),
            ("Total modified records".to_string(), self.total_modified),
        ]
    }
}

/// One category rendered as a flat table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryTable {
    pub category: ChangeCategory,
    /// Sheet name used for workbook export
    pub sheet_name: &'static str,
    /// File stem used for per-category CSV export
    pub file_stem: &'static str,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CategoryTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Summary plus one table per category, ready for export
#[derive(Debug, Clone, Serialize)]
pub struct DiffReport {
    pub summary: DiffSummary,
    pub tables: Vec<CategoryTable>,
}

impl DiffReport {
    /// Build the report. Only-in tables use each side's own schema, change tables
    /// label their columns from the baseline schema.
    pub fn build(diff: &DiffResult, baseline: &Schema, candidate: &Schema) -> Self {
        let tables = vec![
            record_table(
                ChangeCategory::OnlyInBaseline,
                "1_Only_In_Baseline",
                "only_in_baseline",
                baseline,
                &diff.only_in_baseline,
            ),
            record_table(
                ChangeCategory::OnlyInCandidate,
                "2_Only_In_Candidate",
                "only_in_candidate",
                candidate,
                &diff.only_in_candidate,
            ),
            change_table(
                ChangeCategory::SourceChanged,
                "3-1_Source_Changes",
                "source_changes",
                baseline,
                &diff.source_changes,
            ),
            change_table(
                ChangeCategory::TranslationChanged,
                "3-2_Translation_Changes",
                "translation_changes",
                baseline,
                &diff.translation_changes,
            ),
            change_table(
                ChangeCategory::BothChanged,
                "3-3_Both_Changed",
                "both_changed",
                baseline,
                &diff.both_changes,
            ),
        ];

        Self {
            summary: DiffSummary::from_diff(diff),
            tables,
        }
    }

    pub fn non_empty_tables(&self) -> impl Iterator<Item = &CategoryTable> {
        self.tables.iter().filter(|t| !t.is_empty())
    }
}

fn record_table(
    category: ChangeCategory,
    sheet_name: &'static str,
    file_stem: &'static str,
    schema: &Schema,
    records: &[Record],
) -> CategoryTable {
    CategoryTable {
        category,
        sheet_name,
        file_stem,
        headers: schema.fields().to_vec(),
        rows: records.iter().map(|r| r.values().to_vec()).collect(),
    }
}

fn change_table(
    category: ChangeCategory,
    sheet_name: &'static str,
    file_stem: &'static str,
    schema: &Schema,
    changes: &[ChangeRecord],
) -> CategoryTable {
    let mut headers = vec![schema.id_field().to_string(), schema.name_field().to_string()];
    let mut rows: Vec<Vec<String>> = changes
        .iter()
        .map(|c| vec![c.id.clone(), c.name.clone()])
        .collect();

    let source_changed = matches!(
        category,
        ChangeCategory::SourceChanged | ChangeCategory::BothChanged
    );
    let translation_changed = matches!(
        category,
        ChangeCategory::TranslationChanged | ChangeCategory::BothChanged
    );

    push_field_columns(&mut headers, schema.source_field(), source_changed);
    push_field_columns(&mut headers, schema.translation_field(), translation_changed);

    for (row, change) in rows.iter_mut().zip(changes) {
        push_field_values(row, &change.source, source_changed);
        push_field_values(row, &change.translation, translation_changed);
    }

    CategoryTable {
        category,
        sheet_name,
        file_stem,
        headers,
        rows,
    }
}

fn push_field_columns(headers: &mut Vec<String>, field: &str, changed: bool) {
    if changed {
        headers.push(format!("{}_Before", field));
        headers.push(format!("{}_After", field));
    } else {
        headers.push(format!("{} (Unchanged)", field));
    }
}

fn push_field_values(row: &mut Vec<String>, state: &FieldState, changed: bool) {
    row.push(state.before().to_string());
    if changed {
        row.push(state.after().to_string());
    }
}

/// One-line description of what changed, e.g. `Source: 'a' → 'b'`
pub fn describe_change(change: &ChangeRecord, schema: &Schema) -> String {
    let mut parts = Vec::new();
    for (field, state) in [
        (schema.source_field(), &change.source),
        (schema.translation_field(), &change.translation),
    ] {
        if let FieldState::Changed { before, after } = state {
            parts.push(format!(
                "{}: '{}' → '{}'",
                field,
                truncate_value(before, REMARK_VALUE_LIMIT),
                truncate_value(after, REMARK_VALUE_LIMIT)
            ));
        }
    }
    parts.join(" | ")
}

fn truncate_value(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let head: String = value.chars().take(max_chars).collect();
    format!("{}...", head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::KeyedDataset;
    use crate::differ::DiffEngine;

    fn dataset(rows: &[[&str; 4]]) -> KeyedDataset {
        KeyedDataset::build(
            ["ID", "Name", "Source", "Translation"].iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
        .unwrap()
    }

    fn report() -> DiffReport {
        let baseline = dataset(&[
            ["1", "a", "s", "t"],
            ["2", "b", "s", "t"],
            ["3", "c", "s", "t"],
            ["4", "d", "s", "t"],
        ]);
        let candidate = dataset(&[
            ["2", "b", "S", "t"],
            ["3", "c", "s", "T"],
            ["4", "d", "S", "T"],
            ["5", "e", "s", "t"],
        ]);
        let diff = DiffEngine::new().compare(&baseline, &candidate);
        DiffReport::build(&diff, baseline.schema(), candidate.schema())
    }

    #[test]
    fn test_summary_counts() {
        let summary = report().summary;
        assert_eq!(summary.only_in_baseline, 1);
        assert_eq!(summary.only_in_candidate, 1);
        assert_eq!(summary.source_changed, 1);
        assert_eq!(summary.translation_changed, 1);
        assert_eq!(summary.both_changed, 1);
        assert_eq!(summary.total_modified, 3);
        assert_eq!(summary.rows().len(), 6);
        assert_eq!(summary.rows()[5], ("Total modified records".to_string(), 3));
    }

    #[test]
    fn test_change_table_labels() {
        let report = report();

        let source = &report.tables[2];
        assert_eq!(
            source.headers,
            vec!["ID", "Name", "Source_Before", "Source_After", "Translation (Unchanged)"]
        );
        assert_eq!(source.rows[0], vec!["2", "b", "s", "S", "t"]);

        let translation = &report.tables[3];
        assert_eq!(
            translation.headers,
            vec!["ID", "Name", "Source (Unchanged)", "Translation_Before", "Translation_After"]
        );
        assert_eq!(translation.rows[0], vec!["3", "c", "s", "t", "T"]);

        let both = &report.tables[4];
        assert_eq!(
            both.headers,
            vec![
                "ID",
                "Name",
                "Source_Before",
                "Source_After",
                "Translation_Before",
                "Translation_After",
            ]
        );
        assert_eq!(both.rows[0], vec!["4", "d", "s", "S", "t", "T"]);
    }

    #[test]
    fn test_non_empty_tables_skip_empty_categories() {
        let data = dataset(&[["1", "a", "s", "t"]]);
        let diff = DiffEngine::new().compare(&data, &data);
        let report = DiffReport::build(&diff, data.schema(), data.schema());
        assert_eq!(report.tables.len(), 5);
        assert_eq!(report.non_empty_tables().count(), 0);
    }

    #[test]
    fn test_describe_change_truncates_long_values() {
        let data = dataset(&[["1", "a", "s", "t"]]);
        let long = "x".repeat(60);
        let change = ChangeRecord {
            key: crate::dataset::RowKey::new("1", "a"),
            id: "1".to_string(),
            name: "a".to_string(),
            source: FieldState::Unchanged("s".to_string()),
            translation: FieldState::Changed {
                before: "t".to_string(),
                after: long,
            },
        };

        let remark = describe_change(&change, data.schema());
        assert_eq!(remark, format!("Translation: 't' → '{}...'", "x".repeat(50)));
    }
}
