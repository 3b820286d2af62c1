use crate::dataset::KeyedDataset;
use crate::differ::{DiffEngine, DiffResult};
use crate::merger::{MergeEngine, MergedDataset};
use tabrecon_common::{MergeOptions, SessionId, TabReconError};
use tracing::info;

/// Inputs and result of the last comparison
#[derive(Debug, Clone)]
pub struct ComparisonState {
    pub id: SessionId,
    pub baseline: KeyedDataset,
    pub candidate: KeyedDataset,
    pub diff: DiffResult,
}

/// Result of the last merge and the comparison it was built from
#[derive(Debug, Clone)]
pub struct MergeState {
    pub comparison_id: SessionId,
    pub options: MergeOptions,
    pub merged: MergedDataset,
}

/// Application state owned by the caller.
///
/// Comparison state is replaced on every comparison submit. Merge state is
/// replaced on every successful merge submit and is not cleared by a new
/// comparison; check [`MergeState::comparison_id`] to see which comparison
/// it came from.
#[derive(Default)]
pub struct ReconSession {
    diff_engine: DiffEngine,
    merge_engine: MergeEngine,
    comparison: Option<ComparisonState>,
    merge: Option<MergeState>,
}

impl ReconSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit_comparison(
        &mut self,
        baseline: KeyedDataset,
        candidate: KeyedDataset,
    ) -> &ComparisonState {
        let diff = self.diff_engine.compare(&baseline, &candidate);
        let state = ComparisonState {
            id: SessionId::new(),
            baseline,
            candidate,
            diff,
        };
        info!(
            "Comparison {} ready: {} modified records",
            state.id.0,
            state.diff.modified_count()
        );
        self.comparison.insert(state)
    }

    /// Merge the current comparison. On error both states are left as they were.
    pub fn submit_merge(&mut self, options: &MergeOptions) -> Result<&MergeState, TabReconError> {
        let comparison = self.comparison.as_ref().ok_or_else(|| {
            TabReconError::Session("no comparison has been submitted".to_string())
        })?;

        let merged = self.merge_engine.merge(
            &comparison.baseline,
            &comparison.candidate,
            &comparison.diff,
            options,
        )?;

        let state = MergeState {
            comparison_id: comparison.id,
            options: *options,
            merged,
        };
        Ok(self.merge.insert(state))
    }

    pub fn comparison(&self) -> Option<&ComparisonState> {
        self.comparison.as_ref()
    }

    pub fn merged(&self) -> Option<&MergeState> {
        self.merge.as_ref()
    }

    pub fn clear(&mut self) {
        self.comparison = None;
        self.merge = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(rows: &[[&str; 4]]) -> KeyedDataset {
        KeyedDataset::build(
            ["id", "name", "src", "tr"].iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_merge_requires_comparison() {
        let mut session = ReconSession::new();
        let result = session.submit_merge(&MergeOptions::default());
        assert!(matches!(result, Err(TabReconError::Session(_))));
        assert!(session.merged().is_none());
    }

    #[test]
    fn test_lifecycle() {
        let mut session = ReconSession::new();
        let first_id = session
            .submit_comparison(
                dataset(&[["1", "a", "s", "t"]]),
                dataset(&[["1", "a", "s", "t2"]]),
            )
            .id;

        let merged = session.submit_merge(&MergeOptions::default()).unwrap();
        assert_eq!(merged.comparison_id, first_id);
        assert_eq!(merged.merged.records[0].translation(), "t2");

        // A new comparison replaces the comparison state only
        let second_id = session
            .submit_comparison(dataset(&[["2", "b", "s", "t"]]), dataset(&[["2", "b", "s", "t"]]))
            .id;
        assert_ne!(first_id, second_id);
        assert_eq!(session.comparison().unwrap().id, second_id);
        assert_eq!(session.merged().unwrap().comparison_id, first_id);

        session.clear();
        assert!(session.comparison().is_none());
        assert!(session.merged().is_none());
    }

    #[test]
    fn test_failed_merge_keeps_previous_state() {
        let mut session = ReconSession::new();
        session.submit_comparison(
            dataset(&[["1", "a", "s", "t"]]),
            dataset(&[["1", "a", "s2", "t"]]),
        );
        session.submit_merge(&MergeOptions::default()).unwrap();

        let bad = MergeOptions {
            source_from_baseline: true,
            source_from_candidate: true,
            ..MergeOptions::default()
        };
        assert!(matches!(session.submit_merge(&bad), Err(TabReconError::Config(_))));

        let kept = session.merged().unwrap();
        assert_eq!(kept.options, MergeOptions::default());
        assert_eq!(kept.merged.stats.source_changes_pending_review, 1);
        assert!(session.comparison().is_some());
    }
}
