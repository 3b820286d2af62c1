use crate::TabReconError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Classification of a key when reconciling a baseline against a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeCategory {
    /// Key exists only in the baseline (deleted in the candidate)
    OnlyInBaseline,
    /// Key exists only in the candidate (added)
    OnlyInCandidate,
    /// Key exists on both sides with identical source and translation
    Unchanged,
    /// Only the source field differs
    SourceChanged,
    /// Only the translation field differs
    TranslationChanged,
    /// Both source and translation differ
    BothChanged,
}

impl ChangeCategory {
    /// Human readable label used in summaries
    pub fn label(&self) -> &'static str {
        match self {
            ChangeCategory::OnlyInBaseline => "Records only in baseline (deleted)",
            ChangeCategory::OnlyInCandidate => "Records only in candidate (added)",
            ChangeCategory::Unchanged => "Unchanged records",
            ChangeCategory::SourceChanged => "Source changed only",
            ChangeCategory::TranslationChanged => "Translation changed only",
            ChangeCategory::BothChanged => "Source and translation changed",
        }
    }

    pub fn is_modification(&self) -> bool {
        matches!(
            self,
            ChangeCategory::SourceChanged
                | ChangeCategory::TranslationChanged
                | ChangeCategory::BothChanged
        )
    }
}

/// Which side wins for keys whose source field changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourcePolicy {
    /// Keep the baseline's source text
    UseBaseline,
    /// Take the candidate's source text
    UseCandidate,
    /// Leave source changes for manual review; the baseline row is kept
    #[default]
    Skip,
}

/// Merge options as collected from the user.
///
/// The two source checkboxes are independent inputs; [`MergeOptions::resolve`]
/// turns them into a single [`SourcePolicy`] and rejects the case where both are set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOptions {
    /// Keep records that only exist in the baseline
    #[serde(default = "default_true")]
    pub include_only_baseline: bool,

    /// Add records that only exist in the candidate
    #[serde(default = "default_true")]
    pub include_only_candidate: bool,

    /// Keep the baseline's source for source-only changes
    #[serde(default)]
    pub source_from_baseline: bool,

    /// Take the candidate's source for source-only changes
    #[serde(default)]
    pub source_from_candidate: bool,

    /// Apply translation-only changes from the candidate
    #[serde(default = "default_true")]
    pub include_translation_changes: bool,

    /// Apply changes where both source and translation changed
    #[serde(default = "default_true")]
    pub include_both_changes: bool,
}

fn default_true() -> bool {
    true
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            include_only_baseline: true,
            include_only_candidate: true,
            source_from_baseline: false,
            source_from_candidate: false,
            include_translation_changes: true,
            include_both_changes: true,
        }
    }
}

impl MergeOptions {
    /// Validate the options and produce the merge configuration
    pub fn resolve(&self) -> Result<MergeConfig, TabReconError> {
        let source_policy = match (self.source_from_baseline, self.source_from_candidate) {
            (true, true) => {
                return Err(TabReconError::Config(
                    "select only one source option (baseline or candidate, not both)".to_string(),
                ))
            }
            (true, false) => SourcePolicy::UseBaseline,
            (false, true) => SourcePolicy::UseCandidate,
            (false, false) => SourcePolicy::Skip,
        };

        Ok(MergeConfig {
            include_only_baseline: self.include_only_baseline,
            include_only_candidate: self.include_only_candidate,
            source_policy,
            include_translation_changes: self.include_translation_changes,
            include_both_changes: self.include_both_changes,
        })
    }
}

/// Validated merge configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConfig {
    pub include_only_baseline: bool,
    pub include_only_candidate: bool,
    pub source_policy: SourcePolicy,
    pub include_translation_changes: bool,
    pub include_both_changes: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        // Default options never set both source boxes
        Self {
            include_only_baseline: true,
            include_only_candidate: true,
            source_policy: SourcePolicy::Skip,
            include_translation_changes: true,
            include_both_changes: true,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Encoding label tried when an input file is not valid UTF-8
    #[serde(default = "default_fallback_encoding")]
    pub fallback_encoding: String,

    /// Field delimiter for CSV input and output
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Default merge options
    #[serde(default)]
    pub merge: MergeOptions,

    /// Enable portable mode (config alongside binary)
    #[serde(default)]
    pub portable_mode: bool,
}

fn default_fallback_encoding() -> String {
    "euc-kr".to_string()
}

fn default_delimiter() -> char {
    ','
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            fallback_encoding: default_fallback_encoding(),
            delimiter: default_delimiter(),
            merge: MergeOptions::default(),
            portable_mode: false,
        }
    }
}

/// Identifier for one comparison submitted to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_default_options_skips_source() {
        let config = MergeOptions::default().resolve().unwrap();
        assert_eq!(config.source_policy, SourcePolicy::Skip);
        assert!(config.include_only_baseline);
        assert!(config.include_only_candidate);
        assert!(config.include_translation_changes);
        assert!(config.include_both_changes);
        assert_eq!(config, MergeConfig::default());
    }

    #[test]
    fn test_resolve_single_source_option() {
        let options = MergeOptions {
            source_from_candidate: true,
            ..MergeOptions::default()
        };
        assert_eq!(options.resolve().unwrap().source_policy, SourcePolicy::UseCandidate);

        let options = MergeOptions {
            source_from_baseline: true,
            ..MergeOptions::default()
        };
        assert_eq!(options.resolve().unwrap().source_policy, SourcePolicy::UseBaseline);
    }

    #[test]
    fn test_resolve_rejects_both_source_options() {
        let options = MergeOptions {
            source_from_baseline: true,
            source_from_candidate: true,
            ..MergeOptions::default()
        };
        assert!(matches!(options.resolve(), Err(TabReconError::Config(_))));
    }

    #[test]
    fn test_modification_categories() {
        assert!(ChangeCategory::SourceChanged.is_modification());
        assert!(ChangeCategory::TranslationChanged.is_modification());
        assert!(ChangeCategory::BothChanged.is_modification());
        assert!(!ChangeCategory::Unchanged.is_modification());
        assert!(!ChangeCategory::OnlyInBaseline.is_modification());
        assert!(!ChangeCategory::OnlyInCandidate.is_modification());
    }

    #[test]
    fn test_app_config_partial_toml() {
        let config: AppConfig = toml::from_str("[merge]\ninclude_both_changes = false\n").unwrap();
        assert_eq!(config.fallback_encoding, "euc-kr");
        assert_eq!(config.delimiter, ',');
        assert!(!config.merge.include_both_changes);
        assert!(config.merge.include_only_baseline);
    }
}
