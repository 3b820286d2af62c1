pub mod dataset;
pub mod differ;
pub mod merger;
pub mod report;
pub mod session;
pub mod tabular;

pub use dataset::{KeyedDataset, Record, RowKey, Schema};
pub use differ::{ChangeRecord, DiffEngine, DiffResult, FieldState};
pub use merger::{MergeEngine, MergeStats, MergedDataset};
pub use report::{describe_change, CategoryTable, DiffReport, DiffSummary};
pub use session::{ComparisonState, MergeState, ReconSession};
pub use tabular::{read_dataset, write_dataset, TabularOptions};
