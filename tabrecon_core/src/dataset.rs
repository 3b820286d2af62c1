use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tabrecon_common::TabReconError;
use tracing::warn;

/// Minimum number of fields a table needs: ID, Name, Source, Translation
pub const MIN_FIELDS: usize = 4;

pub const ID_INDEX: usize = 0;
pub const NAME_INDEX: usize = 1;
pub const SOURCE_INDEX: usize = 2;
pub const TRANSLATION_INDEX: usize = 3;

/// Ordered field names of a table, validated to hold at least [`MIN_FIELDS`] entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schema {
    fields: Vec<String>,
}

impl Schema {
    pub fn new(fields: Vec<String>) -> Result<Self, TabReconError> {
        if fields.len() < MIN_FIELDS {
            return Err(TabReconError::Schema(format!(
                "table must have at least {} columns (ID, Name, Source, Translation), found {}",
                MIN_FIELDS,
                fields.len()
            )));
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }

    pub fn id_field(&self) -> &str {
        &self.fields[ID_INDEX]
    }

    pub fn name_field(&self) -> &str {
        &self.fields[NAME_INDEX]
    }

    pub fn source_field(&self) -> &str {
        &self.fields[SOURCE_INDEX]
    }

    pub fn translation_field(&self) -> &str {
        &self.fields[TRANSLATION_INDEX]
    }
}

/// Composite row key: `ID|Name`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RowKey(String);

impl RowKey {
    pub fn new(id: &str, name: &str) -> Self {
        Self(format!("{}|{}", id, name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row, with values aligned to the schema of the dataset it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Record {
    values: Vec<String>,
}

impl Record {
    pub fn new(values: Vec<String>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn into_values(self) -> Vec<String> {
        self.values
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }

    pub fn id(&self) -> &str {
        self.get(ID_INDEX).unwrap_or("")
    }

    pub fn name(&self) -> &str {
        self.get(NAME_INDEX).unwrap_or("")
    }

    pub fn source(&self) -> &str {
        self.get(SOURCE_INDEX).unwrap_or("")
    }

    pub fn translation(&self) -> &str {
        self.get(TRANSLATION_INDEX).unwrap_or("")
    }

    pub fn key(&self) -> RowKey {
        RowKey::new(self.id(), self.name())
    }
}

/// A table with a validated schema and a key index built once at construction
#[derive(Debug, Clone)]
pub struct KeyedDataset {
    schema: Schema,
    records: Vec<Record>,
    by_key: HashMap<RowKey, usize>,
    duplicate_keys: Vec<RowKey>,
}

impl KeyedDataset {
    /// Build a dataset from a header row and data rows.
    ///
    /// Short rows are padded with empty values. Fails with a schema error when the
    /// header has fewer than [`MIN_FIELDS`] columns or a row is wider than the header.
    pub fn build(fields: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, TabReconError> {
        let schema = Schema::new(fields)?;
        let width = schema.len();

        let mut records = Vec::with_capacity(rows.len());
        for (idx, mut values) in rows.into_iter().enumerate() {
            if values.len() > width {
                return Err(TabReconError::Schema(format!(
                    "row {} has {} values but the header has {} columns",
                    idx + 1,
                    values.len(),
                    width
                )));
            }
            values.resize(width, String::new());
            records.push(Record::new(values));
        }

        Ok(Self::from_records(schema, records))
    }

    pub fn from_records(schema: Schema, records: Vec<Record>) -> Self {
        let mut by_key = HashMap::with_capacity(records.len());
        let mut duplicate_keys = Vec::new();

        for (idx, record) in records.iter().enumerate() {
            let key = record.key();
            // Last occurrence wins
            if by_key.insert(key.clone(), idx).is_some() {
                duplicate_keys.push(key);
            }
        }

        if !duplicate_keys.is_empty() {
            warn!(
                "{} duplicate key(s) found, the last occurrence of each is used (first: {})",
                duplicate_keys.len(),
                duplicate_keys[0]
            );
        }

        Self {
            schema,
            records,
            by_key,
            duplicate_keys,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of distinct keys
    pub fn key_count(&self) -> usize {
        self.by_key.len()
    }

    pub fn get(&self, key: &RowKey) -> Option<&Record> {
        self.by_key.get(key).map(|&idx| &self.records[idx])
    }

    pub fn contains_key(&self, key: &RowKey) -> bool {
        self.by_key.contains_key(key)
    }

    /// Keys that appeared more than once, in the order their repeats were seen
    pub fn duplicate_keys(&self) -> &[RowKey] {
        &self.duplicate_keys
    }

    /// Distinct keys in order of first appearance
    pub fn keys(&self) -> Vec<RowKey> {
        let mut seen = std::collections::HashSet::with_capacity(self.by_key.len());
        self.records
            .iter()
            .map(Record::key)
            .filter(|key| seen.insert(key.clone()))
            .collect()
    }
}
