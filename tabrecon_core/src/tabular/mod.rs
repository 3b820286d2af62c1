//! Reading input tables and writing merged data and reports.
//!
//! Everything is read as text: the header row becomes the schema and every cell
//! is kept as its string form.

pub mod csv_io;
#[cfg(feature = "excel")]
pub mod excel_io;

use crate::dataset::{KeyedDataset, Record, Schema};
use crate::report::DiffReport;
use encoding_rs::Encoding;
use std::fs;
use std::path::Path;
use tabrecon_common::{AppConfig, TabReconError};
use tracing::{debug, info};

/// Raw table as read from a file, before schema validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn into_dataset(self) -> Result<KeyedDataset, TabReconError> {
        KeyedDataset::build(self.headers, self.rows)
    }
}

/// File formats understood by [`read_table`] and [`write_dataset`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Tsv,
    Excel,
}

impl TableFormat {
    pub fn detect(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        match ext.as_str() {
            "csv" | "txt" => Some(TableFormat::Csv),
            "tsv" => Some(TableFormat::Tsv),
            "xlsx" | "xls" | "xlsm" | "xlsb" => Some(TableFormat::Excel),
            _ => None,
        }
    }
}

/// Options shared by readers and writers
#[derive(Debug, Clone, Copy)]
pub struct TabularOptions {
    /// Encoding tried when a text file is not valid UTF-8
    pub fallback_encoding: &'static Encoding,
    /// Delimiter for `.csv` files; `.tsv` always uses a tab
    pub delimiter: u8,
}

impl TabularOptions {
    pub fn from_config(config: &AppConfig) -> Result<Self, TabReconError> {
        let fallback_encoding = encoding_for_label(&config.fallback_encoding).ok_or_else(|| {
            TabReconError::Config(format!(
                "unknown encoding label '{}'",
                config.fallback_encoding
            ))
        })?;

        if !config.delimiter.is_ascii() {
            return Err(TabReconError::Config(format!(
                "delimiter must be a single ASCII character, got '{}'",
                config.delimiter
            )));
        }

        Ok(Self {
            fallback_encoding,
            delimiter: config.delimiter as u8,
        })
    }

    fn delimiter_for(&self, format: TableFormat) -> u8 {
        match format {
            TableFormat::Tsv => b'\t',
            _ => self.delimiter,
        }
    }
}

/// WHATWG label lookup, plus the Windows code page names it does not list
fn encoding_for_label(label: &str) -> Option<&'static Encoding> {
    let label = label.trim().to_ascii_lowercase();
    let label = match label.as_str() {
        "cp949" | "ms949" | "uhc" => "windows-949",
        "cp1252" => "windows-1252",
        other => other,
    };
    Encoding::for_label(label.as_bytes())
}

impl Default for TabularOptions {
    fn default() -> Self {
        Self {
            fallback_encoding: encoding_rs::EUC_KR,
            delimiter: b',',
        }
    }
}

fn require_format(path: &Path) -> Result<TableFormat, TabReconError> {
    TableFormat::detect(path).ok_or_else(|| {
        TabReconError::Parse(format!(
            "unsupported file type (expected .csv, .tsv, .xlsx, .xls): {}",
            path.display()
        ))
    })
}

/// Read a table, choosing the reader from the file extension
pub fn read_table(path: &Path, options: &TabularOptions) -> Result<Table, TabReconError> {
    let format = require_format(path)?;
    let table = match format {
        TableFormat::Csv | TableFormat::Tsv => {
            let bytes = fs::read(path)?;
            let text = csv_io::decode_bytes(&bytes, options.fallback_encoding)?;
            csv_io::parse_csv(&text, options.delimiter_for(format))?
        }
        TableFormat::Excel => read_excel(path)?,
    };

    debug!(
        "Read {} columns and {} rows from {}",
        table.headers.len(),
        table.rows.len(),
        path.display()
    );
    Ok(table)
}

/// Read a table and build a keyed dataset from it
pub fn read_dataset(path: &Path, options: &TabularOptions) -> Result<KeyedDataset, TabReconError> {
    let dataset = read_table(path, options)?
        .into_dataset()
        .map_err(|e| match e {
            TabReconError::Schema(msg) => {
                TabReconError::Schema(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;
    info!("Loaded {} records from {}", dataset.len(), path.display());
    Ok(dataset)
}

#[cfg(feature = "excel")]
fn read_excel(path: &Path) -> Result<Table, TabReconError> {
    excel_io::read_excel(path)
}

#[cfg(not(feature = "excel"))]
fn read_excel(path: &Path) -> Result<Table, TabReconError> {
    Err(TabReconError::Parse(format!(
        "Excel support is not enabled in this build: {}",
        path.display()
    )))
}

/// Write records in `schema` order, choosing the writer from the file extension
pub fn write_dataset(
    path: &Path,
    schema: &Schema,
    records: &[Record],
    options: &TabularOptions,
) -> Result<(), TabReconError> {
    let format = require_format(path)?;
    let rows: Vec<&[String]> = records.iter().map(Record::values).collect();

    match format {
        TableFormat::Csv | TableFormat::Tsv => {
            csv_io::write_csv(path, schema.fields(), &rows, options.delimiter_for(format))?
        }
        TableFormat::Excel => write_excel(path, schema.fields(), &rows)?,
    }

    info!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

#[cfg(feature = "excel")]
fn write_excel(path: &Path, headers: &[String], rows: &[&[String]]) -> Result<(), TabReconError> {
    excel_io::write_table(path, "Merged", headers, rows)
}

#[cfg(not(feature = "excel"))]
fn write_excel(path: &Path, _headers: &[String], _rows: &[&[String]]) -> Result<(), TabReconError> {
    Err(TabReconError::Serialization(format!(
        "Excel support is not enabled in this build: {}",
        path.display()
    )))
}

/// Write `summary.csv` plus one CSV per non-empty category into `dir`
pub fn write_report_csvs(
    dir: &Path,
    report: &DiffReport,
    options: &TabularOptions,
) -> Result<(), TabReconError> {
    fs::create_dir_all(dir)?;

    let summary_rows: Vec<Vec<String>> = report
        .summary
        .rows()
        .into_iter()
        .map(|(label, count)| vec![label, count.to_string()])
        .collect();
    let summary_refs: Vec<&[String]> = summary_rows.iter().map(Vec::as_slice).collect();
    csv_io::write_csv(
        &dir.join("summary.csv"),
        &["Category".to_string(), "Count".to_string()],
        &summary_refs,
        options.delimiter,
    )?;

    for table in report.non_empty_tables() {
        let rows: Vec<&[String]> = table.rows.iter().map(Vec::as_slice).collect();
        let path = dir.join(format!("{}.csv", table.file_stem));
        csv_io::write_csv(&path, &table.headers, &rows, options.delimiter)?;
    }

    info!("Wrote report CSV files to {}", dir.display());
    Ok(())
}

/// Write the report workbook: a summary sheet plus one sheet per non-empty category
#[cfg(feature = "excel")]
pub fn write_report_workbook(path: &Path, report: &DiffReport) -> Result<(), TabReconError> {
    excel_io::write_report(path, report)?;
    info!("Wrote report workbook to {}", path.display());
    Ok(())
}
