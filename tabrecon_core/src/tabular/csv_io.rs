use super::Table;
use csv::{ReaderBuilder, WriterBuilder};
use encoding_rs::Encoding;
use std::path::Path;
use tabrecon_common::TabReconError;
use tracing::debug;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Decode file contents as UTF-8 (BOM stripped), falling back to `fallback`.
///
/// Fails when the bytes are valid in neither encoding.
pub fn decode_bytes(bytes: &[u8], fallback: &'static Encoding) -> Result<String, TabReconError> {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    match std::str::from_utf8(body) {
        Ok(text) => Ok(text.to_string()),
        Err(_) => {
            debug!("Input is not UTF-8, decoding as {}", fallback.name());
            fallback
                .decode_without_bom_handling_and_without_replacement(body)
                .map(|text| text.into_owned())
                .ok_or_else(|| {
                    TabReconError::Encoding(format!(
                        "input is neither valid UTF-8 nor valid {}",
                        fallback.name()
                    ))
                })
        }
    }
}

/// Parse delimited text; the first record is the header
pub fn parse_csv(content: &str, delimiter: u8) -> Result<Table, TabReconError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();

    let headers = match records.next() {
        Some(result) => result
            .map_err(|e| TabReconError::Parse(format!("Failed to read CSV header: {}", e)))?
            .iter()
            .map(|s| s.to_string())
            .collect(),
        None => return Err(TabReconError::Schema("input has no header row".to_string())),
    };

    let rows = records
        .map(|result| {
            result
                .map(|record| record.iter().map(|s| s.to_string()).collect())
                .map_err(|e| TabReconError::Parse(format!("Failed to read CSV record: {}", e)))
        })
        .collect::<Result<Vec<Vec<String>>, _>>()?;

    Ok(Table { headers, rows })
}

pub fn write_csv(
    path: &Path,
    headers: &[String],
    rows: &[&[String]],
    delimiter: u8,
) -> Result<(), TabReconError> {
    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|e| {
            TabReconError::Serialization(format!(
                "Failed to create CSV file {}: {}",
                path.display(),
                e
            ))
        })?;

    let write_err = |e: csv::Error| {
        TabReconError::Serialization(format!("Failed to write CSV file {}: {}", path.display(), e))
    };

    writer.write_record(headers).map_err(write_err)?;
    for row in rows {
        writer.write_record(row.iter()).map_err(write_err)?;
    }
    writer.flush()?;
    Ok(())
}
