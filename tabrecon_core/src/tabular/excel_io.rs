use super::Table;
use crate::report::DiffReport;
use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use std::path::Path;
use tabrecon_common::TabReconError;
use tracing::debug;

const SUMMARY_SHEET: &str = "0_Summary";

/// Read the first worksheet; the first non-empty row is the header
pub fn read_excel(path: &Path) -> Result<Table, TabReconError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| {
        TabReconError::Parse(format!("Failed to open Excel file {}: {}", path.display(), e))
    })?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| TabReconError::Schema(format!("{} has no worksheets", path.display())))?;

    let range = workbook.worksheet_range(&sheet_name).map_err(|e| {
        TabReconError::Parse(format!("Failed to read sheet '{}': {}", sheet_name, e))
    })?;
    debug!("Reading sheet '{}' ({:?})", sheet_name, range.get_size());

    let mut rows = range
        .rows()
        .filter(|row| !row.iter().all(|cell| matches!(cell, Data::Empty)))
        .map(|row| row.iter().map(format_cell).collect::<Vec<_>>());

    let headers = rows
        .next()
        .ok_or_else(|| TabReconError::Schema(format!("sheet '{}' is empty", sheet_name)))?;

    Ok(Table {
        headers,
        rows: rows.collect(),
    })
}

/// String form of a cell. Integral numbers print without a fraction so an ID
/// stored as a number matches the same ID stored as text.
pub fn format_cell(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{:.0}", f)
            } else {
                f.to_string()
            }
        }
        Data::Bool(true) => "TRUE".to_string(),
        Data::Bool(false) => "FALSE".to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Write one sheet holding `headers` and `rows`
pub fn write_table(
    path: &Path,
    sheet_name: &str,
    headers: &[String],
    rows: &[&[String]],
) -> Result<(), TabReconError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name).map_err(xlsx_err)?;
    write_rows(worksheet, headers, rows).map_err(xlsx_err)?;
    workbook.save(path).map_err(xlsx_err)?;
    Ok(())
}

/// Write the summary sheet followed by one sheet per non-empty category
pub fn write_report(path: &Path, report: &DiffReport) -> Result<(), TabReconError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    let summary = workbook.add_worksheet();
    summary.set_name(SUMMARY_SHEET).map_err(xlsx_err)?;
    summary
        .write_string_with_format(0, 0, "Category", &bold)
        .map_err(xlsx_err)?;
    summary
        .write_string_with_format(0, 1, "Count", &bold)
        .map_err(xlsx_err)?;
    for (idx, (label, count)) in report.summary.rows().into_iter().enumerate() {
        let row = idx as u32 + 1;
        summary.write_string(row, 0, &label).map_err(xlsx_err)?;
        summary.write_number(row, 1, count as f64).map_err(xlsx_err)?;
    }

    for table in report.non_empty_tables() {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(table.sheet_name).map_err(xlsx_err)?;
        let rows: Vec<&[String]> = table.rows.iter().map(Vec::as_slice).collect();
        write_rows(worksheet, &table.headers, &rows).map_err(xlsx_err)?;
    }

    workbook.save(path).map_err(xlsx_err)?;
    Ok(())
}

fn write_rows(
    worksheet: &mut Worksheet,
    headers: &[String],
    rows: &[&[String]],
) -> Result<(), XlsxError> {
    let bold = Format::new().set_bold();
    for (col, header) in headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, header, &bold)?;
    }

    for (row_idx, row) in rows.iter().enumerate() {
        let row_num = row_idx as u32 + 1;
        for (col, value) in row.iter().enumerate() {
            // Blank cells read back as empty, same as an empty string
            if !value.is_empty() {
                worksheet.write_string(row_num, col as u16, value)?;
            }
        }
    }
    Ok(())
}

fn xlsx_err(e: XlsxError) -> TabReconError {
    TabReconError::Serialization(format!("Failed to write Excel file: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::KeyedDataset;
    use crate::differ::DiffEngine;
    use tempfile::TempDir;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_format_cell_numbers() {
        assert_eq!(format_cell(&Data::Float(1.0)), "1");
        assert_eq!(format_cell(&Data::Float(1.5)), "1.5");
        assert_eq!(format_cell(&Data::Int(42)), "42");
        assert_eq!(format_cell(&Data::String("007".to_string())), "007");
        assert_eq!(format_cell(&Data::Bool(true)), "TRUE");
        assert_eq!(format_cell(&Data::Empty), "");
    }

    #[test]
    fn test_write_then_read_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("merged.xlsx");
        let headers = strings(&["ID", "Name", "Source", "Translation"]);
        let first = strings(&["1", "title", "Hello", "안녕하세요"]);
        let second = strings(&["2", "body", "", "x"]);

        write_table(&path, "Merged", &headers, &[first.as_slice(), second.as_slice()]).unwrap();
        let table = read_excel(&path).unwrap();

        assert_eq!(table.headers, headers);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0], first);
        assert_eq!(table.rows[1][1], "body");
        assert_eq!(table.rows[1][2], "");
    }

    #[test]
    fn test_report_workbook_sheets() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.xlsx");
        let fields = strings(&["id", "name", "src", "tr"]);
        let baseline =
            KeyedDataset::build(fields.clone(), vec![strings(&["1", "a", "s", "t"])]).unwrap();
        let candidate = KeyedDataset::build(
            fields,
            vec![strings(&["1", "a", "s2", "t"]), strings(&["2", "b", "s", "t"])],
        )
        .unwrap();
        let diff = DiffEngine::new().compare(&baseline, &candidate);
        let report = DiffReport::build(&diff, baseline.schema(), candidate.schema());

        write_report(&path, &report).unwrap();

        let workbook = open_workbook_auto(&path).unwrap();
        assert_eq!(
            workbook.sheet_names(),
            vec!["0_Summary", "2_Only_In_Candidate", "3-1_Source_Changes"]
        );
    }
}
