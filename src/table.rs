use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use calamine::{open_workbook_auto, DataType, Reader};
use chrono::{Days, NaiveDate};

/// One marksheet record: column name to raw cell value. Dates are already
/// rendered as ISO strings by ingestion, blanks as empty strings. Read-only
/// after construction.
#[derive(Clone, Debug, Default)]
pub struct Row {
    values: HashMap<String, String>,
}

impl Row {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Missing columns read as empty, never an error.
    pub fn field(&self, column: &str) -> &str {
        self.values.get(column).map(String::as_str).unwrap_or("")
    }
}

/// Reads the input table, dispatching on extension: `.xlsx`/`.xlsm`/`.xls`/
/// `.xlsb` via calamine, anything else as CSV. The first record defines the
/// schema; blank data rows are kept (they are records, just empty ones).
pub fn read_table(path: &Path) -> anyhow::Result<Vec<Row>> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();
    if matches!(extension.as_str(), "xlsx" | "xlsm" | "xls" | "xlsb") {
        read_excel_table(path)
    } else {
        read_csv_table(path)
    }
}

fn read_csv_table(path: &Path) -> anyhow::Result<Vec<Row>> {
    let raw = std::fs::read(path).with_context(|| format!("open table: {}", path.display()))?;
    // Decode up front so a UTF-8 BOM never ends up glued to the first header.
    let (text, _, _) = encoding_rs::UTF_8.decode(&raw);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .context("read table headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.context("read table record")?;
        rows.push(Row {
            values: headers
                .iter()
                .cloned()
                .zip(record.iter().map(|v| v.trim().to_string()))
                .collect(),
        });
    }
    Ok(rows)
}

fn read_excel_table(path: &Path) -> anyhow::Result<Vec<Row>> {
    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("open workbook: {}", path.display()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .context("workbook has no worksheets")?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("read worksheet: {sheet_name}"))?;

    let mut rows_iter = range.rows();
    let headers: Vec<String> = rows_iter
        .next()
        .context("worksheet has no header row")?
        .iter()
        .map(cell_to_string)
        .collect();

    let mut rows = Vec::new();
    for record in rows_iter {
        rows.push(Row {
            values: headers
                .iter()
                .cloned()
                .zip(record.iter().map(cell_to_string))
                .collect(),
        });
    }
    Ok(rows)
}

fn cell_to_string(cell: &DataType) -> String {
    match cell {
        DataType::Empty => String::new(),
        DataType::String(s) => s.trim().to_string(),
        DataType::DateTime(serial) => excel_date_to_iso(*serial),
        _ => cell.to_string().trim().to_string(),
    }
}

/// Excel datetime serials become ISO dates; the time-of-day fraction is
/// dropped, matching the marksheet convention of date-only cells.
fn excel_date_to_iso(serial: f64) -> String {
    let days = serial.floor();
    if days < 0.0 {
        return String::new();
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|epoch| epoch.checked_add_days(Days::new(days as u64)))
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{excel_date_to_iso, read_table, Row};

    #[test]
    fn missing_column_reads_empty() {
        let row = Row::from_pairs([("Learner Name", "Jane")]);
        assert_eq!(row.field("Learner Name"), "Jane");
        assert_eq!(row.field("No Such Column"), "");
    }

    #[test]
    fn csv_bom_does_not_leak_into_first_header() {
        let mut file = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .expect("temp csv");
        file.write_all(b"\xEF\xBB\xBFLearner Name,Learner Registration Number\nJane Doe,R123\n")
            .expect("write csv");
        let rows = read_table(file.path()).expect("read csv");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].field("Learner Name"), "Jane Doe");
        assert_eq!(rows[0].field("Learner Registration Number"), "R123");
    }

    #[test]
    fn blank_and_short_records_are_kept() {
        let mut file = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .expect("temp csv");
        file.write_all(b"Learner Name,Learner Registration Number\n,\nJane\n")
            .expect("write csv");
        let rows = read_table(file.path()).expect("read csv");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].field("Learner Name"), "");
        assert_eq!(rows[1].field("Learner Name"), "Jane");
        assert_eq!(rows[1].field("Learner Registration Number"), "");
    }

    #[test]
    fn excel_serials_render_as_iso_dates() {
        assert_eq!(excel_date_to_iso(45658.0), "2025-01-01");
        assert_eq!(excel_date_to_iso(45658.75), "2025-01-01");
        assert_eq!(excel_date_to_iso(1.0), "1899-12-31");
    }
}
