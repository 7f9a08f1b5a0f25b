//! Turns uploaded bytes into uniform [`Record`]s.
//!
//! Two shapes are accepted: delimited text (CSV exports, published sheets)
//! and workbooks. Both end up as header-keyed rows with blank rows removed,
//! so downstream stages never care where the data came from.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use log::debug;

use crate::error::{InsightsError, Result};
use crate::schema::{Record, SourceKind};

const CSV_UNREADABLE: &str =
    "Could not parse as CSV. If this is an Excel file, upload .xlsx/.xls directly.";
const CSV_EMPTY: &str = "No rows found in upload";
const EXCEL_UNREADABLE: &str =
    "Could not read Excel file. If this is a CSV export, upload it as .csv instead.";
const EXCEL_EMPTY: &str = "No rows found in Excel";

/// Dispatches to the parser for `kind`.
pub fn parse_records(content: &[u8], kind: SourceKind) -> Result<Vec<Record>> {
    match kind {
        SourceKind::DelimitedText => parse_csv(content),
        SourceKind::Spreadsheet => parse_spreadsheet(content),
    }
}

/// Parses delimited text with the first row as header.
///
/// Invalid UTF-8 is dropped rather than rejected. Short rows are padded
/// with empty strings and surplus fields are ignored.
pub fn parse_csv(content: &[u8]) -> Result<Vec<Record>> {
    let text = decode_lossy(content);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| {
            debug!("CSV header read failed: {}", e);
            InsightsError::parse(CSV_UNREADABLE)
        })?
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            if idx == 0 {
                name.trim_start_matches('\u{feff}').to_string()
            } else {
                name.to_string()
            }
        })
        .collect();

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for result in reader.records() {
        let row = result.map_err(|e| {
            debug!("CSV row read failed: {}", e);
            InsightsError::parse(CSV_UNREADABLE)
        })?;

        let record: Record = headers
            .iter()
            .enumerate()
            .map(|(idx, header)| (header.as_str(), row.get(idx).unwrap_or("")))
            .collect();

        if record.is_blank() {
            skipped += 1;
            continue;
        }
        records.push(record);
    }

    debug!(
        "Parsed {} CSV rows across {} columns ({} blank rows dropped)",
        records.len(),
        headers.len(),
        skipped
    );

    if records.is_empty() {
        return Err(InsightsError::parse(CSV_EMPTY));
    }
    Ok(records)
}

/// Parses the first sheet of a workbook (xlsx, xlsm, xls, ods).
pub fn parse_spreadsheet(content: &[u8]) -> Result<Vec<Record>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(content.to_vec())).map_err(|e| {
        debug!("Workbook open failed: {}", e);
        InsightsError::parse(EXCEL_UNREADABLE)
    })?;

    let range = match workbook.worksheet_range_at(0) {
        Some(Ok(range)) => range,
        Some(Err(e)) => {
            debug!("First sheet could not be read: {}", e);
            return Err(InsightsError::parse(EXCEL_UNREADABLE));
        }
        None => return Err(InsightsError::parse(EXCEL_EMPTY)),
    };

    let grid: Vec<Vec<String>> = range
        .rows()
        .map(|row| row.iter().map(render_cell).collect())
        .collect();

    records_from_grid(&grid)
}

/// Zips rows of rendered cells against the first row as header.
///
/// Headers are trimmed and blank headers are skipped along with their
/// column. Cells missing at the end of a row read as empty strings.
pub fn records_from_grid(grid: &[Vec<String>]) -> Result<Vec<Record>> {
    let Some((header_row, body)) = grid.split_first() else {
        return Err(InsightsError::parse(EXCEL_EMPTY));
    };

    let headers: Vec<String> = header_row.iter().map(|h| h.trim().to_string()).collect();

    let records: Vec<Record> = body
        .iter()
        .map(|row| {
            headers
                .iter()
                .enumerate()
                .filter(|(_, header)| !header.is_empty())
                .map(|(idx, header)| {
                    (
                        header.as_str(),
                        row.get(idx).map(String::as_str).unwrap_or(""),
                    )
                })
                .collect::<Record>()
        })
        .filter(|record| record.values().any(|v| !v.is_empty()))
        .collect();

    debug!(
        "Parsed {} sheet rows from {} grid rows",
        records.len(),
        body.len()
    );

    if records.is_empty() {
        return Err(InsightsError::parse(EXCEL_EMPTY));
    }
    Ok(records)
}

fn decode_lossy(content: &[u8]) -> String {
    content.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

fn render_cell(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) if naive.time() == chrono::NaiveTime::MIN => {
                naive.format("%Y-%m-%d").to_string()
            }
            Some(naive) => naive.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => dt.as_f64().to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_parse_csv_basic() {
        let csv = b"Date,Sales,SKU\n2024-01-01,100,A\n2024-01-02,200,B\n";
        let records = parse_csv(csv).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].columns().collect::<Vec<_>>(),
            vec!["Date", "Sales", "SKU"]
        );
        assert_eq!(records[1].get("Sales"), Some("200"));
    }

    #[test]
    fn test_parse_csv_drops_blank_rows() {
        let csv = b"Date,Sales\n2024-01-01,100\n,\n  ,  \n2024-01-02,5\n";
        let records = parse_csv(csv).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("Date"), Some("2024-01-02"));
    }

    #[test]
    fn test_parse_csv_drops_invalid_bytes() {
        let mut csv = b"Date,Sales\n2024-01-01,1".to_vec();
        csv.push(0xff);
        csv.extend_from_slice(b"00\n");
        let records = parse_csv(&csv).unwrap();
        assert_eq!(records[0].get("Sales"), Some("100"));
    }

    #[test]
    fn test_parse_csv_keeps_literal_replacement_character() {
        let mut csv = "Date,Sales,Note\n2024-01-01,5,bad \u{fffd} glyph".as_bytes().to_vec();
        csv.push(0xc3);
        csv.push(b'\n');
        let records = parse_csv(&csv).unwrap();
        assert_eq!(records[0].get("Note"), Some("bad \u{fffd} glyph"));
    }

    #[test]
    fn test_parse_csv_strips_bom_and_pads_short_rows() {
        let csv = "\u{feff}Date,Sales,Region\n2024-01-01,10\n".as_bytes();
        let records = parse_csv(csv).unwrap();
        assert_eq!(records[0].get("Date"), Some("2024-01-01"));
        assert_eq!(records[0].get("Region"), Some(""));
    }

    #[test]
    fn test_parse_csv_header_only_is_an_error() {
        let err = parse_csv(b"Date,Sales\n").unwrap_err();
        assert_eq!(err, InsightsError::parse("No rows found in upload"));

        let err = parse_csv(b"").unwrap_err();
        assert_eq!(err, InsightsError::parse("No rows found in upload"));
    }

    #[test]
    fn test_records_from_grid_skips_blank_headers() {
        let rows = grid(&[
            &[" Date ", "", "Revenue"],
            &["2024-01-01", "ignored", "10"],
            &["2024-01-02"],
        ]);
        let records = records_from_grid(&rows).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].columns().collect::<Vec<_>>(),
            vec!["Date", "Revenue"]
        );
        assert_eq!(records[1].get("Revenue"), Some(""));
    }

    #[test]
    fn test_records_from_grid_drops_rows_with_only_unmapped_values() {
        let rows = grid(&[&["Date", "", "Revenue"], &["", "stray", ""], &["x", "", ""]]);
        let records = records_from_grid(&rows).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("Date"), Some("x"));
    }

    #[test]
    fn test_records_from_grid_empty() {
        assert_eq!(
            records_from_grid(&[]).unwrap_err(),
            InsightsError::parse("No rows found in Excel")
        );
        let header_only = grid(&[&["Date", "Revenue"]]);
        assert!(records_from_grid(&header_only).is_err());
    }

    #[test]
    fn test_parse_spreadsheet_rejects_non_workbook() {
        let err = parse_spreadsheet(b"Date,Sales\n2024-01-01,1\n").unwrap_err();
        match err {
            InsightsError::Parse(message) => assert!(message.contains(".csv")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_render_cell() {
        assert_eq!(render_cell(&Data::Empty), "");
        assert_eq!(render_cell(&Data::Int(7)), "7");
        assert_eq!(render_cell(&Data::Float(12.5)), "12.5");
        assert_eq!(render_cell(&Data::Float(100.0)), "100");
        assert_eq!(render_cell(&Data::String("A".to_string())), "A");
        assert_eq!(render_cell(&Data::Bool(true)), "true");
    }
}
