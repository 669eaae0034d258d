//! Excel statement reader
//!
//! Reads the first worksheet of an xlsx/xls upload from the in-memory byte
//! buffer. No encoding or delimiter search is needed; cells only go through
//! the shared missing-value sentinel normalization.

use anyhow::Result;
use calamine::{open_workbook_auto_from_rs, Data, DataType, Reader};
use std::io::Cursor;

use super::{normalize_cell, RawTable};
use crate::error::ConciliaError;

pub(crate) fn read_excel(bytes: &[u8]) -> Result<RawTable> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook = open_workbook_auto_from_rs(cursor)
        .map_err(|e| ConciliaError::Parse(format!("could not open Excel file: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ConciliaError::Parse("Excel file has no worksheets".to_string()))?
        .map_err(|e| ConciliaError::Parse(format!("could not read first worksheet: {}", e)))?;

    let mut rows_iter = range.rows();
    let headers: Vec<String> = rows_iter
        .next()
        .ok_or_else(|| ConciliaError::Parse("Excel worksheet is empty".to_string()))?
        .iter()
        .map(|cell| cell.as_string().unwrap_or_default().trim().to_string())
        .collect();

    let rows: Vec<Vec<Data>> = rows_iter
        .map(|row| row.iter().map(|cell| normalize_cell(cell.clone())).collect())
        .collect();

    Ok(RawTable {
        headers,
        rows,
        skipped_records: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_bytes_rejected() {
        let err = read_excel(b"this is not a spreadsheet").unwrap_err();
        assert!(err.to_string().contains("could not open Excel file"));
    }
}
