// Import module - bank statement CSV and Excel parsers

pub mod currency;
mod statement_csv;
mod statement_excel;

use anyhow::Result;
use calamine::{Data, DataType};
use chrono::{NaiveDate, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::classify;
use crate::db::models::{Bank, Transaction, TransactionStatus};
use crate::error::ConciliaError;

pub use currency::{cell_to_decimal, normalize_brl};

/// Required statement columns (exact header text after trimming)
const COL_DATE: &str = "Data";
const COL_NARRATION: &str = "Histórico";
const COL_AMOUNT: &str = "Valor (R$)";
/// Optional columns
const COL_DOCUMENT: &str = "Documento";
const COL_BALANCE: &str = "Saldo (R$)";

/// Marker phrase for the prior-balance row, which is not a real transaction
const PRIOR_BALANCE_MARKER: &str = "SALDO ANTERIOR";

/// Missing-value sentinels normalized to empty cells
const MISSING_SENTINELS: &[&str] = &["", "nan", "NaN", "null", "NULL"];

/// Decoded tabular statement data, format-independent.
/// CSV fields become string cells so both paths share row processing.
#[derive(Debug)]
pub(crate) struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Data>>,
    /// Records the reader could not decode at all, already warned about
    pub skipped_records: usize,
}

/// Parse an uploaded statement file into transactions.
///
/// Structural failures (unreadable file, missing required columns) abort the
/// whole upload with a [`ConciliaError::Parse`]. Row-level failures are
/// absorbed: the bad row is skipped with a logged warning and parsing
/// continues, so a statement with some malformed rows still ingests the
/// well-formed ones.
pub fn parse_statement(bytes: &[u8], filename: &str, bank: Bank) -> Result<Vec<Transaction>> {
    info!("Parsing statement file: {} ({})", filename, bank.as_str());

    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();

    let table = match extension.as_str() {
        "csv" => statement_csv::read_csv(bytes)?,
        "xlsx" | "xls" => statement_excel::read_excel(bytes)?,
        _ => {
            return Err(ConciliaError::Parse(format!(
                "unsupported file format '{}'; supported: .csv, .xlsx, .xls",
                extension
            ))
            .into())
        }
    };

    let mapping = find_columns(&table.headers)?;

    let mut transactions = Vec::new();
    for (idx, row) in table.rows.iter().enumerate() {
        match row_to_transaction(row, &mapping, bank) {
            Ok(Some(tx)) => transactions.push(tx),
            Ok(None) => continue, // balance marker or empty-date row
            Err(e) => {
                warn!("Skipping row {}: {}", idx + 2, e);
                continue;
            }
        }
    }

    info!(
        "Converted {} of {} readable data rows into transactions ({} unreadable records skipped)",
        transactions.len(),
        table.rows.len(),
        table.skipped_records
    );
    Ok(transactions)
}

#[derive(Debug)]
struct ColumnMapping {
    date: usize,
    narration: usize,
    amount: usize,
    document: Option<usize>,
    balance: Option<usize>,
}

fn find_columns(headers: &[String]) -> Result<ColumnMapping> {
    let index_of = |name: &str| headers.iter().position(|h| h == name);

    let date = index_of(COL_DATE);
    let narration = index_of(COL_NARRATION);
    let amount = index_of(COL_AMOUNT);

    let missing: Vec<&str> = [
        (COL_DATE, date),
        (COL_NARRATION, narration),
        (COL_AMOUNT, amount),
    ]
    .iter()
    .filter(|(_, idx)| idx.is_none())
    .map(|(name, _)| *name)
    .collect();

    if !missing.is_empty() {
        return Err(ConciliaError::Parse(format!(
            "missing required columns: {}",
            missing.join(", ")
        ))
        .into());
    }

    Ok(ColumnMapping {
        date: date.unwrap(),
        narration: narration.unwrap(),
        amount: amount.unwrap(),
        document: index_of(COL_DOCUMENT),
        balance: index_of(COL_BALANCE),
    })
}

/// Convert one data row. `Ok(None)` means the row is deliberately skipped
/// (no date, or the prior-balance marker); `Err` means it was malformed.
fn row_to_transaction(
    row: &[Data],
    mapping: &ColumnMapping,
    bank: Bank,
) -> Result<Option<Transaction>> {
    let date_cell = row.get(mapping.date).unwrap_or(&Data::Empty);
    if matches!(date_cell, Data::Empty) {
        return Ok(None);
    }
    let date = parse_date_cell(date_cell)?;

    // as_string() so numeric cells stringify; portal exports often carry
    // document numbers as numeric Excel cells
    let narration = row
        .get(mapping.narration)
        .and_then(|c| c.as_string())
        .unwrap_or_default()
        .trim()
        .to_string();

    if narration.to_uppercase().contains(PRIOR_BALANCE_MARKER) {
        return Ok(None);
    }

    let document = mapping
        .document
        .and_then(|idx| row.get(idx))
        .and_then(|c| c.as_string())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let amount = row
        .get(mapping.amount)
        .map(cell_to_decimal)
        .unwrap_or_default();

    let balance = mapping
        .balance
        .and_then(|idx| row.get(idx))
        .map(cell_to_decimal)
        .unwrap_or_default();

    Ok(Some(Transaction {
        id: Uuid::new_v4().to_string(),
        statement_id: None,
        bank,
        date,
        document,
        amount,
        balance,
        kind: classify::detect_transaction_kind(&narration),
        status: TransactionStatus::Pending,
        payment_method: classify::detect_payment_method(&narration),
        counterparty: classify::detect_counterparty(&narration),
        narration,
        payment_date: date,
        cost_center: None,
        classification_id: None,
        plan_id: None,
        line_item_id: None,
        recipient_name: None,
        reference_date: None,
        notes: None,
        reconciled_at: None,
        reconciled_by: None,
        created_at: Utc::now(),
    }))
}

/// Parse a date cell: Excel datetime cells directly, text cells in the common
/// Brazilian formats plus ISO.
fn parse_date_cell(cell: &Data) -> Result<NaiveDate> {
    match cell {
        Data::DateTime(dt) => {
            // Excel serial date, epoch 1899-12-30
            let days = dt.as_f64().trunc() as i64;
            let base = NaiveDate::from_ymd_opt(1899, 12, 30)
                .ok_or_else(|| anyhow::anyhow!("invalid epoch"))?;
            base.checked_add_signed(chrono::Duration::days(days))
                .ok_or_else(|| anyhow::anyhow!("Excel serial date out of range: {}", days))
        }
        Data::String(s) => parse_date(s.trim()),
        other => parse_date(other.to_string().trim()),
    }
}

/// Parse date from Brazilian formats (DD/MM/YYYY first) or ISO
fn parse_date(date_str: &str) -> Result<NaiveDate> {
    // Timestamps like "2025-03-10 00:00:00" keep only the date part
    let date_part = date_str.split_whitespace().next().unwrap_or(date_str);

    for format in ["%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d", "%d/%m/%y"] {
        if let Ok(date) = NaiveDate::parse_from_str(date_part, format) {
            return Ok(date);
        }
    }

    Err(anyhow::anyhow!("Could not parse date: {}", date_str))
}

/// Normalize the missing-value sentinels to an empty cell.
pub(crate) fn normalize_cell(cell: Data) -> Data {
    if let Data::String(ref s) = cell {
        if MISSING_SENTINELS.contains(&s.trim()) {
            return Data::Empty;
        }
    }
    cell
}
