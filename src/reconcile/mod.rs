//! Ingestion and reconciliation orchestration
//!
//! Glues the statement parser to the backing store: one statement row per
//! upload, chunked transaction inserts, and name->id resolution against the
//! cached classification hierarchy when an operator reconciles a transaction.

use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::{CacheKind, LookupCache, LookupSnapshot};
use crate::db::{
    self,
    models::{Bank, ChartPlan, Classification, LineItem, Statement, TransactionStatus},
};
use crate::error::ConciliaError;
use crate::importers;

/// Backend payload limits make very large single inserts fragile; statement
/// uploads go in in blocks of this size.
const INSERT_CHUNK_SIZE: usize = 100;

#[derive(Debug, Serialize)]
pub struct IngestReport {
    pub statement_id: String,
    pub transactions_parsed: usize,
    pub transactions_inserted: usize,
    pub failed_chunks: usize,
}

/// Parse an uploaded statement and persist it.
///
/// The statement record is inserted first, then transactions in chunks of
/// 100. A failed chunk is logged and skipped; chunks already committed are
/// kept, since parsed rows are independent records.
pub fn ingest_statement(
    conn: &mut Connection,
    bytes: &[u8],
    filename: &str,
    bank: Bank,
) -> Result<IngestReport> {
    let mut transactions = importers::parse_statement(bytes, filename, bank)
        .with_context(|| format!("failed to ingest {}", filename))?;

    let statement = Statement {
        id: Uuid::new_v4().to_string(),
        bank,
        source_filename: filename.to_string(),
        transaction_count: transactions.len() as i64,
        processed_at: Utc::now(),
        status: "PROCESSED".to_string(),
    };
    db::insert_statement(conn, &statement)?;

    for tx in &mut transactions {
        tx.statement_id = Some(statement.id.clone());
    }

    let mut inserted = 0;
    let mut failed_chunks = 0;
    for (chunk_idx, chunk) in transactions.chunks(INSERT_CHUNK_SIZE).enumerate() {
        match db::insert_transaction_chunk(conn, chunk) {
            Ok(()) => inserted += chunk.len(),
            Err(e) => {
                warn!(
                    "Chunk {} of statement {} failed ({} transactions): {}",
                    chunk_idx,
                    statement.id,
                    chunk.len(),
                    e
                );
                failed_chunks += 1;
            }
        }
    }

    info!(
        "Ingested statement {} from {}: {} parsed, {} inserted",
        statement.id,
        filename,
        transactions.len(),
        inserted
    );

    Ok(IngestReport {
        statement_id: statement.id,
        transactions_parsed: transactions.len(),
        transactions_inserted: inserted,
        failed_chunks,
    })
}

/// Load the classification hierarchy from the backing store into the cache.
pub fn load_lookups(conn: &Connection, cache: &LookupCache) -> Result<()> {
    let classifications = db::list_classifications(conn)?;
    let plans = db::list_chart_plans(conn)?;
    let items = db::list_line_items(conn)?;
    info!(
        "Loaded lookup hierarchy: {} classifications, {} plans, {} items",
        classifications.len(),
        plans.len(),
        items.len()
    );
    cache.set_all_lookups(classifications, plans, items);
    Ok(())
}

/// Cached hierarchy snapshot with one forced reload on miss.
fn snapshot_with_reload(conn: &Connection, cache: &LookupCache) -> Result<LookupSnapshot> {
    if let Some(snapshot) = cache.get_all_lookups() {
        return Ok(snapshot);
    }
    load_lookups(conn, cache)?;
    cache
        .get_all_lookups()
        .ok_or_else(|| anyhow!("lookup hierarchy unavailable after reload"))
}

/// Point lookup by id, reloading the hierarchy once on miss before
/// concluding the id is unknown.
pub fn classification_by_id(
    conn: &Connection,
    cache: &LookupCache,
    id: i64,
) -> Result<Option<Classification>> {
    if let Some(found) = cache.get_classification_by_id(id) {
        return Ok(Some(found));
    }
    load_lookups(conn, cache)?;
    Ok(cache.get_classification_by_id(id))
}

pub fn plan_by_id(conn: &Connection, cache: &LookupCache, id: i64) -> Result<Option<ChartPlan>> {
    if let Some(found) = cache.get_plan_by_id(id) {
        return Ok(Some(found));
    }
    load_lookups(conn, cache)?;
    Ok(cache.get_plan_by_id(id))
}

pub fn item_by_id(conn: &Connection, cache: &LookupCache, id: i64) -> Result<Option<LineItem>> {
    if let Some(found) = cache.get_item_by_id(id) {
        return Ok(Some(found));
    }
    load_lookups(conn, cache)?;
    Ok(cache.get_item_by_id(id))
}

/// Operator input for reconciling one transaction. Hierarchy levels are
/// entered by name and resolved to foreign keys through the cache.
#[derive(Debug, Clone)]
pub struct ReconcileRequest {
    pub classification: String,
    pub plan: String,
    pub line_item: String,
    pub cost_center: Option<String>,
    pub recipient_name: Option<String>,
    pub reference_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub reconciled_by: String,
}

/// Assign a transaction to the accounting hierarchy and mark it reconciled.
///
/// Irreversible: an already-reconciled transaction is refused. The plan must
/// belong to the named classification and the item to the named plan.
pub fn reconcile_transaction(
    conn: &Connection,
    cache: &LookupCache,
    transaction_id: &str,
    request: &ReconcileRequest,
) -> Result<db::Transaction> {
    let mut tx = db::get_transaction(conn, transaction_id)?
        .ok_or_else(|| anyhow!("Transaction {} not found", transaction_id))?;

    if tx.status == TransactionStatus::Reconciled {
        return Err(ConciliaError::Validation(format!(
            "transaction {} is already reconciled",
            transaction_id
        ))
        .into());
    }

    let snapshot = snapshot_with_reload(conn, cache)?;

    let classification = snapshot
        .classifications
        .values()
        .find(|c| c.name == request.classification)
        .ok_or_else(|| {
            ConciliaError::Validation(format!(
                "unknown classification '{}'",
                request.classification
            ))
        })?;

    let plan = snapshot
        .plans
        .values()
        .find(|p| p.classification_id == classification.id && p.name == request.plan)
        .ok_or_else(|| {
            ConciliaError::Validation(format!(
                "unknown plan '{}' under classification '{}'",
                request.plan, request.classification
            ))
        })?;

    let item = snapshot
        .items
        .values()
        .find(|i| i.plan_id == plan.id && i.name == request.line_item)
        .ok_or_else(|| {
            ConciliaError::Validation(format!(
                "unknown line item '{}' under plan '{}'",
                request.line_item, request.plan
            ))
        })?;

    tx.status = TransactionStatus::Reconciled;
    tx.classification_id = Some(classification.id);
    tx.plan_id = Some(plan.id);
    tx.line_item_id = Some(item.id);
    tx.cost_center = request.cost_center.clone();
    tx.recipient_name = request.recipient_name.clone();
    tx.reference_date = request.reference_date;
    tx.notes = request.notes.clone();
    tx.reconciled_at = Some(Utc::now());
    tx.reconciled_by = Some(request.reconciled_by.clone());

    db::update_reconciliation(conn, &tx)?;

    // Reconciliation changes the statistics, not the hierarchy
    cache.invalidate_pattern("stats:*", None);

    info!(
        "Reconciled transaction {} to {}/{}/{}",
        tx.id, request.classification, request.plan, request.line_item
    );
    Ok(tx)
}

/// Transactional statistics, cached under the short statistics TTL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    pub pending: i64,
    pub reconciled: i64,
    pub total_credits: Decimal,
    pub total_debits: Decimal,
}

const SUMMARY_KEY: &str = "stats:summary";

pub fn statement_summary(conn: &Connection, cache: &LookupCache) -> Result<Summary> {
    if let Some(json) = cache.get(SUMMARY_KEY, CacheKind::Statistics) {
        if let Ok(summary) = serde_json::from_str(&json) {
            return Ok(summary);
        }
    }

    let transactions = db::list_transactions(conn, None)?;
    let mut summary = Summary {
        pending: 0,
        reconciled: 0,
        total_credits: Decimal::ZERO,
        total_debits: Decimal::ZERO,
    };
    for tx in &transactions {
        match tx.status {
            TransactionStatus::Pending => summary.pending += 1,
            TransactionStatus::Reconciled => summary.reconciled += 1,
        }
        if tx.amount >= Decimal::ZERO {
            summary.total_credits += tx.amount;
        } else {
            summary.total_debits += tx.amount;
        }
    }

    if let Ok(json) = serde_json::to_string(&summary) {
        cache.set(SUMMARY_KEY, &json, CacheKind::Statistics);
    }
    Ok(summary)
}
