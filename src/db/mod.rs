// Database module - SQLite connection and models

pub mod models;

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

pub use models::{
    Bank, ChartPlan, Classification, LineItem, PaymentMethod, Statement, Transaction,
    TransactionKind, TransactionStatus,
};

/// Open database connection
pub fn open_db(db_path: Option<PathBuf>) -> Result<Connection> {
    let path = match db_path {
        Some(p) => p,
        None => crate::config::default_db_path()?,
    };
    let conn = Connection::open(&path).context(format!("Failed to open database at {:?}", path))?;

    // Enable foreign keys
    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("Failed to enable foreign keys")?;

    Ok(conn)
}

/// Initialize the database with schema
///
/// Creates the database file and runs the schema SQL to set up all
/// tables and indexes.
pub fn init_database(db_path: Option<PathBuf>) -> Result<()> {
    let path = match db_path {
        Some(p) => p,
        None => crate::config::default_db_path()?,
    };

    info!("Initializing database at: {:?}", path);

    let conn = open_db(Some(path))?;

    let schema_sql = include_str!("schema.sql");

    conn.execute_batch(schema_sql)
        .context("Failed to execute schema")?;

    info!("Database initialized successfully");
    Ok(())
}

/// Insert statement record
pub fn insert_statement(conn: &Connection, statement: &Statement) -> Result<()> {
    conn.execute(
        "INSERT INTO statements (id, bank, source_filename, transaction_count, processed_at, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            statement.id,
            statement.bank.as_str(),
            statement.source_filename,
            statement.transaction_count,
            statement.processed_at,
            statement.status,
        ],
    )?;
    Ok(())
}

pub fn get_statement(conn: &Connection, id: &str) -> Result<Option<Statement>> {
    let mut stmt = conn.prepare(
        "SELECT id, bank, source_filename, transaction_count, processed_at, status
         FROM statements WHERE id = ?1",
    )?;
    let statement = stmt
        .query_row([id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, chrono::DateTime<chrono::Utc>>(4)?,
                row.get::<_, String>(5)?,
            ))
        })
        .optional()?;

    match statement {
        Some((id, bank, source_filename, transaction_count, processed_at, status)) => {
            let bank = bank
                .parse::<Bank>()
                .map_err(|_| anyhow!("Unknown bank '{}' in statements table", bank))?;
            Ok(Some(Statement {
                id,
                bank,
                source_filename,
                transaction_count,
                processed_at,
                status,
            }))
        }
        None => Ok(None),
    }
}

/// Insert a single parsed transaction
pub fn insert_transaction(conn: &Connection, tx: &Transaction) -> Result<()> {
    conn.execute(
        "INSERT INTO transactions (
            id, statement_id, bank, date, narration, document,
            amount, balance, kind, status, payment_method, counterparty,
            payment_date, cost_center, classification_id, plan_id, line_item_id,
            recipient_name, reference_date, notes, reconciled_at, reconciled_by, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                  ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)",
        params![
            tx.id,
            tx.statement_id,
            tx.bank.as_str(),
            tx.date,
            tx.narration,
            tx.document,
            tx.amount.to_string(),
            tx.balance.to_string(),
            tx.kind.as_str(),
            tx.status.as_str(),
            tx.payment_method.as_str(),
            tx.counterparty,
            tx.payment_date,
            tx.cost_center,
            tx.classification_id,
            tx.plan_id,
            tx.line_item_id,
            tx.recipient_name,
            tx.reference_date,
            tx.notes,
            tx.reconciled_at,
            tx.reconciled_by,
            tx.created_at,
        ],
    )?;
    Ok(())
}

/// Insert a chunk of transactions inside one SQL transaction.
/// Fails atomically: either the whole chunk commits or none of it does.
pub fn insert_transaction_chunk(conn: &mut Connection, chunk: &[Transaction]) -> Result<()> {
    let sql_tx = conn.transaction()?;
    for tx in chunk {
        insert_transaction(&sql_tx, tx)?;
    }
    sql_tx.commit()?;
    Ok(())
}

const TRANSACTION_COLUMNS: &str = "id, statement_id, bank, date, narration, document, \
     amount, balance, kind, status, payment_method, counterparty, \
     payment_date, cost_center, classification_id, plan_id, line_item_id, \
     recipient_name, reference_date, notes, reconciled_at, reconciled_by, created_at";

fn transaction_from_row(row: &Row) -> Result<Transaction> {
    let bank_str: String = row.get(2)?;
    let kind_str: String = row.get(8)?;
    let status_str: String = row.get(9)?;
    let method_str: String = row.get(10)?;

    Ok(Transaction {
        id: row.get(0)?,
        statement_id: row.get(1)?,
        bank: bank_str
            .parse::<Bank>()
            .map_err(|_| anyhow!("Unknown bank '{}' in transactions table", bank_str))?,
        date: row.get(3)?,
        narration: row.get(4)?,
        document: row.get(5)?,
        amount: get_decimal(row, 6)?,
        balance: get_decimal(row, 7)?,
        kind: kind_str
            .parse::<TransactionKind>()
            .map_err(|_| anyhow!("Unknown transaction kind '{}'", kind_str))?,
        status: status_str
            .parse::<TransactionStatus>()
            .map_err(|_| anyhow!("Unknown status '{}'", status_str))?,
        payment_method: method_str
            .parse::<PaymentMethod>()
            .map_err(|_| anyhow!("Unknown payment method '{}'", method_str))?,
        counterparty: row.get(11)?,
        payment_date: row.get(12)?,
        cost_center: row.get(13)?,
        classification_id: row.get(14)?,
        plan_id: row.get(15)?,
        line_item_id: row.get(16)?,
        recipient_name: row.get(17)?,
        reference_date: row.get(18)?,
        notes: row.get(19)?,
        reconciled_at: row.get(20)?,
        reconciled_by: row.get(21)?,
        created_at: row.get(22)?,
    })
}

fn get_decimal(row: &Row, idx: usize) -> Result<Decimal> {
    let text: String = row.get(idx)?;
    Decimal::from_str(&text).context(format!("Failed to parse stored decimal '{}'", text))
}

pub fn get_transaction(conn: &Connection, id: &str) -> Result<Option<Transaction>> {
    let sql = format!("SELECT {} FROM transactions WHERE id = ?1", TRANSACTION_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([id])?;
    match rows.next()? {
        Some(row) => Ok(Some(transaction_from_row(row)?)),
        None => Ok(None),
    }
}

/// List transactions, optionally filtered by status, newest first
pub fn list_transactions(
    conn: &Connection,
    status: Option<TransactionStatus>,
) -> Result<Vec<Transaction>> {
    let sql = match status {
        Some(_) => format!(
            "SELECT {} FROM transactions WHERE status = ?1 ORDER BY date DESC, created_at DESC",
            TRANSACTION_COLUMNS
        ),
        None => format!(
            "SELECT {} FROM transactions ORDER BY date DESC, created_at DESC",
            TRANSACTION_COLUMNS
        ),
    };
    let mut stmt = conn.prepare(&sql)?;

    let mut out = Vec::new();
    let mut rows = match status {
        Some(s) => stmt.query([s.as_str()])?,
        None => stmt.query([])?,
    };
    while let Some(row) = rows.next()? {
        out.push(transaction_from_row(row)?);
    }
    Ok(out)
}

/// Persist the reconciliation outcome for a transaction.
/// The caller has already validated the hierarchy ids and the status transition.
pub fn update_reconciliation(conn: &Connection, tx: &Transaction) -> Result<()> {
    let updated = conn.execute(
        "UPDATE transactions SET
            status = ?1, cost_center = ?2, classification_id = ?3, plan_id = ?4,
            line_item_id = ?5, recipient_name = ?6, reference_date = ?7, notes = ?8,
            reconciled_at = ?9, reconciled_by = ?10
         WHERE id = ?11",
        params![
            tx.status.as_str(),
            tx.cost_center,
            tx.classification_id,
            tx.plan_id,
            tx.line_item_id,
            tx.recipient_name,
            tx.reference_date,
            tx.notes,
            tx.reconciled_at,
            tx.reconciled_by,
            tx.id,
        ],
    )?;
    if updated == 0 {
        return Err(anyhow!("Transaction {} not found", tx.id));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Classification hierarchy
// ---------------------------------------------------------------------------

pub fn insert_classification(conn: &Connection, name: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO classifications (name) VALUES (?1)",
        params![name],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_chart_plan(conn: &Connection, classification_id: i64, name: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO chart_plans (classification_id, name) VALUES (?1, ?2)",
        params![classification_id, name],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_line_item(conn: &Connection, plan_id: i64, name: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO line_items (plan_id, name) VALUES (?1, ?2)",
        params![plan_id, name],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_classifications(conn: &Connection) -> Result<Vec<Classification>> {
    let mut stmt = conn.prepare("SELECT id, name FROM classifications ORDER BY name")?;
    let rows = stmt.query_map([], |row| {
        Ok(Classification {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

pub fn list_chart_plans(conn: &Connection) -> Result<Vec<ChartPlan>> {
    let mut stmt =
        conn.prepare("SELECT id, classification_id, name FROM chart_plans ORDER BY name")?;
    let rows = stmt.query_map([], |row| {
        Ok(ChartPlan {
            id: row.get(0)?,
            classification_id: row.get(1)?,
            name: row.get(2)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

pub fn list_line_items(conn: &Connection) -> Result<Vec<LineItem>> {
    let mut stmt = conn.prepare("SELECT id, plan_id, name FROM line_items ORDER BY name")?;
    let rows = stmt.query_map([], |row| {
        Ok(LineItem {
            id: row.get(0)?,
            plan_id: row.get(1)?,
            name: row.get(2)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Delete a classification. Refused while any transaction or child plan
/// references it.
pub fn delete_classification(conn: &Connection, id: i64) -> Result<()> {
    let referenced: i64 = conn.query_row(
        "SELECT COUNT(*) FROM transactions WHERE classification_id = ?1",
        [id],
        |row| row.get(0),
    )?;
    let children: i64 = conn.query_row(
        "SELECT COUNT(*) FROM chart_plans WHERE classification_id = ?1",
        [id],
        |row| row.get(0),
    )?;
    if referenced > 0 || children > 0 {
        return Err(crate::error::ConciliaError::Validation(format!(
            "classification {} is still referenced ({} transactions, {} plans)",
            id, referenced, children
        ))
        .into());
    }
    conn.execute("DELETE FROM classifications WHERE id = ?1", [id])?;
    Ok(())
}

/// Delete a chart plan. Refused while any transaction or child item
/// references it.
pub fn delete_chart_plan(conn: &Connection, id: i64) -> Result<()> {
    let referenced: i64 = conn.query_row(
        "SELECT COUNT(*) FROM transactions WHERE plan_id = ?1",
        [id],
        |row| row.get(0),
    )?;
    let children: i64 = conn.query_row(
        "SELECT COUNT(*) FROM line_items WHERE plan_id = ?1",
        [id],
        |row| row.get(0),
    )?;
    if referenced > 0 || children > 0 {
        return Err(crate::error::ConciliaError::Validation(format!(
            "plan {} is still referenced ({} transactions, {} items)",
            id, referenced, children
        ))
        .into());
    }
    conn.execute("DELETE FROM chart_plans WHERE id = ?1", [id])?;
    Ok(())
}

/// Delete a line item. Refused while any transaction references it.
pub fn delete_line_item(conn: &Connection, id: i64) -> Result<()> {
    let referenced: i64 = conn.query_row(
        "SELECT COUNT(*) FROM transactions WHERE line_item_id = ?1",
        [id],
        |row| row.get(0),
    )?;
    if referenced > 0 {
        return Err(crate::error::ConciliaError::Validation(format!(
            "line item {} is still referenced by {} transactions",
            id, referenced
        ))
        .into());
    }
    conn.execute("DELETE FROM line_items WHERE id = ?1", [id])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify;
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn create_test_db() -> Result<(TempDir, Connection)> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("test.db");
        init_database(Some(db_path.clone()))?;
        let conn = open_db(Some(db_path))?;
        Ok((temp_dir, conn))
    }

    fn sample_transaction(narration: &str, amount: Decimal) -> Transaction {
        Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            statement_id: None,
            bank: Bank::BankA,
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            narration: narration.to_string(),
            document: None,
            amount,
            balance: dec!(0),
            kind: classify::detect_transaction_kind(narration),
            status: TransactionStatus::Pending,
            payment_method: classify::detect_payment_method(narration),
            counterparty: classify::detect_counterparty(narration),
            payment_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
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
        }
    }

    #[test]
    fn test_insert_and_fetch_transaction_roundtrip() {
        let (_tmp, conn) = create_test_db().unwrap();
        let tx = sample_transaction("PIX RECEBIDO JOAO DA SILVA", dec!(150.75));
        insert_transaction(&conn, &tx).unwrap();

        let fetched = get_transaction(&conn, &tx.id).unwrap().unwrap();
        assert_eq!(fetched.amount, dec!(150.75));
        assert_eq!(fetched.payment_method, PaymentMethod::Pix);
        assert_eq!(fetched.status, TransactionStatus::Pending);
        assert_eq!(fetched.narration, "PIX RECEBIDO JOAO DA SILVA");
    }

    #[test]
    fn test_list_transactions_filters_by_status() {
        let (_tmp, conn) = create_test_db().unwrap();
        insert_transaction(&conn, &sample_transaction("TARIFA MENSAL", dec!(-12.90))).unwrap();
        insert_transaction(&conn, &sample_transaction("TED RECEBIDA", dec!(900))).unwrap();

        let pending = list_transactions(&conn, Some(TransactionStatus::Pending)).unwrap();
        assert_eq!(pending.len(), 2);
        let reconciled = list_transactions(&conn, Some(TransactionStatus::Reconciled)).unwrap();
        assert!(reconciled.is_empty());
    }

    #[test]
    fn test_hierarchy_delete_guard() {
        let (_tmp, conn) = create_test_db().unwrap();
        let class_id = insert_classification(&conn, "Despesas").unwrap();
        let plan_id = insert_chart_plan(&conn, class_id, "Administrativas").unwrap();
        let item_id = insert_line_item(&conn, plan_id, "Energia").unwrap();

        // Classification has a child plan, plan has a child item
        assert!(delete_classification(&conn, class_id).is_err());
        assert!(delete_chart_plan(&conn, plan_id).is_err());

        // Item is unreferenced, deletes fine; then the chain unwinds
        delete_line_item(&conn, item_id).unwrap();
        delete_chart_plan(&conn, plan_id).unwrap();
        delete_classification(&conn, class_id).unwrap();
    }

    #[test]
    fn test_plan_name_unique_within_classification() {
        let (_tmp, conn) = create_test_db().unwrap();
        let a = insert_classification(&conn, "Receitas").unwrap();
        let b = insert_classification(&conn, "Despesas").unwrap();

        insert_chart_plan(&conn, a, "Vendas").unwrap();
        // Same name under another classification is allowed
        insert_chart_plan(&conn, b, "Vendas").unwrap();
        // Duplicate within the same classification is not
        assert!(insert_chart_plan(&conn, a, "Vendas").is_err());
    }
}
