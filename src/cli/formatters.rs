//! Output formatting module for CLI display
//!
//! Terminal output formatting, separating data access from presentation.

use colored::Colorize;
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

use crate::db::models::{Transaction, TransactionStatus};
use crate::reconcile::Summary;

#[derive(Tabled)]
struct TransactionRow {
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Narration")]
    narration: String,
    #[tabled(rename = "Counterparty")]
    counterparty: String,
    #[tabled(rename = "Method")]
    method: String,
    #[tabled(rename = "Amount")]
    amount: String,
    #[tabled(rename = "Status")]
    status: String,
}

/// Format a transaction list as a terminal table
pub fn format_transaction_table(transactions: &[Transaction]) -> String {
    let rows: Vec<TransactionRow> = transactions
        .iter()
        .map(|tx| TransactionRow {
            id: tx.id.chars().take(8).collect(),
            date: tx.date.format("%d/%m/%Y").to_string(),
            narration: truncate(&tx.narration, 40),
            counterparty: truncate(&tx.counterparty, 24),
            method: tx.payment_method.as_str().to_string(),
            amount: format!("{:.2}", tx.amount),
            status: match tx.status {
                TransactionStatus::Pending => "PENDING".yellow().to_string(),
                TransactionStatus::Reconciled => "RECONCILED".green().to_string(),
            },
        })
        .collect();

    if rows.is_empty() {
        return format!("{} No transactions found", "ℹ".blue().bold());
    }

    Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(5..6)).with(Alignment::right()))
        .to_string()
}

/// Format the statistics summary for terminal display
pub fn format_summary(summary: &Summary) -> String {
    format!(
        "\n{} Transactions\n\n  Pending:    {}\n  Reconciled: {}\n  Credits:    {}\n  Debits:     {}\n",
        "📊".cyan().bold(),
        summary.pending.to_string().yellow(),
        summary.reconciled.to_string().green(),
        format!("{:.2}", summary.total_credits).green(),
        format!("{:.2}", summary.total_debits).red(),
    )
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
