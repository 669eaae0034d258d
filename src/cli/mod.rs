use clap::{Parser, Subcommand};

pub mod formatters;

#[derive(Parser)]
#[command(name = "concilia")]
#[command(version, about = "Bank-statement reconciliation backend")]
#[command(
    long_about = "Ingest bank extract files (CSV/Excel), auto-classify payment method and counterparty, and reconcile transactions against the accounting hierarchy."
)]
pub struct Cli {
    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database schema
    Init,

    /// Import a bank statement file (CSV or Excel)
    Import {
        /// Path to the statement file
        file: String,

        /// Source bank (BANK_A or BANK_B)
        #[arg(short, long)]
        bank: String,

        /// Preview only, don't save to database
        #[arg(short, long)]
        dry_run: bool,
    },

    /// List transactions
    List {
        /// Filter by status (PENDING or RECONCILED)
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Reconcile a transaction against the accounting hierarchy
    Reconcile {
        /// Transaction id
        id: String,

        /// Classification name
        #[arg(long)]
        classification: String,

        /// Chart-of-accounts plan name (within the classification)
        #[arg(long)]
        plan: String,

        /// Line item name (within the plan)
        #[arg(long)]
        item: String,

        /// Cost center label
        #[arg(long)]
        cost_center: Option<String>,

        /// Recipient name
        #[arg(long)]
        recipient: Option<String>,

        /// Reference date (YYYY-MM-DD)
        #[arg(long)]
        reference_date: Option<String>,

        /// Free-text notes
        #[arg(long)]
        notes: Option<String>,

        /// Operator identifier recorded on the transaction
        #[arg(long)]
        by: String,
    },

    /// Accounting hierarchy management
    Lookups {
        #[command(subcommand)]
        action: LookupCommands,
    },

    /// Transaction statistics and cache health
    Stats,
}

#[derive(Subcommand)]
pub enum LookupCommands {
    /// Show the classification hierarchy
    Show,

    /// Reload the hierarchy into the cache
    Reload,

    /// Add a classification
    AddClassification { name: String },

    /// Add a plan under a classification
    AddPlan {
        classification_id: i64,
        name: String,
    },

    /// Add a line item under a plan
    AddItem { plan_id: i64, name: String },
}
