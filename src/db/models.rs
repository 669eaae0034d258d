use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Source banks for uploaded statements
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Bank {
    BankA,
    BankB,
}

impl Bank {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bank::BankA => "BANK_A",
            Bank::BankB => "BANK_B",
        }
    }
}

impl FromStr for Bank {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BANK_A" | "A" => Ok(Bank::BankA),
            "BANK_B" | "B" => Ok(Bank::BankB),
            _ => Err(()),
        }
    }
}

/// Transaction lifecycle status. Reconciliation is irreversible: there is no
/// transition back to Pending.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransactionStatus {
    Pending,
    Reconciled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Reconciled => "RECONCILED",
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(TransactionStatus::Pending),
            "RECONCILED" => Ok(TransactionStatus::Reconciled),
            _ => Err(()),
        }
    }
}

/// Payment method inferred from the narration at parse time. Never blank:
/// unmatched narrations classify as Other.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentMethod {
    Pix,
    Ted,
    Doc,
    AutomaticDebit,
    Card,
    Boleto,
    Transfer,
    Deposit,
    Withdrawal,
    Fee,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Pix => "PIX",
            PaymentMethod::Ted => "TED",
            PaymentMethod::Doc => "DOC",
            PaymentMethod::AutomaticDebit => "AUTOMATIC_DEBIT",
            PaymentMethod::Card => "CARD",
            PaymentMethod::Boleto => "BOLETO",
            PaymentMethod::Transfer => "TRANSFER",
            PaymentMethod::Deposit => "DEPOSIT",
            PaymentMethod::Withdrawal => "WITHDRAWAL",
            PaymentMethod::Fee => "FEE",
            PaymentMethod::Other => "OTHER",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PIX" => Ok(PaymentMethod::Pix),
            "TED" => Ok(PaymentMethod::Ted),
            "DOC" => Ok(PaymentMethod::Doc),
            "AUTOMATIC_DEBIT" => Ok(PaymentMethod::AutomaticDebit),
            "CARD" => Ok(PaymentMethod::Card),
            "BOLETO" => Ok(PaymentMethod::Boleto),
            "TRANSFER" => Ok(PaymentMethod::Transfer),
            "DEPOSIT" => Ok(PaymentMethod::Deposit),
            "WITHDRAWAL" => Ok(PaymentMethod::Withdrawal),
            "FEE" => Ok(PaymentMethod::Fee),
            "OTHER" => Ok(PaymentMethod::Other),
            _ => Err(()),
        }
    }
}

/// Coarse transaction type tag. Derived from its own keyword ladder, with a
/// vocabulary and precedence distinct from PaymentMethod.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransactionKind {
    Pix,
    Ted,
    Payment,
    Fee,
    Debit,
    Credit,
    Other,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Pix => "PIX",
            TransactionKind::Ted => "TED",
            TransactionKind::Payment => "PAYMENT",
            TransactionKind::Fee => "FEE",
            TransactionKind::Debit => "DEBIT",
            TransactionKind::Credit => "CREDIT",
            TransactionKind::Other => "OTHER",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PIX" => Ok(TransactionKind::Pix),
            "TED" => Ok(TransactionKind::Ted),
            "PAYMENT" => Ok(TransactionKind::Payment),
            "FEE" => Ok(TransactionKind::Fee),
            "DEBIT" => Ok(TransactionKind::Debit),
            "CREDIT" => Ok(TransactionKind::Credit),
            "OTHER" => Ok(TransactionKind::Other),
            _ => Err(()),
        }
    }
}

/// One parsed statement line item.
///
/// `payment_method` and `counterparty` are always populated by the parser.
/// The reconciliation fields stay empty until the operator reconciles the
/// transaction against the accounting hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub statement_id: Option<String>,
    pub bank: Bank,
    pub date: NaiveDate,
    pub narration: String,
    pub document: Option<String>,
    /// Signed: positive = credit, negative = debit
    pub amount: Decimal,
    /// Running balance as reported by the bank; informational only
    pub balance: Decimal,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub payment_method: PaymentMethod,
    pub counterparty: String,
    /// Defaults to the transaction's own date at parse time
    pub payment_date: NaiveDate,
    pub cost_center: Option<String>,
    pub classification_id: Option<i64>,
    pub plan_id: Option<i64>,
    pub line_item_id: Option<i64>,
    pub recipient_name: Option<String>,
    pub reference_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub reconciled_at: Option<DateTime<Utc>>,
    pub reconciled_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One uploaded bank extract file. Immutable after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    pub id: String,
    pub bank: Bank,
    pub source_filename: String,
    pub transaction_count: i64,
    pub processed_at: DateTime<Utc>,
    pub status: String,
}

/// Top level of the accounting hierarchy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub id: i64,
    pub name: String,
}

/// Chart-of-accounts plan, child of exactly one classification.
/// Name is unique within its classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartPlan {
    pub id: i64,
    pub classification_id: i64,
    pub name: String,
}

/// Line item, child of exactly one plan. Name is unique within its plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub id: i64,
    pub plan_id: i64,
    pub name: String,
}
