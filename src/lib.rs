//! Concilia - bank-statement reconciliation backend
//!
//! This library parses bank extract files (CSV/Excel) from the two source
//! banks, classifies payment method and counterparty from the narration text,
//! stores transactions in SQLite, and resolves the three-level accounting
//! hierarchy through a two-tier lookup cache during manual reconciliation.

pub mod cache;
pub mod classify;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod importers;
pub mod reconcile;
