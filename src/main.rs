use anyhow::{anyhow, Context, Result};
use clap::Parser;
use colored::Colorize;
use std::str::FromStr;

use concilia::cache::LookupCache;
use concilia::cli::{self, Cli, Commands, LookupCommands};
use concilia::config::Config;
use concilia::db::models::{Bank, TransactionStatus};
use concilia::{db, importers, reconcile};

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Init => {
            db::init_database(Some(config.db_path.clone()))?;
            println!("{} Database initialized", "✓".green().bold());
            Ok(())
        }

        Commands::Import {
            file,
            bank,
            dry_run,
        } => handle_import(&config, &file, &bank, dry_run, cli.json),

        Commands::List { status } => {
            let conn = db::open_db(Some(config.db_path.clone()))?;
            let status = match status {
                Some(s) => Some(
                    TransactionStatus::from_str(&s)
                        .map_err(|_| anyhow!("unknown status '{}'", s))?,
                ),
                None => None,
            };
            let transactions = db::list_transactions(&conn, status)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&transactions)?);
            } else {
                println!("{}", cli::formatters::format_transaction_table(&transactions));
            }
            Ok(())
        }

        Commands::Reconcile {
            id,
            classification,
            plan,
            item,
            cost_center,
            recipient,
            reference_date,
            notes,
            by,
        } => {
            let conn = db::open_db(Some(config.db_path.clone()))?;
            let cache = LookupCache::new(&config);
            let reference_date = match reference_date {
                Some(s) => Some(
                    chrono::NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                        .context("reference date must be YYYY-MM-DD")?,
                ),
                None => None,
            };
            let request = reconcile::ReconcileRequest {
                classification,
                plan,
                line_item: item,
                cost_center,
                recipient_name: recipient,
                reference_date,
                notes,
                reconciled_by: by,
            };
            let tx = reconcile::reconcile_transaction(&conn, &cache, &id, &request)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&tx)?);
            } else {
                println!(
                    "{} Transaction {} reconciled as {}/{}/{}",
                    "✓".green().bold(),
                    tx.id,
                    request.classification,
                    request.plan,
                    request.line_item,
                );
            }
            Ok(())
        }

        Commands::Lookups { action } => handle_lookups(&config, action, cli.json),

        Commands::Stats => {
            let conn = db::open_db(Some(config.db_path.clone()))?;
            let cache = LookupCache::new(&config);
            let summary = reconcile::statement_summary(&conn, &cache)?;
            let health = cache.health();
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "summary": summary,
                        "cache": health,
                    }))?
                );
            } else {
                println!("{}", cli::formatters::format_summary(&summary));
                println!(
                    "  Shared cache: {}\n  Fast-tier entries: {}",
                    if health.shared_tier_connected {
                        "connected".green().to_string()
                    } else {
                        "unavailable".yellow().to_string()
                    },
                    health.fast_tier_entries
                );
            }
            Ok(())
        }
    }
}

fn handle_import(
    config: &Config,
    file: &str,
    bank: &str,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let bank = Bank::from_str(bank).map_err(|_| anyhow!("unknown bank '{}'", bank))?;
    let bytes = std::fs::read(file).with_context(|| format!("could not read {}", file))?;
    let filename = std::path::Path::new(file)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file);

    if dry_run {
        let transactions = importers::parse_statement(&bytes, filename, bank)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&transactions)?);
        } else {
            println!(
                "\n{} Found {} transactions\n",
                "✓".green().bold(),
                transactions.len()
            );
            println!(
                "{}",
                cli::formatters::format_transaction_table(&transactions)
            );
            println!("\n{} Dry run - no changes saved", "ℹ".blue().bold());
        }
        return Ok(());
    }

    db::init_database(Some(config.db_path.clone()))?;
    let mut conn = db::open_db(Some(config.db_path.clone()))?;
    let report = reconcile::ingest_statement(&mut conn, &bytes, filename, bank)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} Statement {}: {} of {} transactions saved",
            "✓".green().bold(),
            report.statement_id,
            report.transactions_inserted,
            report.transactions_parsed
        );
        if report.failed_chunks > 0 {
            println!(
                "{} {} chunks failed to insert, see logs",
                "⚠".yellow().bold(),
                report.failed_chunks
            );
        }
    }
    Ok(())
}

fn handle_lookups(config: &Config, action: LookupCommands, json: bool) -> Result<()> {
    let conn = db::open_db(Some(config.db_path.clone()))?;
    let cache = LookupCache::new(config);

    match action {
        LookupCommands::Show => {
            let classifications = db::list_classifications(&conn)?;
            let plans = db::list_chart_plans(&conn)?;
            let items = db::list_line_items(&conn)?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "classifications": classifications,
                        "plans": plans,
                        "items": items,
                    }))?
                );
            } else {
                for c in &classifications {
                    println!("{} {}", c.id, c.name.bold());
                    for p in plans.iter().filter(|p| p.classification_id == c.id) {
                        println!("  {} {}", p.id, p.name);
                        for i in items.iter().filter(|i| i.plan_id == p.id) {
                            println!("    {} {}", i.id, i.name);
                        }
                    }
                }
            }
        }
        LookupCommands::Reload => {
            reconcile::load_lookups(&conn, &cache)?;
            println!("{} Lookup hierarchy reloaded", "✓".green().bold());
        }
        LookupCommands::AddClassification { name } => {
            let id = db::insert_classification(&conn, &name)?;
            cache.invalidate_pattern("lookups:*", None);
            println!("{} Classification {} created (id {})", "✓".green().bold(), name, id);
        }
        LookupCommands::AddPlan {
            classification_id,
            name,
        } => {
            let id = db::insert_chart_plan(&conn, classification_id, &name)?;
            cache.invalidate_pattern("lookups:*", None);
            println!("{} Plan {} created (id {})", "✓".green().bold(), name, id);
        }
        LookupCommands::AddItem { plan_id, name } => {
            let id = db::insert_line_item(&conn, plan_id, &name)?;
            cache.invalidate_pattern("lookups:*", None);
            println!("{} Line item {} created (id {})", "✓".green().bold(), name, id);
        }
    }
    Ok(())
}
