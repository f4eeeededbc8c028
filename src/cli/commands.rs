//! CLI commands implementation.

use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use console::style;
use tracing::info;

use crate::api::ApiClient;
use crate::config::Config;

#[derive(Parser)]
#[command(name = "crmfetch")]
#[command(about = "Resilient CRM data acquisition for report generation")]
#[command(version)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print records as JSON instead of a summary
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch invoices created in a date range
    Invoices {
        /// Range start (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,
        /// Range end (YYYY-MM-DD)
        #[arg(long)]
        to: NaiveDate,
        /// Also fetch product rows for every invoice (batched)
        #[arg(long)]
        line_items: bool,
    },

    /// Fetch a single company record
    Company {
        /// Company id
        id: u64,
    },

    /// Fetch product rows for one invoice
    LineItems {
        /// Invoice id
        invoice_id: u64,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let client = ApiClient::new(&config).context("Failed to create API client")?;
    info!("Using endpoint {}", config.redacted_endpoint());

    match cli.command {
        Commands::Invoices {
            from,
            to,
            line_items,
        } => cmd_invoices(&client, from, to, line_items, cli.json).await?,
        Commands::Company { id } => cmd_company(&client, id, cli.json).await?,
        Commands::LineItems { invoice_id } => cmd_line_items(&client, invoice_id, cli.json).await?,
    }

    print_stats(&client).await;
    client.close();
    Ok(())
}

async fn cmd_invoices(
    client: &ApiClient,
    from: NaiveDate,
    to: NaiveDate,
    line_items: bool,
    json: bool,
) -> anyhow::Result<()> {
    let invoices = client.list_invoices(from, to).await?;

    if json {
        let rendered: Vec<serde_json::Value> = invoices
            .iter()
            .map(|invoice| {
                serde_json::json!({
                    "id": invoice.id,
                    "number": invoice.number,
                    "date": invoice.date.to_string(),
                    "amount": invoice.amount,
                    "currency": invoice.currency,
                    "company_id": invoice.company_id,
                    "status": invoice.status,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rendered)?);
    } else {
        println!(
            "{} invoices from {} to {}",
            style(invoices.len()).bold(),
            from,
            to
        );
        for invoice in &invoices {
            println!(
                "  {:>8}  {}  {:>12.2} {}",
                invoice.number, invoice.date, invoice.amount, invoice.currency
            );
        }
    }

    if line_items {
        let ids: Vec<u64> = invoices.iter().map(|invoice| invoice.id).collect();
        let outcome = client.product_rows_for_invoices(&ids).await?;
        println!(
            "Product rows fetched for {} of {} invoices",
            style(outcome.successes.len()).bold(),
            ids.len()
        );
        for failure in &outcome.failures {
            eprintln!(
                "  {} invoice {}: {}",
                style("failed").red(),
                failure.key,
                failure.message
            );
        }
    }
    Ok(())
}

async fn cmd_company(client: &ApiClient, id: u64, json: bool) -> anyhow::Result<()> {
    let company = client.get_company(id).await?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "id": company.id,
                "title": company.title,
                "inn": company.inn,
            }))?
        );
    } else {
        println!(
            "{}  {}  INN: {}",
            company.id,
            style(&company.title).bold(),
            company.inn.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn cmd_line_items(client: &ApiClient, invoice_id: u64, json: bool) -> anyhow::Result<()> {
    let rows = client.get_invoice_product_rows(invoice_id).await?;
    if json {
        let rendered: Vec<serde_json::Value> = rows
            .iter()
            .map(|row| {
                serde_json::json!({
                    "product_name": row.product_name,
                    "price": row.price,
                    "quantity": row.quantity,
                    "total": row.total(),
                    "tax_rate": row.tax_rate,
                    "tax_included": row.tax_included,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rendered)?);
    } else {
        println!(
            "{} product rows for invoice {}",
            style(rows.len()).bold(),
            invoice_id
        );
        for row in &rows {
            println!(
                "  {:<40} {:>10.2} x {:<6} = {:>12.2}",
                row.product_name,
                row.price,
                row.quantity,
                row.total()
            );
        }
    }
    Ok(())
}

async fn print_stats(client: &ApiClient) {
    let stats = client.stats().await;
    println!(
        "{} {} requests, {} ok, {} failed, {} cache hits ({:.0}% hit rate)",
        style("done:").green().bold(),
        stats.total_requests,
        stats.successes,
        stats.failures,
        stats.cache.hits,
        stats.cache.hit_rate() * 100.0
    );
}
