//! crmfetch - resilient CRM data acquisition for report generation.
//!
//! Fetches invoices, product rows and company records from a rate-limited
//! CRM REST service for downstream report builders.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging based on verbosity
    let default_filter = if crmfetch::cli::is_verbose() {
        "crmfetch=info"
    } else {
        "crmfetch=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    crmfetch::cli::run().await
}
