//! # Bodega Back-Office CLI
//!
//! Operator commands over the service layer.
//!
//! ## Usage
//! ```bash
//! # Create or upgrade the database
//! backoffice migrate
//!
//! # Is there anything to export?
//! backoffice --user admin check-sales --from 2024-03-01 --to 2024-03-31
//!
//! # Today's sales report (text, or the positioned layout as JSON)
//! backoffice --user admin export-sales --out sales.txt
//! backoffice --user admin export-sales --seller 4 --format json --out sales.json
//!
//! # Receipt of a sale
//! backoffice --user maria receipt 42 --out receipt.txt
//! ```
//!
//! Configuration comes from `bodega.toml` (see `AppConfig`) and `BODEGA_*`
//! environment variables; `RUST_LOG` overrides the configured log filter.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use bodega_backoffice::{AppConfig, AppContext};
use bodega_core::filter::SaleFilterInput;
use bodega_core::report::Document;
use bodega_core::Session;

#[derive(Parser)]
#[command(name = "backoffice")]
#[command(about = "Inventory and sales back-office")]
#[command(version)]
struct Cli {
    /// Config file (default: bodega.toml in the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Username to act as
    #[arg(long, global = true, env = "BODEGA_USER")]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,

    /// Report whether any sale matches the filters
    CheckSales(FilterArgs),

    /// Write the detailed sales report (defaults to today)
    ExportSales {
        #[command(flatten)]
        filter: FilterArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Write the receipt of a sale
    Receipt {
        sale_id: i64,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args)]
struct FilterArgs {
    /// First day, YYYY-MM-DD
    #[arg(long)]
    from: Option<String>,

    /// Last day, YYYY-MM-DD
    #[arg(long)]
    to: Option<String>,

    /// Seller user id
    #[arg(long)]
    seller: Option<String>,

    /// Product id
    #[arg(long)]
    product: Option<String>,

    /// cash, card or transfer
    #[arg(long)]
    payment: Option<String>,
}

impl From<FilterArgs> for SaleFilterInput {
    fn from(args: FilterArgs) -> Self {
        SaleFilterInput {
            start_date: args.from,
            end_date: args.to,
            seller_id: args.seller,
            product_id: args.product,
            payment_method: args.payment,
        }
    }
}

#[derive(Args)]
struct OutputArgs {
    /// Destination file
    #[arg(long)]
    out: PathBuf,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    /// Plain-text rendering of the pages
    Text,
    /// The positioned layout, for an external renderer
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.clone()).context("Failed to load configuration")?;
    init_tracing(&config.logging.filter);

    let ctx = AppContext::from_config(&config)
        .await
        .context("Failed to open the back-office")?;
    let session = match cli.user.as_deref() {
        Some(username) => ctx.session_for(username).await?,
        None => Session::Anonymous,
    };

    match cli.command {
        Commands::Migrate => {
            let (total, applied) = ctx.db().migration_status().await?;
            println!("Migrations applied: {applied}/{total}");
        }
        Commands::CheckSales(filter) => {
            let exists = ctx.reports().sales_exist(&session, &filter.into()).await?;
            println!("{}", serde_json::json!({ "exists": exists }));
        }
        Commands::ExportSales { filter, output } => {
            let document = ctx
                .reports()
                .export_sales(&session, &filter.into(), Utc::now())
                .await?;
            write_document(&document, &output).await?;
        }
        Commands::Receipt { sale_id, output } => {
            let document = ctx.reports().receipt(&session, sale_id).await?;
            write_document(&document, &output).await?;
        }
    }

    ctx.db().close().await;
    Ok(())
}

/// Installs the fmt subscriber. `RUST_LOG` wins over the configured filter.
fn init_tracing(configured: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

async fn write_document(document: &Document, output: &OutputArgs) -> Result<()> {
    let contents = match output.format {
        Format::Text => document.render_text(),
        Format::Json => serde_json::to_string_pretty(document)?,
    };

    write_file(&output.out, contents.as_bytes()).await?;
    info!(
        path = %output.out.display(),
        title = %document.title,
        pages = document.pages.len(),
        "Document written"
    );
    println!("{} -> {}", document.title, output.out.display());
    Ok(())
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}
