//! Matzip CLI - catalog inspection and operator checks.
//!
//! # Usage
//!
//! ```bash
//! # Enriched restaurants as JSON (optionally by id or text)
//! matzip restaurants list --ids 3,7
//! matzip restaurants list --query ramen
//!
//! # One restaurant, the id/name/address list, the sidebar ranking
//! matzip restaurants show 12
//! matzip restaurants basic
//! matzip restaurants top --query bbq --limit 5
//!
//! # Evaluate opening hours at a KST wall-clock time (no backend needed)
//! matzip hours check --open 22:00 --close 02:00 --at 23:30
//!
//! # Verify the image columns the catalog reads exist
//! matzip schema check
//! ```
//!
//! # Environment Variables
//!
//! Backend commands read the same variables as the server: `SUPABASE_URL`,
//! `SUPABASE_ANON_KEY`, `MATZIP_HTTP_TIMEOUT_SECS`, `MATZIP_CACHE_TTL_SECS`
//! and `MATZIP_IMAGE_URL_COLUMN`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use matzip_core::RestaurantId;

mod commands;

#[derive(Parser)]
#[command(name = "matzip")]
#[command(author, version, about = "Matzip operator tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect the restaurant catalog
    Restaurants {
        #[command(subcommand)]
        action: RestaurantAction,
    },
    /// Evaluate opening hours
    Hours {
        #[command(subcommand)]
        action: HoursAction,
    },
    /// Check the backend schema
    Schema {
        #[command(subcommand)]
        action: SchemaAction,
    },
}

#[derive(Subcommand)]
enum RestaurantAction {
    /// Print enriched restaurants as JSON
    List {
        /// Comma-separated restaurant ids
        #[arg(long)]
        ids: Option<String>,

        /// Case-insensitive text filter
        #[arg(short, long)]
        query: Option<String>,
    },
    /// Print one enriched restaurant as JSON
    Show {
        /// Restaurant id
        id: RestaurantId,
    },
    /// Print id, name and address of every restaurant
    Basic,
    /// Print the best-rated matches
    Top {
        /// Case-insensitive text filter
        #[arg(short, long, default_value = "")]
        query: String,

        /// Number of restaurants
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum HoursAction {
    /// Print whether a restaurant with these hours is open
    Check {
        /// Opening time (`HH:MM` or `HH:MM:SS`)
        #[arg(long)]
        open: Option<String>,

        /// Closing time; earlier than opening means past midnight
        #[arg(long)]
        close: Option<String>,

        /// Start of the break
        #[arg(long)]
        break_start: Option<String>,

        /// End of the break
        #[arg(long)]
        break_end: Option<String>,

        /// KST wall-clock time to check; defaults to now
        #[arg(long)]
        at: Option<String>,
    },
}

#[derive(Subcommand)]
enum SchemaAction {
    /// Verify the image columns the catalog reads
    Check,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "matzip_cli=info,matzip_server=warn".into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Restaurants { action } => match action {
            RestaurantAction::List { ids, query } => {
                commands::restaurants::list(ids.as_deref(), query.as_deref()).await?;
            }
            RestaurantAction::Show { id } => commands::restaurants::show(id).await?,
            RestaurantAction::Basic => commands::restaurants::basic().await?,
            RestaurantAction::Top { query, limit } => {
                commands::restaurants::top(&query, limit).await?;
            }
        },
        Commands::Hours { action } => match action {
            HoursAction::Check {
                open,
                close,
                break_start,
                break_end,
                at,
            } => commands::hours::check(
                &commands::hours::HoursArgs {
                    open,
                    close,
                    break_start,
                    break_end,
                },
                at.as_deref(),
            )?,
        },
        Commands::Schema { action } => match action {
            SchemaAction::Check => commands::schema::check().await?,
        },
    }
    Ok(())
}
