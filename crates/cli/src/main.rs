//! Dub CLI - migrations and operator tooling for the economy database.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! dub-cli migrate
//!
//! # Load catalog items from YAML
//! dub-cli seed catalog data/catalog.yaml
//!
//! # Rotate the shop now
//! dub-cli shop rotate
//!
//! # Grant or revoke admin rights
//! dub-cli admin promote 123456789012345678
//!
//! # Sync role flags
//! dub-cli roles set 123456789012345678 --elite-donor true
//!
//! # Record a confirmed external payment
//! dub-cli payment record 123456789012345678 -m paypal -r PAY-1 -s completed -c 999
//! ```
//!
//! # Environment Variables
//!
//! - `DUB_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//! - `PROJECT_SEASON`, `PROJECT_VERSION` - shop snapshot metadata

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "dub-cli")]
#[command(author, version, about = "Dub economy operator tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the database from files
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Shop rotation
    Shop {
        #[command(subcommand)]
        action: ShopAction,
    },
    /// Manage admin rights
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Sync role flags from the role provider
    Roles {
        #[command(subcommand)]
        action: RolesAction,
    },
    /// Record external payments
    Payment {
        #[command(subcommand)]
        action: PaymentAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Insert or update catalog items from a YAML file
    Catalog {
        /// Path to the YAML file
        file: String,
    },
}

#[derive(Subcommand)]
enum ShopAction {
    /// Replace the active snapshot with a fresh selection
    Rotate {
        /// Recorded as the snapshot's creator
        #[arg(long, default_value = "cli")]
        by: String,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Grant admin rights
    Promote {
        /// Account external id
        external_id: String,
    },
    /// Revoke admin rights
    Demote {
        /// Account external id
        external_id: String,
    },
}

#[derive(Subcommand)]
enum RolesAction {
    /// Set role flags; omitted flags are left unchanged
    Set {
        /// Account external id
        external_id: String,

        #[arg(long)]
        elite_donor: Option<bool>,

        #[arg(long)]
        full_locker: Option<bool>,

        #[arg(long)]
        booster: Option<bool>,
    },
}

#[derive(Subcommand)]
enum PaymentAction {
    /// Append a payment entry to an account's ledger
    Record {
        /// Account external id
        external_id: String,

        /// Provider (`sellauth`, `paypal`, `cashapp`)
        #[arg(short, long)]
        method: String,

        /// Provider transaction reference
        #[arg(short, long)]
        reference: String,

        /// Settlement state (`pending`, `completed`, `failed`, `refunded`)
        #[arg(short, long, default_value = "completed")]
        status: String,

        /// Amount paid, in cents
        #[arg(short = 'c', long)]
        amount_cents: u64,

        /// Payer email reported by the provider
        #[arg(long)]
        payer_email: Option<String>,

        /// Ledger description
        #[arg(short, long, default_value = "External payment")]
        description: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Catalog { file } => commands::seed::catalog(&file).await?,
        },
        Commands::Shop { action } => match action {
            ShopAction::Rotate { by } => commands::shop::rotate(&by).await?,
        },
        Commands::Admin { action } => match action {
            AdminAction::Promote { external_id } => {
                commands::admin::set_admin(&external_id, true).await?;
            }
            AdminAction::Demote { external_id } => {
                commands::admin::set_admin(&external_id, false).await?;
            }
        },
        Commands::Roles { action } => match action {
            RolesAction::Set {
                external_id,
                elite_donor,
                full_locker,
                booster,
            } => {
                let update = dub_server::services::RoleUpdate {
                    elite_donor,
                    full_locker,
                    booster,
                };
                commands::admin::set_roles(&external_id, update).await?;
            }
        },
        Commands::Payment { action } => match action {
            PaymentAction::Record {
                external_id,
                method,
                reference,
                status,
                amount_cents,
                payer_email,
                description,
            } => {
                let payment = commands::payment::PaymentArgs {
                    method: &method,
                    reference: &reference,
                    status: &status,
                    amount_cents,
                    payer_email,
                };
                commands::payment::record(&external_id, payment, &description).await?;
            }
        },
    }
    Ok(())
}
