//! Nexora CLI - database migrations and operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply storefront migrations
//! nexora-cli migrate
//!
//! # Load the demo catalog (use --reset to wipe the catalog first)
//! nexora-cli seed
//! nexora-cli seed --reset
//!
//! # Grant the admin role to an existing account
//! nexora-cli admin promote -e owner@example.com
//!
//! # Create an admin account with a password
//! nexora-cli admin create -e owner@example.com -n "Store Owner" -p 's3cret-pass'
//! ```
//!
//! All commands read `DATABASE_URL` (or the `DB_*` parts) from the
//! environment or `.env`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "nexora-cli")]
#[command(author, version, about = "Nexora operator tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the demo catalog
    Seed {
        /// Delete the existing catalog first (orders keep their snapshots)
        #[arg(long)]
        reset: bool,
    },
    /// Manage admin accounts
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Give an existing account the admin role
    Promote {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
    /// Create a new admin account with a password
    Create {
        /// Admin email address
        #[arg(short, long)]
        email: String,

        /// Admin display name
        #[arg(short, long)]
        name: String,

        /// Initial password (at least 6 characters)
        #[arg(short, long)]
        password: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    let pool = commands::connect().await?;

    match cli.command {
        Commands::Migrate => commands::migrate::run(&pool).await?,
        Commands::Seed { reset } => commands::seed::run(&pool, reset).await?,
        Commands::Admin { action } => match action {
            AdminAction::Promote { email } => commands::admin::promote(&pool, &email).await?,
            AdminAction::Create {
                email,
                name,
                password,
            } => commands::admin::create(&pool, &email, &name, &password).await?,
        },
    }
    Ok(())
}
