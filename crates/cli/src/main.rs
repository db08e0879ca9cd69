//! Suitcart CLI - Inspect and migrate carts from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Show the active cart (guest, or the user signed in with `login`)
//! sc-cli show
//!
//! # Show a user's server cart
//! sc-cli show --user 42
//!
//! # Check whether the stored guest cart survives validation
//! sc-cli validate
//!
//! # Sign in: uploads the guest cart to the user's server cart
//! sc-cli login 42
//!
//! # Sign out: purges the user's local data and switches back to the guest cart
//! sc-cli logout
//! ```
//!
//! # Commands
//!
//! - `show` - Print items and totals
//! - `validate` - Validate the stored guest cart
//! - `clear` - Empty the active cart
//! - `login` / `logout` - Run a session transition

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use suitcart_sync::SyncConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "sc-cli")]
#[command(author, version, about = "Suitcart CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the items and totals of a cart
    Show {
        /// Show this user's server cart instead of the active cart
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Validate the stored guest cart
    Validate,
    /// Empty the active cart
    Clear,
    /// Sign in as a user
    Login {
        /// User id
        user: String,
    },
    /// Sign out and return to the guest cart
    Logout,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &SyncConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
#[allow(clippy::print_stderr)]
async fn main() {
    let cli = Cli::parse();

    let config = match SyncConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(2);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "suitcart_sync=info,suitcart_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli, &config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &SyncConfig) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = commands::Context::open(config)?;

    match cli.command {
        Commands::Show { user } => commands::cart::show(&ctx, user.as_deref()).await?,
        Commands::Validate => commands::cart::validate(&ctx)?,
        Commands::Clear => commands::cart::clear(&ctx).await?,
        Commands::Login { user } => commands::session::login(&ctx, &user).await?,
        Commands::Logout => commands::session::logout(&ctx).await?,
    }
    Ok(())
}
