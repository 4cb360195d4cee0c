//! Bukka CLI - Browse the menu, manage a cart and profile, seed the catalog.
//!
//! # Usage
//!
//! ```bash
//! # List a menu category
//! bukka menu list Main
//!
//! # Search the menu
//! bukka menu search jollof --category Main
//!
//! # Seed the menu from YAML
//! bukka menu seed crates/cli/seed/menu.yaml
//!
//! # Add to the cart and check out
//! bukka --email ada@example.com cart add jollof-rice --variant Regular
//! bukka --email ada@example.com cart checkout
//! ```
//!
//! Credentials come from `--email`/`--password` or `BUKKA_EMAIL`/`BUKKA_PASSWORD`.
//!
//! # Commands
//!
//! - `menu` - List, search and seed menu items
//! - `cart` - Show, add, remove, check out and watch the cart
//! - `profile` - Show the profile, order history, saved addresses; rate; set avatar
//! - `auth` - Register an account, show the signed-in user

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bukka_storefront::config::StorefrontConfig;
use bukka_storefront::state::AppState;

mod commands;

use commands::{CliError, Credentials};

#[derive(Parser)]
#[command(name = "bukka")]
#[command(author, version, about = "Bukka restaurant ordering tools")]
struct Cli {
    #[command(flatten)]
    credentials: CredentialArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CredentialArgs {
    /// Account email
    #[arg(long, env = "BUKKA_EMAIL", global = true)]
    email: Option<String>,

    /// Account password
    #[arg(long, env = "BUKKA_PASSWORD", global = true, hide_env_values = true)]
    password: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse and seed the menu
    Menu {
        #[command(subcommand)]
        action: MenuAction,
    },
    /// Manage the signed-in user's cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Manage the signed-in user's profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Account commands
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },
}

#[derive(Subcommand)]
enum MenuAction {
    /// List the items of a category (Main, Snacks, Drinks)
    List { category: String },
    /// Search item names
    Search {
        term: String,

        /// Only search within this category
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Write menu items from a YAML file
    Seed { file: PathBuf },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show cart lines and the total
    Show,
    /// Add an item, or bump its quantity
    Add {
        item_id: String,

        /// Variant label (e.g. Regular, Large)
        #[arg(short, long)]
        variant: String,

        /// Unit price for the variant (defaults to the listed price)
        #[arg(short, long)]
        price: Option<Decimal>,

        /// Special instructions
        #[arg(short, long)]
        instructions: Option<String>,
    },
    /// Remove an item
    Remove { item_id: String },
    /// Clear the cart
    Checkout,
    /// Follow the cart until interrupted
    Watch,
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Show the profile
    Show,
    /// Show the ten most recent orders
    Orders,
    /// Show saved addresses
    Addresses,
    /// Rate the last order (1-5 stars)
    Rate { stars: u8 },
    /// Upload a profile picture
    Avatar { file: PathBuf },
}

#[derive(Subcommand)]
enum AuthAction {
    /// Create an account with the given email and password
    Register {
        /// Display name
        #[arg(short, long)]
        name: String,
    },
    /// Show the signed-in user
    Whoami,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
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
async fn main() {
    let cli = Cli::parse();

    // Configuration is needed before Sentry and tracing are set up
    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt::init();
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bukka_storefront=info,bukka_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let state = AppState::from_config(&config);

    if let Err(e) = run(&state, cli).await {
        tracing::error!("{}", e.user_message());
        tracing::debug!(error = %e, "Command failed");
        std::process::exit(1);
    }
}

async fn run(state: &AppState, cli: Cli) -> Result<(), CliError> {
    let credentials = Credentials::new(cli.credentials.email, cli.credentials.password);

    match cli.command {
        Commands::Menu { action } => match action {
            MenuAction::List { category } => commands::menu::list(state, &category).await,
            MenuAction::Search { term, category } => {
                commands::menu::search(state, &term, category.as_deref()).await
            }
            MenuAction::Seed { file } => commands::menu::seed(state, &credentials, &file).await,
        },
        Commands::Cart { action } => {
            let user = commands::sign_in(state, &credentials).await?;
            match action {
                CartAction::Show => commands::cart::show(state, &user).await,
                CartAction::Add {
                    item_id,
                    variant,
                    price,
                    instructions,
                } => {
                    commands::cart::add(
                        state,
                        &user,
                        &item_id,
                        &variant,
                        price,
                        instructions.as_deref(),
                    )
                    .await
                }
                CartAction::Remove { item_id } => {
                    commands::cart::remove(state, &user, &item_id).await
                }
                CartAction::Checkout => commands::cart::checkout(state, &user).await,
                CartAction::Watch => commands::cart::watch(state).await,
            }
        }
        Commands::Profile { action } => {
            let user = commands::sign_in(state, &credentials).await?;
            match action {
                ProfileAction::Show => commands::profile::show(state, &user).await,
                ProfileAction::Orders => commands::profile::orders(state, &user).await,
                ProfileAction::Addresses => commands::profile::addresses(state, &user).await,
                ProfileAction::Rate { stars } => {
                    commands::profile::rate(state, &user, stars).await
                }
                ProfileAction::Avatar { file } => {
                    commands::profile::avatar(state, &user, &file).await
                }
            }
        }
        Commands::Auth { action } => match action {
            AuthAction::Register { name } => {
                commands::auth::register(state, &credentials, &name).await
            }
            AuthAction::Whoami => commands::auth::whoami(state, &credentials).await,
        },
    }
}
