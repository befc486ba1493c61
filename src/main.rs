use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use shortlet::application::{BookingPolicy, Context, HoldSweeper};
use shortlet::config::Config;
use shortlet::domain::ports::StoreRef;
use shortlet::infrastructure::clock::SystemClock;
use shortlet::infrastructure::gateways::build_registry;
use shortlet::infrastructure::in_memory::InMemoryStore;
use shortlet::infrastructure::notifier::LogNotifier;
#[cfg(feature = "storage-rocksdb")]
use shortlet::infrastructure::rocksdb::RocksDBStore;
use shortlet::interfaces::csv::Seeder;
use shortlet::interfaces::http::{AppState, router};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API and the background hold sweeper.
    Serve {
        /// Address to listen on; overrides BIND_ADDR.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Load users, listings and availability windows from CSV files.
    Seed {
        #[arg(long)]
        users: Option<PathBuf>,
        #[arg(long)]
        listings: Option<PathBuf>,
        #[arg(long)]
        availability: Option<PathBuf>,
    },
    /// Release every lapsed hold once and exit.
    Sweep,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("shortlet=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_store(db_path: Option<PathBuf>) -> Result<StoreRef> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = RocksDBStore::open(path).into_diagnostic()?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Arc::new(InMemoryStore::new()))
        }
        None => Ok(Arc::new(InMemoryStore::new())),
    }
}

fn build_context(config: &Config, store: StoreRef) -> Result<Context> {
    let gateways = build_registry(config).into_diagnostic()?;
    Ok(Context::new(
        store,
        gateways,
        Arc::new(LogNotifier),
        Arc::new(SystemClock),
        BookingPolicy::from_config(config),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().into_diagnostic()?;
    let store = open_store(cli.db_path)?;

    match cli.command {
        Command::Serve { bind } => {
            let ctx = build_context(&config, store)?;
            let sweeper = HoldSweeper::new(ctx.clone()).spawn();
            let app = router(AppState::new(ctx, config.server.internal_token.clone()));

            let addr = bind.unwrap_or_else(|| config.server.bind_addr.clone());
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .into_diagnostic()?;
            tracing::info!(%addr, "Listening");
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    tokio::signal::ctrl_c().await.ok();
                })
                .await
                .into_diagnostic()?;
            sweeper.abort();
        }
        Command::Seed {
            users,
            listings,
            availability,
        } => {
            let mut seeder = Seeder::new(store);
            if let Some(path) = users {
                seeder.users(File::open(path).into_diagnostic()?);
            }
            if let Some(path) = listings {
                seeder.listings(File::open(path).into_diagnostic()?);
            }
            if let Some(path) = availability {
                seeder
                    .availability(File::open(path).into_diagnostic()?)
                    .await
                    .into_diagnostic()?;
            }
            let report = seeder.commit().await.into_diagnostic()?;
            println!("{}", serde_json::to_string(&report).into_diagnostic()?);
        }
        Command::Sweep => {
            let ctx = build_context(&config, store)?;
            let report = HoldSweeper::new(ctx).sweep_once().await.into_diagnostic()?;
            println!("{}", serde_json::to_string(&report).into_diagnostic()?);
        }
    }

    Ok(())
}
