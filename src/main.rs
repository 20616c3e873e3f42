use cashledger::application::pipeline::Pipeline;
use cashledger::config::{Backend, Config};
use cashledger::domain::ports::{IdempotencyStoreBox, LedgerStoreBox};
use cashledger::domain::transaction::TransferRequest;
use cashledger::infrastructure::clock::SystemClock;
use cashledger::infrastructure::file::{FileIdempotencyStore, FileLedgerStore};
use cashledger::infrastructure::in_memory::{InMemoryIdempotencyStore, InMemoryLedgerStore};
use cashledger::interfaces::csv::balance_writer::BalanceWriter;
use cashledger::interfaces::csv::transfer_reader::TransferReader;
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Storage backend
    #[arg(long, global = true, value_enum)]
    backend: Option<Backend>,

    /// Directory holding the ledger and idempotency state
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Simulated processing latency before each transition
    #[arg(long, global = true)]
    step_delay_ms: Option<u64>,

    /// Reverse transfers strictly above this amount
    #[arg(long, global = true)]
    risk_threshold: Option<Decimal>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create and settle one transfer, then print it as JSON
    Transfer {
        from: String,
        to: String,
        #[arg(allow_negative_numbers = true)]
        amount: Decimal,
        /// Idempotency key
        key: Option<String>,
        /// Also print the derived balances after the transaction
        #[arg(long)]
        balances: bool,
    },
    /// Submit every transfer of a CSV file (from,to,amount,key), then print balances
    Batch { input: PathBuf },
    /// Print balances derived from the ledger
    Balances,
}

impl Cli {
    fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path).into_diagnostic()?,
            None => Config::default(),
        };
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(ms) = self.step_delay_ms {
            config.step_delay_ms = ms;
        }
        if self.risk_threshold.is_some() {
            config.risk_threshold = self.risk_threshold;
        }
        config.validate().into_diagnostic()?;
        Ok(config)
    }
}

fn open_file_stores(config: &Config) -> Result<(LedgerStoreBox, IdempotencyStoreBox)> {
    let ledger = FileLedgerStore::open(&config.data_dir).into_diagnostic()?;
    let idempotency = FileIdempotencyStore::open(&config.data_dir).into_diagnostic()?;
    Ok((Box::new(ledger), Box::new(idempotency)))
}

fn open_stores(config: &Config) -> Result<(LedgerStoreBox, IdempotencyStoreBox)> {
    match config.backend {
        Backend::Memory => Ok((
            Box::new(InMemoryLedgerStore::new()),
            Box::new(InMemoryIdempotencyStore::new()),
        )),
        Backend::File => open_file_stores(config),
        #[cfg(feature = "storage-rocksdb")]
        Backend::Rocksdb => {
            use cashledger::infrastructure::rocksdb::RocksDBStore;
            let store = RocksDBStore::open(config.data_dir.join("rocksdb")).into_diagnostic()?;
            Ok((Box::new(store.clone()), Box::new(store)))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Backend::Rocksdb => {
            tracing::warn!(
                "RocksDB backend requested, but the 'storage-rocksdb' feature is not enabled. Falling back to file storage."
            );
            open_file_stores(config)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.resolve_config()?;
    let (ledger, idempotency) = open_stores(&config)?;
    let pipeline = Pipeline::new(
        ledger,
        idempotency,
        Box::new(SystemClock),
        config.pipeline_settings(),
    );
    let policy = config.risk_policy();

    match cli.command {
        Command::Transfer {
            from,
            to,
            amount,
            key,
            balances,
        } => {
            let request = TransferRequest {
                from,
                to,
                amount,
                key,
            };
            let submission = pipeline
                .submit(&request, policy.as_ref())
                .await
                .into_diagnostic()?;
            if submission.replayed {
                eprintln!("Idempotent transaction detected, returning the original");
            }
            let json = serde_json::to_string_pretty(&submission.transaction).into_diagnostic()?;
            println!("{json}");
            if balances {
                let balances = pipeline.balances().await.into_diagnostic()?;
                BalanceWriter::new(io::stdout().lock())
                    .write_balances(&balances)
                    .into_diagnostic()?;
            }
        }
        Command::Batch { input } => {
            let file = File::open(input).into_diagnostic()?;
            for request in TransferReader::new(file).requests() {
                match request {
                    Ok(request) => {
                        if let Err(e) = pipeline.submit(&request, policy.as_ref()).await {
                            eprintln!("Error processing transfer: {}", e);
                        }
                    }
                    Err(e) => {
                        eprintln!("Error reading transfer: {}", e);
                    }
                }
            }
            let balances = pipeline.balances().await.into_diagnostic()?;
            BalanceWriter::new(io::stdout().lock())
                .write_balances(&balances)
                .into_diagnostic()?;
        }
        Command::Balances => {
            let balances = pipeline.balances().await.into_diagnostic()?;
            BalanceWriter::new(io::stdout().lock())
                .write_balances(&balances)
                .into_diagnostic()?;
        }
    }

    Ok(())
}
