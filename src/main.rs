use clap::Parser;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tinydb::errors::Error;
use tinydb::repl;
use tinydb::storage::Table;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(
    name = "tinydb",
    version = VERSION,
    about = "Single-file B+ tree database with a tiny SQL prompt."
)]
struct Cli {
    /// Path to the database file. Created if it does not exist.
    file: PathBuf,

    /// Where engine logs go, kept apart from prompt output.
    #[arg(long, env = "TINYDB_LOG_FILE", default_value = "tinydb.log")]
    log_file: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_file = match OpenOptions::new()
        .append(true)
        .create(true)
        .open(&cli.log_file)
    {
        Ok(file) => file,
        Err(e) => {
            println!("Failed to open log file '{}'. {}", cli.log_file.display(), e);
            return ExitCode::FAILURE;
        }
    };
    tracing_subscriber::fmt()
        .with_writer(Arc::new(log_file))
        .with_ansi(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        session_id = %Uuid::new_v4(),
        file = %cli.file.display(),
        "Starting session"
    );

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Fatal error");
            println!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Error> {
    let mut table = Table::open(&cli.file)?;
    repl::start(&mut table)
}
