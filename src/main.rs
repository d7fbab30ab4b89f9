mod run;

use anyhow::{Context, Result};
use expense_tracker::storage::SqliteStorage;
use expense_tracker::ExpenseStore;
use tracing_subscriber::EnvFilter;

use run::CliArgs;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_logging();
    let args = CliArgs::parse(std::env::args().skip(1))?;
    let db_path = match args.flag("--db") {
        Some(path) => std::path::PathBuf::from(run::shellexpand(path)),
        None => get_db_path()?,
    };
    let store = ExpenseStore::new(SqliteStorage::open(&db_path)?);
    run::as_cli(&args, &store, &mut std::io::stdout().lock()).await
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn get_db_path() -> Result<std::path::PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "expense-tracker", "ExpenseTracker")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    let data_dir = proj_dirs.data_dir();
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    Ok(data_dir.join("expenses.db"))
}
