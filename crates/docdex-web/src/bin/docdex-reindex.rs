use anyhow::Result;
use clap::Parser;
use docdex_db::Database;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Rebuilds the document store's search index by re-putting every stored
/// document. Needed after a restart because long index terms are digested
/// with a process-local salt.
#[derive(Parser)]
struct Opts {
    /// Address of the document store.
    #[arg(long, default_value = "redis://127.0.0.1:6379")]
    db_server: String,
    /// Close idle store connections after this many seconds.
    #[arg(long, default_value_t = 250)]
    db_idle_timeout: u64,
    /// Log store commands.
    #[arg(long)]
    db_log: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let opts = Opts::parse();
    let db = Database::new(
        &opts.db_server,
        Duration::from_secs(opts.db_idle_timeout),
        opts.db_log,
    )
    .await?;

    let pkgs = db.all_packages().await?;
    let mut updated = 0usize;
    for pkg in &pkgs {
        db.put(pkg).await?;
        updated += 1;
    }
    tracing::info!(updated = updated, "reindex complete");
    Ok(())
}
