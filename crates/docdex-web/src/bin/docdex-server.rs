use anyhow::Result;
use clap::Parser;
use docdex::RemoteClient;
use docdex_db::Database;
use docdex_web::{crawl, handlers, popular, secrets, App, ServerConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// The docdex documentation server: serves package lookups and search over
/// the document store and keeps it fresh with background and request-driven
/// crawls.
#[derive(Parser)]
struct Opts {
    /// Address to listen on for HTTP connections.
    #[arg(long, default_value = "127.0.0.1:8080")]
    http: String,
    /// Treat every request as a robot request.
    #[arg(long)]
    robot: bool,
    /// Seconds to wait for a package update from its hosting service.
    #[arg(long, default_value_t = 8)]
    get_timeout: u64,
    /// Seconds to wait for the first fetch of a never-seen package.
    #[arg(long, default_value_t = 5)]
    first_get_timeout: u64,
    /// Crawl package documents older than this many seconds.
    #[arg(long, default_value_t = 24 * 60 * 60)]
    max_age: u64,
    /// Seconds the background crawler sleeps between packages. Zero
    /// disables the crawler.
    #[arg(long, default_value_t = 0)]
    crawl_interval: u64,
    /// Seconds between popular-package recomputations. Zero disables.
    #[arg(long, default_value_t = 0)]
    popular_interval: u64,
    /// Address of the document store.
    #[arg(long, default_value = "redis://127.0.0.1:6379")]
    db_server: String,
    /// Close idle store connections after this many seconds.
    #[arg(long, default_value_t = 250)]
    db_idle_timeout: u64,
    /// Log store commands.
    #[arg(long)]
    db_log: bool,
    /// JSON file with credentials for other services.
    #[arg(long)]
    secrets: Option<PathBuf>,
    /// Root directory for generic-VCS checkouts.
    #[arg(long, default_value = "/tmp/docdex")]
    checkout_root: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let opts = Opts::parse();

    let secrets = match &opts.secrets {
        Some(path) => secrets::read_secrets(path)?,
        None => Default::default(),
    };

    let mut client = RemoteClient::new(secrets.user_agent.clone(), opts.checkout_root.clone());
    match (secrets.github_id, secrets.github_secret) {
        (Some(id), Some(secret)) => client.github_credentials = Some((id, secret)),
        _ => tracing::warn!("github credentials not set; API rate limits will be low"),
    }

    let db = Database::new(
        &opts.db_server,
        Duration::from_secs(opts.db_idle_timeout),
        opts.db_log,
    )
    .await?;

    let cfg = ServerConfig {
        robot: opts.robot,
        get_timeout: Duration::from_secs(opts.get_timeout),
        first_get_timeout: Duration::from_secs(opts.first_get_timeout),
        max_age: Duration::from_secs(opts.max_age),
        crawl_interval: Duration::from_secs(opts.crawl_interval),
        popular_interval: Duration::from_secs(opts.popular_interval),
    };
    let app = App::new(db, client, cfg);

    if !app.cfg.crawl_interval.is_zero() {
        tokio::spawn(crawl::background(app.clone()));
    }
    if !app.cfg.popular_interval.is_zero() {
        tokio::spawn(popular::background(app.clone()));
    }

    let addr: SocketAddr = opts.http.parse()?;
    tracing::info!(addr = %addr, "starting docdex server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, handlers::router(app)).await?;
    Ok(())
}
