use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::error;

use feedforward::app::{context::AppContext, supervisor::Supervisor};
use feedforward::domain::model::Config;
use feedforward::infra::config::{ConfigLoader, CONFIG_FILENAME};
use feedforward::infra::logging::init_logging;
use feedforward::infra::random::MutexRng;
use feedforward::infra::reqwest_http::{ReqwestFeedFetch, ReqwestHookPost};
use feedforward::infra::sqlite_store::{SqliteStore, DB_FILENAME};
use feedforward::infra::system_clock::SystemClock;
use feedforward::infra::time::epoch_ms_to_rfc3339_utc;
use feedforward::ports::store::{Store, StoreError};

/// A service for forwarding RSS and Atom feeds to Discord-compatible webhooks.
#[derive(Parser)]
#[command(name = "feedforward", disable_version_flag = true)]
struct Args {
    /// Path to the directory containing the configuration file.
    #[arg(long, default_value = ".")]
    config: PathBuf,
    /// Path to the directory containing the database file.
    #[arg(long, default_value = ".")]
    db: PathBuf,
    /// Show version and exit.
    #[arg(short = 'v', long = "version")]
    version: bool,
    /// Show contents of the database and exit.
    #[arg(long = "show-db")]
    show_db: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    if args.version {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let cfg_path = args.config.join(CONFIG_FILENAME);
    let cfg = match ConfigLoader::load(&cfg_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Config error: {e}");
            return ExitCode::from(1);
        }
    };
    init_logging(&cfg.app.logger_level);

    let db_path = args.db.join(DB_FILENAME);
    let store = match SqliteStore::open(&db_path).await {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Failed to open database: {e}");
            return ExitCode::from(2);
        }
    };
    if let Err(e) = store.migrate().await {
        eprintln!("Database init failed: {e}");
        store.close().await;
        return ExitCode::from(2);
    }

    if args.show_db {
        let code = match print_db_content(&store, &cfg).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Database error: {e}");
                ExitCode::from(2)
            }
        };
        store.close().await;
        return code;
    }

    let fetch = match ReqwestFeedFetch::new() {
        Ok(f) => f,
        Err(e) => {
            error!(error = %e, "failed to build HTTP client");
            store.close().await;
            return ExitCode::from(1);
        }
    };
    let post = match ReqwestHookPost::new() {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "failed to build HTTP client");
            store.close().await;
            return ExitCode::from(1);
        }
    };

    let ctx = AppContext {
        cfg,
        store: Arc::new(store.clone()),
        fetch: Arc::new(fetch),
        post: Arc::new(post),
        clock: Arc::new(SystemClock),
        rng: Arc::new(MutexRng::new()),
    };
    Supervisor::run(ctx, shutdown_signal()).await;
    store.close().await;
    ExitCode::SUCCESS
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Dumps seen items and the delivery counters to stdout.
async fn print_db_content(store: &SqliteStore, cfg: &Config) -> Result<(), StoreError> {
    let feeds = store.list_feeds().await?;
    println!("feeds ({})", feeds.len());
    for feed in &feeds {
        let items = store.list_items(feed).await?;
        println!("    {feed} ({})", items.len());
        for item in items {
            println!(
                "        {} | {}",
                epoch_ms_to_rfc3339_utc(item.first_seen_ms),
                item.item_id
            );
        }
    }

    println!();
    println!("Feeds");
    println!(
        "{:<24} {:>8} {:>10} {:>27} {:>8}",
        "Name", "Enabled", "Received", "Last", "Errors"
    );
    let mut feed_cfgs = cfg.feeds.clone();
    feed_cfgs.sort_by(|a, b| a.name.cmp(&b.name));
    for fc in &feed_cfgs {
        let stats = store.get_feed_stats(&fc.name).await?.unwrap_or_default();
        println!(
            "{:<24} {:>8} {:>10} {:>27} {:>8}",
            fc.name,
            !fc.disabled,
            stats.received_count,
            stats
                .last_received_ms
                .map(epoch_ms_to_rfc3339_utc)
                .unwrap_or_else(|| "-".into()),
            stats.error_count
        );
    }

    println!();
    println!("Webhooks");
    println!(
        "{:<24} {:>8} {:>8} {:>27} {:>8}",
        "Name", "Queued", "Sent", "Last", "Errors"
    );
    let mut hook_cfgs = cfg.webhooks.clone();
    hook_cfgs.sort_by(|a, b| a.name.cmp(&b.name));
    for wc in &hook_cfgs {
        let stats = store.get_webhook_stats(&wc.name).await?.unwrap_or_default();
        let depth = store.queue_depth(&wc.name).await?;
        println!(
            "{:<24} {:>8} {:>8} {:>27} {:>8}",
            wc.name,
            depth,
            stats.sent_count,
            stats
                .last_sent_ms
                .map(epoch_ms_to_rfc3339_utc)
                .unwrap_or_else(|| "-".into()),
            stats.error_count
        );
    }
    Ok(())
}
