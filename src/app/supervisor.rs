//! Builds, starts, and stops the pollers and dispatchers.
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::app::context::AppContext;
use crate::app::dispatcher::Dispatcher;
use crate::app::poller::Poller;
use crate::ports::clock::Clock;
use crate::ports::http::{FeedFetch, HookPost};
use crate::ports::random::RandomSource;
use crate::ports::store::Store;

const SHUTDOWN_DEADLINE_SECS: u64 = 30;

pub struct Supervisor;

impl Supervisor {
    /// Runs the whole pipeline until `shutdown` resolves, then winds it down:
    /// pollers first (in-flight ticks finish), then dispatchers get to drain
    /// their queues, all bounded by one deadline.
    pub async fn run<S, F, P, C, G>(ctx: AppContext<S, F, P, C, G>, shutdown: impl Future<Output = ()>)
    where
        S: Store + 'static,
        F: FeedFetch + 'static,
        P: HookPost + 'static,
        C: Clock + 'static,
        G: RandomSource + 'static,
    {
        let used: std::collections::HashSet<&str> = ctx
            .cfg
            .feeds
            .iter()
            .flat_map(|f| f.webhooks.iter().map(String::as_str))
            .collect();
        for webhook in &ctx.cfg.webhooks {
            if !used.contains(webhook.name.as_str()) {
                warn!(webhook = %webhook.name, "webhook defined, but not used");
            }
        }

        let wakers: HashMap<String, Arc<Notify>> = ctx
            .cfg
            .webhooks
            .iter()
            .map(|w| (w.name.clone(), Arc::new(Notify::new())))
            .collect();

        // Dispatchers start first so a queue left over from the previous run
        // begins draining before any poll happens.
        let mut dispatchers: Vec<(mpsc::Sender<()>, JoinHandle<()>)> = Vec::new();
        for webhook in &ctx.cfg.webhooks {
            let (tx, rx) = mpsc::channel(1);
            let dispatcher = Dispatcher::new(
                webhook.clone(),
                ctx.store.clone(),
                ctx.post.clone(),
                ctx.clock.clone(),
                ctx.rng.clone(),
                wakers[&webhook.name].clone(),
            );
            dispatchers.push((tx, tokio::spawn(dispatcher.run(rx))));
        }

        let mut pollers: Vec<(mpsc::Sender<()>, JoinHandle<()>)> = Vec::new();
        for feed in ctx.cfg.enabled_feeds() {
            let feed_wakers: HashMap<String, Arc<Notify>> = feed
                .webhooks
                .iter()
                .filter_map(|name| wakers.get(name).map(|n| (name.clone(), n.clone())))
                .collect();
            let (tx, rx) = mpsc::channel(1);
            let poller = Poller::new(
                feed.clone(),
                &ctx.cfg.app,
                ctx.store.clone(),
                ctx.fetch.clone(),
                ctx.clock.clone(),
                ctx.rng.clone(),
                feed_wakers,
            );
            pollers.push((tx, tokio::spawn(poller.run(rx))));
        }

        info!(
            feeds = pollers.len(),
            webhooks = dispatchers.len(),
            "service started"
        );

        shutdown.await;
        info!("shutdown requested");
        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(SHUTDOWN_DEADLINE_SECS);

        for (tx, _) in &pollers {
            let _ = tx.send(()).await;
        }
        join_until(pollers, deadline, "poller").await;

        for (tx, _) in &dispatchers {
            let _ = tx.send(()).await;
        }
        join_until(dispatchers, deadline, "dispatcher").await;

        info!("service stopped");
    }
}

async fn join_until(
    tasks: Vec<(mpsc::Sender<()>, JoinHandle<()>)>,
    deadline: tokio::time::Instant,
    kind: &str,
) {
    for (_, mut handle) in tasks {
        match tokio::time::timeout_at(deadline, &mut handle).await {
            Ok(_) => {}
            Err(_) => {
                warn!(kind, "task missed the shutdown deadline, aborting");
                handle.abort();
            }
        }
    }
}
