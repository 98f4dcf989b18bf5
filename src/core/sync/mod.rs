use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::core::feed::{Delivery, FeedService};

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    /// First load; always fetches.
    Startup,
    /// Periodic check; fetches only when the cache is stale.
    Interval,
    /// The viewer came back to the page; fetches only when the cache is stale.
    Visible,
    /// User asked for fresh posts; clears the cache and fetches.
    Manual,
}

/// Single background task that owns every automatic and manual refresh.
pub struct RefreshScheduler {
    service: Arc<FeedService>,
    check_interval: Duration,
}

pub struct SchedulerHandle {
    triggers: mpsc::Sender<RefreshTrigger>,
    deliveries: watch::Receiver<Option<Delivery>>,
    task: JoinHandle<()>,
}

impl RefreshScheduler {
    pub fn new(service: Arc<FeedService>, check_interval: Duration) -> Self {
        Self {
            service,
            check_interval,
        }
    }

    pub fn spawn(self) -> SchedulerHandle {
        let (trigger_tx, trigger_rx) = mpsc::channel(16);
        let (delivery_tx, delivery_rx) = watch::channel(None);
        let task = tokio::spawn(self.run(trigger_rx, delivery_tx));
        SchedulerHandle {
            triggers: trigger_tx,
            deliveries: delivery_rx,
            task,
        }
    }

    async fn run(
        self,
        mut triggers: mpsc::Receiver<RefreshTrigger>,
        deliveries: watch::Sender<Option<Delivery>>,
    ) {
        tracing::info!(check_interval_secs = self.check_interval.as_secs(), "refresh scheduler started");
        self.handle(RefreshTrigger::Startup, &deliveries).await;

        let mut ticker = tokio::time::interval_at(Instant::now() + self.check_interval, self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let trigger = tokio::select! {
                _ = ticker.tick() => RefreshTrigger::Interval,
                received = triggers.recv() => match received {
                    Some(trigger) => trigger,
                    None => break,
                },
            };
            self.handle(trigger, &deliveries).await;
        }

        tracing::info!("refresh scheduler stopped");
    }

    async fn handle(&self, trigger: RefreshTrigger, deliveries: &watch::Sender<Option<Delivery>>) {
        tracing::debug!(?trigger, "refresh trigger received");
        let delivery = match trigger {
            RefreshTrigger::Startup => self.service.refresh().await,
            RefreshTrigger::Interval | RefreshTrigger::Visible => {
                self.service.refresh_if_stale().await
            }
            RefreshTrigger::Manual => self.service.force_refresh().await,
        };
        if let Some(delivery) = delivery {
            tracing::info!(?trigger, source = delivery.label(), posts = delivery.posts().len(), "posts updated");
            deliveries.send_replace(Some(delivery));
        }
    }
}

impl SchedulerHandle {
    /// Returns false once the scheduler has stopped.
    pub async fn notify_visible(&self) -> bool {
        self.triggers.send(RefreshTrigger::Visible).await.is_ok()
    }

    pub async fn request_refresh(&self) -> bool {
        self.triggers.send(RefreshTrigger::Manual).await.is_ok()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Delivery>> {
        self.deliveries.clone()
    }

    /// Stops accepting triggers and waits for the current refresh to finish.
    pub async fn shutdown(self) {
        drop(self.triggers);
        if let Err(error) = self.task.await {
            tracing::warn!(%error, "refresh scheduler task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::feed::fetcher::{FeedTransport, FetchError, FetchedBody};
    use crate::core::feed::retriever::{FeedRetriever, RetrieverSettings, DEFAULT_STALE_AFTER};
    use crate::core::feed::strategy::{DirectFeedStrategy, FeedStrategy};
    use crate::core::storage::cache::PostCache;
    use crate::core::storage::memory::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const MINUTE: i64 = 60 * 1000;

    #[derive(Default)]
    struct CountingTransport {
        requests: AtomicUsize,
    }

    #[async_trait]
    impl FeedTransport for CountingTransport {
        async fn get(&self, _url: &str) -> Result<FetchedBody, FetchError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            Ok(FetchedBody {
                body: include_bytes!("../../../fixtures/sample.rss.xml").to_vec(),
            })
        }
    }

    fn scheduler(transport: Arc<CountingTransport>, clock: Arc<ManualClock>) -> RefreshScheduler {
        let strategies: Vec<Box<dyn FeedStrategy>> = vec![Box::new(DirectFeedStrategy)];
        let retriever = FeedRetriever::new(
            RetrieverSettings {
                feed_url: "http://blog.example.com/feed".to_string(),
                site_url: "http://blog.example.com".to_string(),
                max_posts: 3,
                stale_after: DEFAULT_STALE_AFTER,
            },
            strategies,
            transport,
            PostCache::new(Arc::new(MemoryStore::new())),
            clock,
        );
        RefreshScheduler::new(Arc::new(FeedService::new(retriever)), DEFAULT_CHECK_INTERVAL)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn startup_load_is_published() {
        let transport = Arc::new(CountingTransport::default());
        let handle = scheduler(transport.clone(), Arc::new(ManualClock::new(0))).spawn();
        let mut deliveries = handle.subscribe();

        deliveries.changed().await.expect("scheduler should publish");
        let delivery = deliveries.borrow_and_update().clone();

        assert!(matches!(delivery, Some(Delivery::Live(ref posts)) if posts.len() == 3));
        assert_eq!(transport.requests.load(Ordering::SeqCst), 1);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn visibility_trigger_respects_staleness() {
        let transport = Arc::new(CountingTransport::default());
        let clock = Arc::new(ManualClock::new(0));
        let handle = scheduler(transport.clone(), clock.clone()).spawn();
        let mut deliveries = handle.subscribe();
        deliveries.changed().await.expect("startup delivery");
        deliveries.borrow_and_update();

        assert!(handle.notify_visible().await);
        settle().await;
        assert_eq!(transport.requests.load(Ordering::SeqCst), 1);
        assert!(!deliveries.has_changed().expect("scheduler alive"));

        clock.advance_millis(31 * MINUTE);
        assert!(handle.notify_visible().await);
        deliveries.changed().await.expect("stale visibility delivery");

        assert_eq!(transport.requests.load(Ordering::SeqCst), 2);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn interval_tick_refreshes_stale_cache() {
        let transport = Arc::new(CountingTransport::default());
        let clock = Arc::new(ManualClock::new(0));
        let handle = scheduler(transport.clone(), clock.clone()).spawn();
        let mut deliveries = handle.subscribe();
        deliveries.changed().await.expect("startup delivery");
        deliveries.borrow_and_update();

        // Fresh cache: the first tick checks and does nothing.
        tokio::time::sleep(DEFAULT_CHECK_INTERVAL + Duration::from_secs(1)).await;
        assert_eq!(transport.requests.load(Ordering::SeqCst), 1);

        clock.advance_millis(31 * MINUTE);
        deliveries.changed().await.expect("interval delivery");

        assert_eq!(transport.requests.load(Ordering::SeqCst), 2);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn manual_trigger_always_fetches() {
        let transport = Arc::new(CountingTransport::default());
        let handle = scheduler(transport.clone(), Arc::new(ManualClock::new(0))).spawn();
        let mut deliveries = handle.subscribe();
        deliveries.changed().await.expect("startup delivery");
        deliveries.borrow_and_update();

        assert!(handle.request_refresh().await);
        deliveries.changed().await.expect("manual delivery");

        assert_eq!(transport.requests.load(Ordering::SeqCst), 2);
        handle.shutdown().await;
    }
}
