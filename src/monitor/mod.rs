//! One monitoring pass.
//!
//! ```text
//! list_active ─► group by chat ─► per group:
//!                                   WorkerPool::run ──► ResultStream
//!                                                           │ (completion order)
//!                                                           ▼
//!                                   diff::evaluate ─► store.update_status
//!                                                 └─► NotificationDispatcher
//! ```
//!
//! Groups run one after another; inside a group the pool and the consumer
//! run concurrently so results are applied while pages are still loading.

pub mod diff;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::app::Result;
use crate::checker::stream::channel;
use crate::checker::{SessionFactory, WorkerPool};
use crate::domain::{Sentinel, Subscription};
use crate::notify::{NotificationDispatcher, Notifier, DEFAULT_MAX_IN_FLIGHT};
use crate::store::SubscriptionStore;

pub use diff::{evaluate, Decision};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub groups: usize,
    pub urls: usize,
    /// Subscriptions whose stored status changed.
    pub updated: usize,
    pub notified: usize,
    pub failed_sends: usize,
    pub store_errors: usize,
}

impl PassReport {
    fn absorb(&mut self, group: PassReport) {
        self.groups += group.groups;
        self.urls += group.urls;
        self.updated += group.updated;
        self.notified += group.notified;
        self.failed_sends += group.failed_sends;
        self.store_errors += group.store_errors;
    }
}

pub struct Monitor<F: SessionFactory> {
    store: Arc<dyn SubscriptionStore + Send + Sync>,
    pool: WorkerPool<F>,
    notifier: Arc<dyn Notifier>,
    notify_concurrency: usize,
}

impl<F: SessionFactory> Monitor<F> {
    pub fn new(
        store: Arc<dyn SubscriptionStore + Send + Sync>,
        pool: WorkerPool<F>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            pool,
            notifier,
            notify_concurrency: DEFAULT_MAX_IN_FLIGHT,
        }
    }

    pub fn with_notify_concurrency(mut self, max_in_flight: usize) -> Self {
        self.notify_concurrency = max_in_flight.max(1);
        self
    }

    /// Check every active subscription once.
    ///
    /// Only reading the subscription snapshot can fail; everything after that
    /// is logged and counted in the report.
    pub async fn run_pass(&self) -> Result<PassReport> {
        let groups = group_by_destination(self.store.list_active()?);
        let mut report = PassReport::default();

        if groups.is_empty() {
            debug!("No active subscriptions");
            return Ok(report);
        }

        for (destination, subscriptions) in &groups {
            let group = self.run_group(*destination, subscriptions).await;
            report.absorb(group);
        }

        info!(
            groups = report.groups,
            urls = report.urls,
            updated = report.updated,
            notified = report.notified,
            failed_sends = report.failed_sends,
            store_errors = report.store_errors,
            "Monitoring pass complete"
        );
        Ok(report)
    }

    async fn run_group(&self, destination: i64, subscriptions: &[Subscription]) -> PassReport {
        let urls = unique_urls(subscriptions);
        info!(destination, urls = urls.len(), "Checking subscriptions");

        let mut by_url: HashMap<&str, Vec<&Subscription>> = HashMap::new();
        for sub in subscriptions {
            by_url.entry(sub.url.as_str()).or_default().push(sub);
        }

        let mut report = PassReport {
            groups: 1,
            urls: urls.len(),
            ..PassReport::default()
        };
        let mut dispatcher = NotificationDispatcher::new(self.notifier.clone(), self.notify_concurrency);
        let (sink, mut stream) = channel();

        let consume = async {
            while let Some(message) = stream.next().await {
                let Some(subs) = by_url.get(message.url.as_str()) else {
                    warn!(destination, url = %message.url, "Result for a URL nobody follows");
                    continue;
                };
                for sub in subs {
                    self.apply(destination, sub, &message.text, &mut dispatcher, &mut report);
                }
            }
        };

        let (pool_report, ()) = tokio::join!(self.pool.run(urls, sink), consume);
        debug!(destination, ?pool_report, "Worker pool finished");
        if !stream.ended_cleanly() {
            warn!(
                destination,
                received = stream.received(),
                expected = report.urls,
                "Result stream ended early"
            );
        }

        let sent = dispatcher.finish().await;
        report.notified = sent.sent;
        report.failed_sends = sent.failed;
        report
    }

    fn apply(
        &self,
        destination: i64,
        sub: &Subscription,
        text: &str,
        dispatcher: &mut NotificationDispatcher,
        report: &mut PassReport,
    ) {
        let decision = evaluate(sub, text);
        if decision.is_noop() {
            return;
        }
        if let Some(sentinel) = Sentinel::from_text(text) {
            debug!(subscription = sub.id, url = %sub.url, ?sentinel, "Page could not be checked");
        }

        if let Some(ref status) = decision.persist {
            match self.store.update_status(sub.id, status) {
                Ok(()) => report.updated += 1,
                Err(e) => {
                    // Still notify: a repeated alert next pass beats a missed one
                    warn!(subscription = sub.id, error = %e, "Failed to store status");
                    report.store_errors += 1;
                }
            }
        }

        if let Some(notification) = decision.notify {
            info!(
                destination,
                subscription = sub.id,
                url = %sub.url,
                sizes = %notification.sizes_line(),
                "Availability changed"
            );
            dispatcher.dispatch(destination, notification);
        }
    }
}

/// Active subscriptions keyed by the chat that receives their notifications.
pub fn group_by_destination(subscriptions: Vec<Subscription>) -> BTreeMap<i64, Vec<Subscription>> {
    let mut groups: BTreeMap<i64, Vec<Subscription>> = BTreeMap::new();
    for sub in subscriptions {
        groups.entry(sub.chat_id).or_default().push(sub);
    }
    groups
}

/// URLs of a group in first-seen order, each once.
fn unique_urls(subscriptions: &[Subscription]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    subscriptions
        .iter()
        .filter(|s| seen.insert(s.url.as_str()))
        .map(|s| s.url.clone())
        .collect()
}
