use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::app::{Result, StockwatchError};
use crate::notify::{Notification, Notifier};

pub const DEFAULT_MAX_IN_FLIGHT: usize = 5;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
}

/// Fire-and-forget sends with a cap on how many are in flight.
///
/// Lives for one pass: [`dispatch`](Self::dispatch) never waits for delivery,
/// [`finish`](Self::finish) drains whatever is still pending.
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    semaphore: Arc<Semaphore>,
    tasks: JoinSet<(i64, Result<()>)>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, max_in_flight: usize) -> Self {
        Self {
            notifier,
            semaphore: Arc::new(Semaphore::new(max_in_flight.max(1))),
            tasks: JoinSet::new(),
        }
    }

    pub fn dispatch(&mut self, destination: i64, notification: Notification) {
        let notifier = self.notifier.clone();
        let semaphore = self.semaphore.clone();

        self.tasks.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => return (destination, Err(StockwatchError::Notify(e.to_string()))),
            };
            let result = notifier.send(destination, &notification).await;
            (destination, result)
        });
    }

    /// Sends scheduled but not yet joined.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for every scheduled send. Failures are logged and counted, never retried.
    pub async fn finish(mut self) -> DispatchReport {
        let mut report = DispatchReport::default();
        if self.pending() > 0 {
            debug!(pending = self.pending(), "Waiting for notifications to finish");
        }

        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => report.sent += 1,
                Ok((destination, Err(e))) => {
                    warn!(destination, error = %e, "Failed to deliver notification");
                    report.failed += 1;
                }
                Err(e) => {
                    error!("Notification task join error: {}", e);
                    report.failed += 1;
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingNotifier {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        delivered: Mutex<Vec<(i64, String)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, destination: i64, notification: &Notification) -> Result<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if notification.url.contains("fail") {
                return Err(StockwatchError::Notify("chat not found".into()));
            }
            self.delivered
                .lock()
                .unwrap()
                .push((destination, notification.url.clone()));
            Ok(())
        }
    }

    /// Each send blocks until the test hands out a permit.
    struct GatedNotifier {
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl Notifier for GatedNotifier {
        async fn send(&self, _destination: i64, _notification: &Notification) -> Result<()> {
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| StockwatchError::Notify(e.to_string()))?;
            permit.forget();
            Ok(())
        }
    }

    fn notification(url: &str) -> Notification {
        Notification {
            title: "Zara".into(),
            url: url.into(),
            sizes: vec!["M".into()],
        }
    }

    #[tokio::test]
    async fn test_concurrency_is_capped() {
        let notifier = Arc::new(RecordingNotifier::default());
        let mut dispatcher = NotificationDispatcher::new(notifier.clone(), 5);

        for i in 0..20 {
            dispatcher.dispatch(7, notification(&format!("https://www.zara.com/p{i}.html")));
        }
        let report = dispatcher.finish().await;

        assert_eq!(report, DispatchReport { sent: 20, failed: 0 });
        assert!(notifier.peak.load(Ordering::SeqCst) <= 5);
        assert_eq!(notifier.delivered.lock().unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_failures_are_counted_not_fatal() {
        let notifier = Arc::new(RecordingNotifier::default());
        let mut dispatcher = NotificationDispatcher::new(notifier.clone(), 2);

        dispatcher.dispatch(1, notification("https://www.zara.com/ok1.html"));
        dispatcher.dispatch(1, notification("https://www.zara.com/fail.html"));
        dispatcher.dispatch(1, notification("https://www.zara.com/ok2.html"));

        let report = dispatcher.finish().await;
        assert_eq!(report, DispatchReport { sent: 2, failed: 1 });
    }

    #[tokio::test]
    async fn test_dispatch_does_not_wait_for_delivery() {
        let gate = Arc::new(Semaphore::new(0));
        let notifier = Arc::new(GatedNotifier { gate: gate.clone() });
        let mut dispatcher = NotificationDispatcher::new(notifier, 1);

        for i in 0..3 {
            dispatcher.dispatch(1, notification(&format!("https://www.zara.com/p{i}.html")));
        }
        assert_eq!(dispatcher.pending(), 3);

        // Nothing can complete until the gate opens
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(dispatcher.pending(), 3);

        gate.add_permits(3);
        let report = dispatcher.finish().await;
        assert_eq!(report.sent, 3);
    }

    #[tokio::test]
    async fn test_finish_without_sends() {
        let dispatcher = NotificationDispatcher::new(Arc::new(RecordingNotifier::default()), 5);
        assert_eq!(dispatcher.finish().await, DispatchReport::default());
    }
}
