use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use tracing::{error, info, warn};

use crate::app::StockwatchError;
use crate::checker::stream::ResultSink;
use crate::checker::{ProberRegistry, SessionFactory};
use crate::domain::{Brand, Sentinel};

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_MAX_PER_BRAND: usize = 50;

/// Split `items` into contiguous chunks, one per worker.
///
/// `workers = min(max_workers, max(1, n))` and every chunk holds
/// `ceil(n / workers)` items except possibly the last, so fewer than
/// `workers` chunks can come back.
pub fn partition<T: Clone>(items: &[T], max_workers: usize) -> Vec<Vec<T>> {
    if items.is_empty() {
        return Vec::new();
    }
    let workers = max_workers.max(1).min(items.len());
    let chunk_size = items.len().div_ceil(workers);
    items.chunks(chunk_size).map(<[T]>::to_vec).collect()
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PoolReport {
    pub urls: usize,
    pub workers: usize,
    /// Pages a prober produced a status block for.
    pub checked: usize,
    /// Pages that got a failure sentinel instead.
    pub errored: usize,
    /// Pages never handed to a worker (unsupported domain or over the per-brand cap).
    pub skipped: usize,
    pub lost_sessions: usize,
}

impl PoolReport {
    fn absorb(&mut self, outcome: WorkerOutcome) {
        self.checked += outcome.checked;
        self.errored += outcome.errored;
        if outcome.session_lost {
            self.lost_sessions += 1;
        }
    }
}

pub struct WorkerPool<F: SessionFactory> {
    factory: Arc<F>,
    probers: Arc<ProberRegistry<F::Session>>,
    max_workers: usize,
    max_per_brand: usize,
}

impl<F: SessionFactory> WorkerPool<F> {
    pub fn new(factory: Arc<F>, probers: ProberRegistry<F::Session>) -> Self {
        Self {
            factory,
            probers: Arc::new(probers),
            max_workers: DEFAULT_WORKERS,
            max_per_brand: DEFAULT_MAX_PER_BRAND,
        }
    }

    pub fn with_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    pub fn with_max_per_brand(mut self, max_per_brand: usize) -> Self {
        self.max_per_brand = max_per_brand;
        self
    }

    /// Check every URL once, streaming each result into `sink` as soon as it is known.
    ///
    /// Returns after all workers are done; the end-of-stream marker is sent
    /// last, also when `urls` is empty.
    pub async fn run(&self, urls: Vec<String>, sink: ResultSink) -> PoolReport {
        let mut report = PoolReport {
            urls: urls.len(),
            ..Default::default()
        };

        let (to_check, rejected) = self.plan(urls);
        for (url, sentinel) in &rejected {
            sink.emit(url, sentinel.text(), None);
        }
        report.skipped = rejected.len();

        let chunks = partition(&to_check, self.max_workers);
        report.workers = chunks.len();
        if let Some(first) = chunks.first() {
            info!(
                urls = to_check.len(),
                workers = chunks.len(),
                chunk_size = first.len(),
                "Running page checks in parallel"
            );
        }

        let mut handles = Vec::with_capacity(chunks.len());
        for (index, chunk) in chunks.into_iter().enumerate() {
            let progress = Arc::new(AtomicUsize::new(0));
            let worker = Worker {
                index,
                factory: self.factory.clone(),
                probers: self.probers.clone(),
                sink: sink.clone(),
                progress: progress.clone(),
            };
            let handle = tokio::spawn(worker.run(chunk.clone()));
            handles.push((index, chunk, progress, handle));
        }

        for (index, chunk, progress, handle) in handles {
            match handle.await {
                Ok(outcome) => report.absorb(outcome),
                Err(e) => {
                    // Whatever the worker never emitted still needs an answer.
                    let done = progress.load(Ordering::SeqCst).min(chunk.len());
                    error!(
                        worker = index,
                        error = %e,
                        unfinished = chunk.len() - done,
                        "Worker task failed"
                    );
                    for url in &chunk[done..] {
                        sink.emit(url, Sentinel::SessionLost.text(), Some(index));
                    }
                    report.errored += chunk.len() - done;
                    report.lost_sessions += 1;
                }
            }
        }

        sink.end();
        report
    }

    /// Split the input into URLs for workers and URLs answered up front.
    fn plan(&self, urls: Vec<String>) -> (Vec<String>, Vec<(String, Sentinel)>) {
        let mut per_brand: HashMap<Brand, usize> = HashMap::new();
        let mut to_check = Vec::with_capacity(urls.len());
        let mut rejected = Vec::new();

        for url in urls {
            match Brand::detect(&url).filter(|brand| self.probers.supports(*brand)) {
                None => rejected.push((url, Sentinel::UnsupportedDomain)),
                Some(brand) => {
                    let count = per_brand.entry(brand).or_insert(0);
                    if *count >= self.max_per_brand {
                        rejected.push((url, Sentinel::Skipped));
                    } else {
                        *count += 1;
                        to_check.push(url);
                    }
                }
            }
        }

        let over_cap = rejected
            .iter()
            .filter(|(_, s)| *s == Sentinel::Skipped)
            .count();
        if over_cap > 0 {
            warn!(
                skipped = over_cap,
                max_per_brand = self.max_per_brand,
                "Per-brand page limit reached"
            );
        }

        (to_check, rejected)
    }
}

#[derive(Debug, Default)]
struct WorkerOutcome {
    checked: usize,
    errored: usize,
    session_lost: bool,
}

struct Worker<F: SessionFactory> {
    index: usize,
    factory: Arc<F>,
    probers: Arc<ProberRegistry<F::Session>>,
    sink: ResultSink,
    progress: Arc<AtomicUsize>,
}

impl<F: SessionFactory> Worker<F> {
    async fn run(self, chunk: Vec<String>) -> WorkerOutcome {
        let mut outcome = WorkerOutcome::default();

        let mut session = match self.factory.open(self.index).await {
            Ok(session) => session,
            Err(e) => {
                error!(worker = self.index, error = %e, "Failed to open session");
                self.fail_remaining(&chunk, &mut outcome);
                outcome.session_lost = true;
                return outcome;
            }
        };

        for (position, url) in chunk.iter().enumerate() {
            let text = match self.probers.resolve(url) {
                Some(prober) => match AssertUnwindSafe(prober.check(&mut session, url))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| Err(StockwatchError::SessionFatal("prober panicked".into())))
                {
                    Ok(text) => {
                        outcome.checked += 1;
                        text
                    }
                    Err(e) if e.is_session_fatal() => {
                        error!(
                            worker = self.index,
                            url = %url,
                            error = %e,
                            remaining = chunk.len() - position,
                            "Session lost mid-chunk"
                        );
                        self.fail_remaining(&chunk[position..], &mut outcome);
                        outcome.session_lost = true;
                        break;
                    }
                    Err(e) => {
                        warn!(worker = self.index, url = %url, error = %e, "Page check failed");
                        outcome.errored += 1;
                        Sentinel::PageLoadFailed.text().to_string()
                    }
                },
                None => {
                    outcome.errored += 1;
                    Sentinel::UnsupportedDomain.text().to_string()
                }
            };
            self.emit(url, text);
        }

        self.factory.close(session).await;
        outcome
    }

    fn emit(&self, url: &str, text: String) {
        self.sink.emit(url, text, Some(self.index));
        self.progress.fetch_add(1, Ordering::SeqCst);
    }

    fn fail_remaining(&self, urls: &[String], outcome: &mut WorkerOutcome) {
        for url in urls {
            self.emit(url, Sentinel::SessionLost.text().to_string());
            outcome.errored += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Result;
    use crate::checker::stream::{channel, ResultMessage};
    use crate::checker::Prober;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::time::Duration;
    use tokio::sync::Notify;

    struct FakeSession {
        worker: usize,
    }

    #[derive(Default)]
    struct FakeFactory {
        fail_open: HashSet<usize>,
        opened: AtomicUsize,
        closed: AtomicUsize,
    }

    #[async_trait]
    impl SessionFactory for FakeFactory {
        type Session = FakeSession;

        async fn open(&self, worker: usize) -> Result<FakeSession> {
            if self.fail_open.contains(&worker) {
                return Err(StockwatchError::Browser("launch failed".into()));
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(FakeSession { worker })
        }

        async fn close(&self, _session: FakeSession) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Reacts to markers in the URL query: `fatal`, `broken`, `panic`, `gate`.
    #[derive(Default)]
    struct FakeProber {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl Prober<FakeSession> for FakeProber {
        async fn check(&self, session: &mut FakeSession, url: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_millis(1)).await;
            if url.ends_with("?fatal") {
                return Err(StockwatchError::SessionFatal("browser crashed".into()));
            }
            if url.ends_with("?broken") {
                return Err(StockwatchError::Browser("bad page".into()));
            }
            if url.ends_with("?panic") {
                panic!("prober bug");
            }
            if url.ends_with("?gate") {
                self.gate.notified().await;
            }
            Ok(format!("<b>🧵 Zara</b>\nworker {}\n🟢 M", session.worker))
        }
    }

    fn pool(factory: FakeFactory, prober: FakeProber, workers: usize) -> WorkerPool<FakeFactory> {
        let prober = Arc::new(prober);
        let registry = ProberRegistry::<FakeSession>::new()
            .register(Brand::Zara, prober.clone())
            .register(Brand::Bershka, prober);
        WorkerPool::new(Arc::new(factory), registry).with_workers(workers)
    }

    fn zara_urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://www.zara.com/p{i}.html")).collect()
    }

    async fn collect(pool: &WorkerPool<FakeFactory>, urls: Vec<String>) -> (PoolReport, Vec<ResultMessage>) {
        let (sink, mut stream) = channel();
        let consume = async {
            let mut received = Vec::new();
            while let Some(message) = stream.next().await {
                received.push(message);
            }
            assert!(stream.ended_cleanly());
            received
        };
        tokio::join!(pool.run(urls, sink), consume)
    }

    fn text_for<'a>(results: &'a [ResultMessage], url: &str) -> &'a str {
        &results.iter().find(|m| m.url == url).unwrap().text
    }

    #[test]
    fn test_partition_is_disjoint_ordered_cover() {
        for n in 0..25usize {
            let items: Vec<usize> = (0..n).collect();
            for max_workers in 0..9usize {
                let chunks = partition(&items, max_workers);

                let flat: Vec<usize> = chunks.iter().flatten().copied().collect();
                assert_eq!(flat, items, "n={n} workers={max_workers}");
                assert!(chunks.len() <= max_workers.max(1));
                assert!(chunks.iter().all(|c| !c.is_empty()));
            }
        }
    }

    #[test]
    fn test_partition_sizes() {
        let items: Vec<u32> = (0..5).collect();
        let sizes: Vec<usize> = partition(&items, 4).iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);

        let sizes: Vec<usize> = partition(&items[..3], 4).iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![1, 1, 1]);

        assert!(partition::<u32>(&[], 4).is_empty());
    }

    #[tokio::test]
    async fn test_every_url_answered_once_in_chunk_order() {
        let factory = FakeFactory::default();
        let pool = pool(factory, FakeProber::default(), 3);
        let urls = zara_urls(10);

        let (report, results) = collect(&pool, urls.clone()).await;

        assert_eq!(results.len(), urls.len());
        let seen: HashSet<&str> = results.iter().map(|m| m.url.as_str()).collect();
        assert_eq!(seen.len(), urls.len());

        // Within one worker, results follow input order
        for worker in 0..report.workers {
            let positions: Vec<usize> = results
                .iter()
                .filter(|m| m.worker == Some(worker))
                .map(|m| urls.iter().position(|u| *u == m.url).unwrap())
                .collect();
            assert!(positions.windows(2).all(|w| w[0] < w[1]));
        }

        assert_eq!(report.workers, 3);
        assert_eq!(report.checked, 10);
        assert_eq!(report.errored, 0);
        assert_eq!(pool.factory.opened.load(Ordering::SeqCst), 3);
        assert_eq!(pool.factory.closed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_session_lost_marks_rest_of_chunk() {
        let pool = pool(FakeFactory::default(), FakeProber::default(), 2);
        let mut urls = zara_urls(10);
        urls[2] = format!("{}?fatal", urls[2]);

        let (report, results) = collect(&pool, urls.clone()).await;

        assert_eq!(results.len(), 10);
        // First chunk: two pages checked, the other three get an explicit failure
        assert!(text_for(&results, &urls[0]).contains("🟢 M"));
        assert!(text_for(&results, &urls[1]).contains("🟢 M"));
        for url in &urls[2..5] {
            assert_eq!(text_for(&results, url), Sentinel::SessionLost.text());
        }
        // Second worker unaffected
        for url in &urls[5..] {
            assert!(text_for(&results, url).contains("worker 1"));
        }

        assert_eq!(report.checked, 7);
        assert_eq!(report.errored, 3);
        assert_eq!(report.lost_sessions, 1);
        assert_eq!(pool.factory.closed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_page_error_does_not_stop_worker() {
        let pool = pool(FakeFactory::default(), FakeProber::default(), 1);
        let mut urls = zara_urls(3);
        urls[1] = format!("{}?broken", urls[1]);

        let (report, results) = collect(&pool, urls.clone()).await;

        assert_eq!(text_for(&results, &urls[1]), Sentinel::PageLoadFailed.text());
        assert!(text_for(&results, &urls[2]).contains("🟢 M"));
        assert_eq!(report.checked, 2);
        assert_eq!(report.errored, 1);
        assert_eq!(report.lost_sessions, 0);
    }

    #[tokio::test]
    async fn test_open_failure_fails_whole_chunk() {
        let factory = FakeFactory {
            fail_open: HashSet::from([0]),
            ..Default::default()
        };
        let pool = pool(factory, FakeProber::default(), 2);
        let urls = zara_urls(4);

        let (report, results) = collect(&pool, urls.clone()).await;

        assert_eq!(results.len(), 4);
        assert_eq!(text_for(&results, &urls[0]), Sentinel::SessionLost.text());
        assert_eq!(text_for(&results, &urls[1]), Sentinel::SessionLost.text());
        assert!(text_for(&results, &urls[2]).contains("🟢 M"));
        assert_eq!(report.lost_sessions, 1);
    }

    #[tokio::test]
    async fn test_panicking_worker_answers_unfinished_urls() {
        let pool = pool(FakeFactory::default(), FakeProber::default(), 1);
        let mut urls = zara_urls(4);
        urls[1] = format!("{}?panic", urls[1]);

        let (report, results) = collect(&pool, urls.clone()).await;

        assert_eq!(results.len(), 4);
        assert!(text_for(&results, &urls[0]).contains("🟢 M"));
        for url in &urls[1..] {
            assert_eq!(text_for(&results, url), Sentinel::SessionLost.text());
        }
        assert_eq!(report.lost_sessions, 1);
        // The session of the panicking worker still goes back to the factory
        assert_eq!(pool.factory.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsupported_and_over_cap_answered_up_front() {
        let pool = pool(FakeFactory::default(), FakeProber::default(), 4).with_max_per_brand(2);
        let mut urls = zara_urls(3);
        urls.push("https://shop.example.com/item".into());
        urls.push("https://www.bershka.com/p1.html".into());

        let (report, results) = collect(&pool, urls.clone()).await;

        assert_eq!(results.len(), 5);
        assert_eq!(text_for(&results, &urls[2]), Sentinel::Skipped.text());
        assert_eq!(text_for(&results, &urls[3]), Sentinel::UnsupportedDomain.text());
        assert_eq!(results.iter().find(|m| m.url == urls[3]).unwrap().worker, None);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.checked, 3);
    }

    #[tokio::test]
    async fn test_empty_input_still_ends_stream() {
        let pool = pool(FakeFactory::default(), FakeProber::default(), 4);
        let (report, results) = collect(&pool, Vec::new()).await;

        assert!(results.is_empty());
        assert_eq!(report.workers, 0);
        assert_eq!(pool.factory.opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_results_stream_before_slow_chunk_finishes() {
        let prober = FakeProber::default();
        let gate = prober.gate.clone();
        let pool = pool(FakeFactory::default(), prober, 2);
        let urls = vec![
            "https://www.zara.com/slow.html?gate".to_string(),
            "https://www.zara.com/fast.html".to_string(),
        ];

        let (sink, mut stream) = channel();
        let consume = async {
            // The fast page must arrive while the slow one is still blocked
            let first = tokio::time::timeout(Duration::from_secs(5), stream.next())
                .await
                .expect("fast result was buffered")
                .unwrap();
            assert_eq!(first.url, urls[1]);
            gate.notify_one();

            let second = stream.next().await.unwrap();
            assert_eq!(second.url, urls[0]);
            assert!(stream.next().await.is_none());
        };

        let (report, ()) = tokio::join!(pool.run(urls.clone(), sink), consume);
        assert_eq!(report.checked, 2);
    }
}
