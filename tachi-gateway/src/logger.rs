//! Asynchronous crawl logging.
//!
//! Recording a crawl on-chain must never cost the crawler a millisecond:
//! jobs are handed to a detached task immediately after the response is
//! committed and the handler moves on. Each job gets up to three retries
//! with jittered backoff on top of the ledger client's own 15 s submission
//! budget. Failures end in the log, never in a client response.
//!
//! Tasks are tracked so shutdown can drain in-flight submissions instead of
//! dropping them on the floor; the drain itself is bounded.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rand::RngExt;
use tokio_util::task::TaskTracker;

use tachi_evm::{CrawlLedger, CrawlLogJob};

/// Backoff before each retry, jittered ±25 %.
const RETRY_BACKOFF: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(3),
    Duration::from_secs(9),
];

/// Hands crawl-log jobs to detached submission tasks.
pub struct CrawlLogger {
    ledger: Arc<dyn CrawlLedger>,
    tracker: TaskTracker,
    failures: Arc<AtomicU64>,
}

impl std::fmt::Debug for CrawlLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlLogger")
            .field("failures", &self.failures)
            .finish_non_exhaustive()
    }
}

impl CrawlLogger {
    /// Creates a logger submitting through the given ledger.
    #[must_use]
    pub fn new(ledger: Arc<dyn CrawlLedger>) -> Self {
        Self {
            ledger,
            tracker: TaskTracker::new(),
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Schedules one crawl log. Returns immediately; the submission runs on
    /// a detached task that survives client disconnects.
    pub fn submit(&self, job: CrawlLogJob) {
        let ledger = Arc::clone(&self.ledger);
        let failures = Arc::clone(&self.failures);
        self.tracker.spawn(async move {
            run_job(ledger.as_ref(), &job, &failures).await;
        });
    }

    /// Number of jobs that exhausted all retries.
    #[must_use]
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Stops accepting jobs and waits up to `drain` for in-flight
    /// submissions to finish.
    pub async fn shutdown(&self, drain: Duration) {
        self.tracker.close();
        if tokio::time::timeout(drain, self.tracker.wait()).await.is_err() {
            tracing::warn!(
                pending = self.tracker.len(),
                "crawl-log drain budget elapsed, abandoning in-flight submissions"
            );
        }
    }
}

async fn run_job(ledger: &dyn CrawlLedger, job: &CrawlLogJob, failures: &AtomicU64) {
    let mut last_error = None;
    for attempt in 0..=RETRY_BACKOFF.len() {
        if attempt > 0 {
            tokio::time::sleep(jittered(RETRY_BACKOFF[attempt - 1])).await;
        }
        match ledger.log_crawl(job).await {
            Ok(tx_hash) => {
                tracing::info!(
                    crawler = %job.crawler,
                    tx = %tx_hash,
                    attempt = attempt + 1,
                    "crawl logged on-chain"
                );
                return;
            }
            Err(error) => {
                tracing::warn!(
                    crawler = %job.crawler,
                    attempt = attempt + 1,
                    %error,
                    "crawl-log submission failed"
                );
                last_error = Some(error);
            }
        }
    }
    failures.fetch_add(1, Ordering::Relaxed);
    tracing::error!(
        crawler = %job.crawler,
        user_agent = %job.user_agent,
        error = %last_error.map_or_else(String::new, |e| e.to_string()),
        "crawl log dropped after exhausting retries"
    );
}

fn jittered(base: Duration) -> Duration {
    let millis = base.as_millis() as u64;
    let spread = millis / 4;
    let jitter = rand::rng().random_range(0..=spread * 2);
    Duration::from_millis(millis - spread + jitter)
}
