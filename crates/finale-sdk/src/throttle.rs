//! Fixed-window throttling for provider calls.
//!
//! Work is split into batches of at most `batch_size` calls. Calls inside a batch
//! run concurrently and are joined before the next batch starts, and a fixed pause
//! separates consecutive batches. Output order always matches input order.

use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchThrottle {
    batch_size: usize,
    pause: Duration,
}

impl BatchThrottle {
    pub const DEFAULT_BID_CHECK_BATCH_SIZE: usize = 20;
    pub const DEFAULT_BID_CHECK_PAUSE: Duration = Duration::from_millis(1500);
    pub const DEFAULT_METADATA_BATCH_SIZE: usize = 5;
    pub const DEFAULT_METADATA_PAUSE: Duration = Duration::from_millis(2000);

    /// A batch size of zero is treated as one.
    pub fn new(batch_size: usize, pause: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            pause,
        }
    }

    pub fn bid_checks() -> Self {
        Self::new(
            Self::DEFAULT_BID_CHECK_BATCH_SIZE,
            Self::DEFAULT_BID_CHECK_PAUSE,
        )
    }

    pub fn token_metadata() -> Self {
        Self::new(
            Self::DEFAULT_METADATA_BATCH_SIZE,
            Self::DEFAULT_METADATA_PAUSE,
        )
    }

    /// No pause between batches; used by tests and local devnets.
    pub fn unthrottled(batch_size: usize) -> Self {
        Self::new(batch_size, Duration::ZERO)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn pause(&self) -> Duration {
        self.pause
    }

    pub async fn run<I, T, F, Fut>(&self, items: Vec<I>, mut f: F) -> Vec<T>
    where
        F: FnMut(I) -> Fut,
        Fut: Future<Output = T>,
    {
        let total_batches = items.len().div_ceil(self.batch_size);
        let mut results = Vec::with_capacity(items.len());
        let mut remaining = items.into_iter().peekable();
        let mut batch_number = 0usize;

        while remaining.peek().is_some() {
            let batch: Vec<Fut> = remaining.by_ref().take(self.batch_size).map(&mut f).collect();
            batch_number += 1;
            results.extend(join_all(batch).await);
            debug!(
                batch = batch_number,
                total_batches,
                completed = results.len(),
                "Batch complete"
            );

            if remaining.peek().is_some() && !self.pause.is_zero() {
                tokio::time::sleep(self.pause).await;
            }
        }

        results
    }
}
