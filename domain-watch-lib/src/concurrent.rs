//! Bounded worker pool for batch checks.
//!
//! Jobs are tagged with their input index, pulled from a shared queue by a
//! fixed number of workers, and written back into the slot matching that
//! index, so output order always equals input order regardless of which
//! job finishes first.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Runs a batch of jobs with at most `max_concurrency` in flight.
#[derive(Debug, Clone, Copy)]
pub struct ConcurrentProcessor {
    max_concurrency: usize,
}

impl ConcurrentProcessor {
    /// Create a new processor; a limit of zero is treated as one.
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Number of workers used for a batch of `jobs` items.
    pub fn worker_count(&self, jobs: usize) -> usize {
        self.max_concurrency.min(jobs)
    }

    /// Apply `task` to every item and return the results in input order.
    ///
    /// A slot is `None` only if the worker running that job panicked; the
    /// remaining workers keep draining the queue.
    pub async fn run<T, R, F, Fut>(&self, items: Vec<T>, task: F) -> Vec<Option<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let total = items.len();
        if total == 0 {
            return Vec::new();
        }

        let (job_tx, job_rx) = mpsc::unbounded_channel::<(usize, T)>();
        for job in items.into_iter().enumerate() {
            if job_tx.send(job).is_err() {
                break;
            }
        }
        drop(job_tx);

        let job_rx = Arc::new(Mutex::new(job_rx));
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<(usize, R)>();
        let task = Arc::new(task);

        let workers = self.worker_count(total);
        debug!(jobs = total, workers, "starting worker pool");

        let mut set = JoinSet::new();
        for _ in 0..workers {
            let job_rx = Arc::clone(&job_rx);
            let result_tx = result_tx.clone();
            let task = Arc::clone(&task);
            set.spawn(async move {
                loop {
                    let job = job_rx.lock().await.recv().await;
                    let Some((index, item)) = job else {
                        break;
                    };
                    let result = task(item).await;
                    if result_tx.send((index, result)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);

        let mut slots: Vec<Option<R>> = (0..total).map(|_| None).collect();
        while let Some((index, result)) = result_rx.recv().await {
            slots[index] = Some(result);
        }

        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "batch worker terminated abnormally");
            }
        }

        slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn paused_runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn test_results_line_up_with_inputs(
            delays in prop::collection::vec(0u64..20, 0..300),
            limit in 1usize..64,
        ) {
            let items: Vec<(usize, u64)> = delays.into_iter().enumerate().collect();
            let total = items.len();

            let results = paused_runtime().block_on(async move {
                ConcurrentProcessor::new(limit)
                    .run(items, |(index, delay)| async move {
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        index
                    })
                    .await
            });

            prop_assert_eq!(results.len(), total);
            for (i, result) in results.iter().enumerate() {
                prop_assert_eq!(*result, Some(i), "slot {}", i);
            }
        }
    }

    #[tokio::test]
    async fn test_single_item_with_large_limit() {
        let results = ConcurrentProcessor::new(64)
            .run(vec!["only"], |s| async move { s.len() })
            .await;
        assert_eq!(results, vec![Some(4)]);
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_limit() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let processor = ConcurrentProcessor::new(4);
        let (flight, max) = (Arc::clone(&in_flight), Arc::clone(&peak));
        let results = processor
            .run((0..40).collect::<Vec<u32>>(), move |i| {
                let flight = Arc::clone(&flight);
                let max = Arc::clone(&max);
                async move {
                    let now = flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    flight.fetch_sub(1, Ordering::SeqCst);
                    i
                }
            })
            .await;

        assert_eq!(results.len(), 40);
        assert!(peak.load(Ordering::SeqCst) <= 4);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_panicking_job_leaves_empty_slot() {
        let processor = ConcurrentProcessor::new(3);
        let results = processor
            .run((0..10).collect::<Vec<u32>>(), |i| async move {
                if i == 3 {
                    panic!("boom");
                }
                i
            })
            .await;

        assert_eq!(results.len(), 10);
        assert_eq!(results[3], None);
        assert_eq!(results[9], Some(9));
        assert_eq!(results.iter().filter(|r| r.is_some()).count(), 9);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let processor = ConcurrentProcessor::new(8);
        let results = processor.run(Vec::<u8>::new(), |i| async move { i }).await;
        assert!(results.is_empty());
        assert_eq!(processor.worker_count(3), 3);
        assert_eq!(ConcurrentProcessor::new(0).max_concurrency(), 1);
    }
}
