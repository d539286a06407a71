//! Bounded fan-out executor.
//!
//! Runs independent work items concurrently with a concurrency ceiling,
//! collecting results in input order. Admission is FIFO: permits are
//! requested in input order against a fair semaphore, so at most
//! `concurrency` workers are in flight and the next unscheduled item starts
//! when a slot frees.
//!
//! Failure policy is fail-fast: the first worker failure (in completion
//! delivery order) aborts the whole map, outstanding workers are cancelled
//! by dropping their futures, and no partial result vector is returned.
//! Workers share no mutable state; each owns its input and produces an
//! independent output.

use std::future::Future;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;

use super::error::PipelineError;

/// Map `items` through `worker` with at most `concurrency` in flight.
///
/// `result[i]` is the worker's output for `items[i]` regardless of the
/// order in which workers completed.
pub async fn map<I, O, F, Fut>(
    items: Vec<I>,
    concurrency: usize,
    worker: F,
) -> Result<Vec<O>, PipelineError>
where
    F: Fn(usize, I) -> Fut,
    Fut: Future<Output = Result<O, PipelineError>>,
{
    if concurrency == 0 {
        return Err(PipelineError::FanOut(Box::new(PipelineError::ConfigInvalid(
            "fan-out concurrency must be positive".to_string(),
        ))));
    }

    let total = items.len();
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut in_flight = FuturesUnordered::new();

    for (index, item) in items.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let work = worker(index, item);
        in_flight.push(async move {
            let _permit = semaphore.acquire().await.map_err(|_| {
                PipelineError::FanOut(Box::new(PipelineError::ConfigInvalid(
                    "fan-out semaphore closed".to_string(),
                )))
            })?;
            let output = work.await?;
            Ok::<(usize, O), PipelineError>((index, output))
        });
    }

    let mut slots: Vec<Option<O>> = Vec::with_capacity(total);
    slots.resize_with(total, || None);

    while let Some(completed) = in_flight.next().await {
        match completed {
            Ok((index, output)) => slots[index] = Some(output),
            // Dropping `in_flight` cancels every outstanding worker.
            Err(PipelineError::FanOut(inner)) => return Err(PipelineError::FanOut(inner)),
            Err(e) => return Err(PipelineError::FanOut(Box::new(e))),
        }
    }

    let results: Vec<O> = slots.into_iter().flatten().collect();
    debug_assert_eq!(results.len(), total);
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_results_are_index_aligned() {
        let items = vec![3u64, 1, 2];

        // Longer inputs sleep longer, so completion order inverts input order.
        let results = map(items, 3, |_, n| async move {
            tokio::time::sleep(std::time::Duration::from_millis(n * 10)).await;
            Ok(n * 100)
        })
        .await
        .unwrap();

        assert_eq!(results, vec![300, 100, 200]);
    }

    #[tokio::test]
    async fn test_failure_returns_no_partial_results() {
        let items = vec![1, 2, 3, 4];

        let result = map(items, 2, |_, n| async move {
            if n == 2 {
                Err(PipelineError::Generation("boom".to_string()))
            } else {
                Ok(n)
            }
        })
        .await;

        assert!(matches!(result, Err(PipelineError::FanOut(_))));
    }

    #[tokio::test]
    async fn test_zero_concurrency_rejected() {
        let result = map(vec![1], 0, |_, n| async move { Ok(n) }).await;
        assert!(matches!(result, Err(PipelineError::FanOut(_))));
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_bound() {
        let active = Arc::new(AtomicUsize::new(0));
        let high_water = Arc::new(AtomicUsize::new(0));

        let items: Vec<usize> = (0..20).collect();
        let results = map(items, 3, |_, n| {
            let active = Arc::clone(&active);
            let high_water = Arc::clone(&high_water);
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                high_water.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(n)
            }
        })
        .await
        .unwrap();

        assert_eq!(results.len(), 20);
        assert!(high_water.load(Ordering::SeqCst) <= 3);
    }
}
