//! Serialized task scheduler with stale-run cancellation
//!
//! All pipeline work funnels through one scheduler so tasks never
//! overlap: a tokio `Mutex<()>` hands out the slot in FIFO order. Every
//! run holds a generation token; bumping the generation (a new run, a
//! filter change) makes older tokens stale, and a stale task is skipped
//! before it starts rather than interrupted mid-flight. Results from a
//! stale run are dropped by the caller, never applied.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::render::StatusSink;

/// Generation marker for one run. Copies freely into spawned tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunToken(u64);

pub struct TaskScheduler {
    status: Arc<dyn StatusSink>,
    queue: tokio::sync::Mutex<()>,
    latest_run: AtomicU64,
}

impl TaskScheduler {
    pub fn new(status: Arc<dyn StatusSink>) -> Self {
        Self {
            status,
            queue: tokio::sync::Mutex::new(()),
            latest_run: AtomicU64::new(0),
        }
    }

    /// Begin a new run generation, making every older token stale.
    pub fn start_run(&self) -> RunToken {
        let generation = self.latest_run.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(generation, "starting run");
        RunToken(generation)
    }

    pub fn is_stale(&self, token: RunToken) -> bool {
        token.0 != self.latest_run.load(Ordering::SeqCst)
    }

    /// Run `task` once the serialized slot is free, unless the token
    /// went stale while queued. Returns `Ok(None)` for a skipped stale
    /// task; the status line is only updated for tasks that run.
    pub async fn submit<T, F>(
        &self,
        token: RunToken,
        label: &str,
        task: F,
    ) -> anyhow::Result<Option<T>>
    where
        F: std::future::Future<Output = anyhow::Result<T>>,
    {
        let _slot = self.queue.lock().await;
        if self.is_stale(token) {
            tracing::debug!(label, "skipping stale task");
            return Ok(None);
        }
        self.status.publish(label);
        task.await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RecordingStatus;

    fn scheduler() -> (TaskScheduler, Arc<RecordingStatus>) {
        let status = Arc::new(RecordingStatus::new());
        (
            TaskScheduler::new(Arc::clone(&status) as Arc<dyn StatusSink>),
            status,
        )
    }

    #[tokio::test]
    async fn test_submit_runs_and_publishes_label() {
        let (scheduler, status) = scheduler();
        let token = scheduler.start_run();

        let result = scheduler
            .submit(token, "Getting sample for day 0", async { Ok(41 + 1) })
            .await
            .unwrap();
        assert_eq!(result, Some(42));
        assert_eq!(status.lines(), vec!["Getting sample for day 0"]);
    }

    #[tokio::test]
    async fn test_stale_token_is_skipped() {
        let (scheduler, status) = scheduler();
        let old = scheduler.start_run();
        let _new = scheduler.start_run();

        let result = scheduler
            .submit(old, "should not run", async { Ok(1) })
            .await
            .unwrap();
        assert_eq!(result, None);
        assert!(status.lines().is_empty());
    }

    #[tokio::test]
    async fn test_tasks_are_serialized_in_order() {
        use std::sync::Mutex;

        let (scheduler, _) = scheduler();
        let scheduler = Arc::new(scheduler);
        let order = Arc::new(Mutex::new(Vec::new()));
        let token = scheduler.start_run();

        let mut handles = Vec::new();
        for n in 0..4u32 {
            let scheduler = Arc::clone(&scheduler);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                scheduler
                    .submit(token, &format!("task {n}"), async {
                        // Yield inside the slot; another task would
                        // interleave here if the queue did not hold.
                        order.lock().unwrap().push((n, "start"));
                        tokio::task::yield_now().await;
                        order.lock().unwrap().push((n, "end"));
                        Ok(())
                    })
                    .await
                    .unwrap();
            }));
            // Give each spawn a chance to enqueue before the next.
            tokio::task::yield_now().await;
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let order = order.lock().unwrap();
        for pair in order.chunks(2) {
            assert_eq!(pair[0].0, pair[1].0);
            assert_eq!(pair[0].1, "start");
            assert_eq!(pair[1].1, "end");
        }
    }

    #[tokio::test]
    async fn test_errors_propagate() {
        let (scheduler, _) = scheduler();
        let token = scheduler.start_run();

        let result: anyhow::Result<Option<()>> = scheduler
            .submit(token, "failing task", async {
                anyhow::bail!("no data")
            })
            .await;
        assert!(result.is_err());
    }
}
