use futures_util::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("worker pool is shut down")]
    Closed,

    #[error("work queue is full")]
    QueueFull,

    #[error("task failed")]
    TaskFailed,
}

/// Receives the wall-clock duration of every completed work item, success
/// or failure.
pub trait PoolObserver: Send + Sync {
    fn task_complete(&self, label: &str, duration: Duration, ok: bool);
}

/// Observer that discards measurements.
pub struct NullObserver;

impl PoolObserver for NullObserver {
    fn task_complete(&self, _label: &str, _duration: Duration, _ok: bool) {}
}

struct Job {
    label: &'static str,
    enqueued: Instant,
    fut: Pin<Box<dyn Future<Output = ()> + Send>>,
}

enum JobSender {
    Bounded(mpsc::Sender<Job>),
    Unbounded(mpsc::UnboundedSender<Job>),
}

enum JobReceiver {
    Bounded(mpsc::Receiver<Job>),
    Unbounded(mpsc::UnboundedReceiver<Job>),
}

impl JobReceiver {
    async fn recv(&mut self) -> Option<Job> {
        match self {
            JobReceiver::Bounded(rx) => rx.recv().await,
            JobReceiver::Unbounded(rx) => rx.recv().await,
        }
    }
}

/// Fixed-size pool of worker tasks draining one FIFO queue.
///
/// A full queue blocks the enqueuer rather than dropping work. A panicking
/// work item is reported to the observer as a failure and does not take the
/// worker down.
pub struct WorkerPool {
    tx: JobSender,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// `max_queue == 0` means unbounded (enqueue never blocks).
    pub fn new(workers: usize, max_queue: usize, observer: Arc<dyn PoolObserver>) -> Self {
        let (tx, rx) = if max_queue == 0 {
            let (tx, rx) = mpsc::unbounded_channel();
            (JobSender::Unbounded(tx), JobReceiver::Unbounded(rx))
        } else {
            let (tx, rx) = mpsc::channel(max_queue);
            (JobSender::Bounded(tx), JobReceiver::Bounded(rx))
        };

        let rx = Arc::new(Mutex::new(rx));
        let handles = (0..workers.max(1))
            .map(|i| {
                let rx = Arc::clone(&rx);
                let observer = Arc::clone(&observer);
                tokio::spawn(async move {
                    loop {
                        let job = {
                            let mut rx = rx.lock().await;
                            rx.recv().await
                        };
                        let Some(job) = job else { break };

                        let label = job.label;
                        let outcome = AssertUnwindSafe(job.fut).catch_unwind().await;
                        let ok = outcome.is_ok();
                        if !ok {
                            tracing::error!(worker = i, task = label, "Work item panicked");
                        }
                        observer.task_complete(label, job.enqueued.elapsed(), ok);
                    }
                })
            })
            .collect();

        Self { tx, workers: handles }
    }

    /// Enqueue a work item, waiting for queue capacity if necessary.
    pub async fn submit<F>(&self, label: &'static str, fut: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let job = Job { label, enqueued: Instant::now(), fut: Box::pin(fut) };
        match &self.tx {
            JobSender::Bounded(tx) => tx.send(job).await.map_err(|_| PoolError::Closed),
            JobSender::Unbounded(tx) => tx.send(job).map_err(|_| PoolError::Closed),
        }
    }

    /// Enqueue without waiting; fails with `QueueFull` when at capacity.
    pub fn try_submit<F>(&self, label: &'static str, fut: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let job = Job { label, enqueued: Instant::now(), fut: Box::pin(fut) };
        match &self.tx {
            JobSender::Bounded(tx) => tx.try_send(job).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => PoolError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => PoolError::Closed,
            }),
            JobSender::Unbounded(tx) => tx.send(job).map_err(|_| PoolError::Closed),
        }
    }

    /// Enqueue a work item and wait for its result.
    pub async fn execute<T, F>(&self, label: &'static str, fut: F) -> Result<T, PoolError>
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.submit(label, async move {
            let _ = tx.send(fut.await);
        })
        .await?;
        // The sender is dropped without sending if the item panicked.
        rx.await.map_err(|_| PoolError::TaskFailed)
    }

    /// Stop accepting work and wait for queued items to drain.
    pub async fn shutdown(self) {
        drop(self.tx);
        for handle in self.workers {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Recorder {
        completions: AtomicUsize,
        failures: AtomicUsize,
    }

    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self { completions: AtomicUsize::new(0), failures: AtomicUsize::new(0) })
        }
    }

    impl PoolObserver for Recorder {
        fn task_complete(&self, _label: &str, _duration: Duration, ok: bool) {
            self.completions.fetch_add(1, Ordering::SeqCst);
            if !ok {
                self.failures.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[tokio::test]
    async fn executes_submitted_work() {
        let recorder = Recorder::new();
        let pool = WorkerPool::new(2, 8, recorder.clone());
        let result = pool.execute("double", async { 21 * 2 }).await.unwrap();
        assert_eq!(result, 42);
        pool.shutdown().await;
        assert_eq!(recorder.completions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panicking_task_does_not_kill_worker() {
        let recorder = Recorder::new();
        let pool = WorkerPool::new(1, 8, recorder.clone());

        let err = pool
            .execute("boom", async {
                panic!("injected");
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::TaskFailed));

        // The same (sole) worker still services new work.
        let result = pool.execute("after", async { 7 }).await.unwrap();
        assert_eq!(result, 7);

        pool.shutdown().await;
        assert_eq!(recorder.failures.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.completions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn try_submit_reports_full_queue() {
        let recorder = Recorder::new();
        let pool = WorkerPool::new(1, 1, recorder.clone());
        let (gate_tx, gate_rx) = oneshot::channel::<()>();

        // Occupy the worker, then fill the single queue slot.
        pool.submit("blocker", async move {
            let _ = gate_rx.await;
        })
        .await
        .unwrap();
        // Give the worker a chance to pick the blocker up.
        tokio::task::yield_now().await;
        pool.submit("queued", async {}).await.unwrap();

        let err = pool.try_submit("overflow", async {}).unwrap_err();
        assert!(matches!(err, PoolError::QueueFull));

        let _ = gate_tx.send(());
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_drains_queued_items() {
        let recorder = Recorder::new();
        let pool = WorkerPool::new(2, 16, recorder.clone());
        for _ in 0..10 {
            pool.submit("tick", async {}).await.unwrap();
        }
        pool.shutdown().await;
        assert_eq!(recorder.completions.load(Ordering::SeqCst), 10);
    }
}
