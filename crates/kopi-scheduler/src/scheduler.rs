use std::{sync::Arc, time::Duration};

use rayon::ThreadPool;
use tokio::runtime::Runtime;
use tokio::sync::{broadcast, oneshot};

use kopi_core::panic_payload_to_str;

use crate::{task::BlockingTask, CancellationToken, Cancelled, ProgressSender, TaskError};

enum WorkerPool {
    Rayon(ThreadPool),
    Inline,
}

impl WorkerPool {
    fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match self {
            WorkerPool::Rayon(pool) => pool.spawn(job),
            WorkerPool::Inline => job(),
        }
    }
}

fn build_worker_pool(prefix: &'static str, threads: usize) -> WorkerPool {
    // Thread creation can fail in constrained environments (low RLIMIT_NPROC,
    // EAGAIN). Shrink the pool before giving up on parallelism entirely.
    let mut threads = threads.max(1);
    loop {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |idx| format!("{prefix}-{idx}"))
            .build()
        {
            Ok(pool) => return WorkerPool::Rayon(pool),
            Err(_) if threads > 1 => {
                threads = (threads / 2).max(1);
            }
            Err(_) => return WorkerPool::Inline,
        }
    }
}

fn build_timer_runtime() -> Runtime {
    match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_time()
        .thread_name("kopi-timer")
        .build()
    {
        Ok(rt) => rt,
        Err(err) => tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap_or_else(|_| panic!("failed to build timer runtime: {err}")),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    Compute,
    Background,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub compute_threads: usize,
    pub background_threads: usize,
    pub progress_channel_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        // `available_parallelism()` can report the host CPU count even when
        // the process is constrained by cgroups. Keep defaults conservative;
        // callers that want full-core utilization pass an explicit config.
        Self {
            compute_threads: available.saturating_sub(1).clamp(1, 4),
            background_threads: available.clamp(1, 2),
            progress_channel_capacity: 256,
        }
    }
}

/// Owns the worker pools the engine runs on: a compute pool for interactive
/// work (completion), a background pool for lint passes, and a single-thread
/// tokio runtime that drives debounce timers.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    compute_pool: WorkerPool,
    background_pool: WorkerPool,
    timer_runtime: Option<Runtime>,
    timer_handle: tokio::runtime::Handle,
    progress: ProgressSender,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let compute_pool = build_worker_pool("kopi-compute", config.compute_threads);
        let background_pool = build_worker_pool("kopi-background", config.background_threads);
        let timer_runtime = build_timer_runtime();
        let timer_handle = timer_runtime.handle().clone();

        let (progress_tx, _) = broadcast::channel(config.progress_channel_capacity.max(1));

        Self {
            inner: Arc::new(SchedulerInner {
                compute_pool,
                background_pool,
                timer_runtime: Some(timer_runtime),
                timer_handle,
                progress: ProgressSender::new(progress_tx),
            }),
        }
    }

    pub fn progress(&self) -> ProgressSender {
        self.inner.progress.clone()
    }

    pub fn subscribe_progress(&self) -> crate::ProgressReceiver {
        self.inner.progress.subscribe()
    }

    pub(crate) fn timer_handle(&self) -> tokio::runtime::Handle {
        self.inner.timer_handle.clone()
    }

    pub fn spawn_blocking_on<T, F>(
        &self,
        pool: PoolKind,
        token: CancellationToken,
        f: F,
    ) -> BlockingTask<T>
    where
        T: Send + 'static,
        F: FnOnce(CancellationToken) -> Result<T, Cancelled> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        if token.is_cancelled() {
            let _ = tx.send(Err(TaskError::Cancelled));
            return BlockingTask::new(token, rx);
        }

        let token_for_job = token.clone();
        let job = move || {
            let result =
                match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(token_for_job))) {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(err)) => Err(TaskError::from(err)),
                    Err(panic) => {
                        let message = panic_payload_to_str(&*panic);
                        tracing::error!(
                            target: "kopi.scheduler",
                            pool = ?pool,
                            panic = %message,
                            "task panicked"
                        );
                        Err(TaskError::Panicked)
                    }
                };
            let _ = tx.send(result);
        };

        match pool {
            PoolKind::Compute => self.inner.compute_pool.spawn(job),
            PoolKind::Background => self.inner.background_pool.spawn(job),
        }

        BlockingTask::new(token, rx)
    }

    pub fn spawn_compute<T, F>(&self, f: F) -> BlockingTask<T>
    where
        T: Send + 'static,
        F: FnOnce(CancellationToken) -> Result<T, Cancelled> + Send + 'static,
    {
        self.spawn_blocking_on(PoolKind::Compute, CancellationToken::new(), f)
    }

    pub fn spawn_background<T, F>(&self, f: F) -> BlockingTask<T>
    where
        T: Send + 'static,
        F: FnOnce(CancellationToken) -> Result<T, Cancelled> + Send + 'static,
    {
        self.spawn_blocking_on(PoolKind::Background, CancellationToken::new(), f)
    }

    pub fn default_lint_delay() -> Duration {
        Duration::from_millis(500)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl Drop for SchedulerInner {
    fn drop(&mut self) {
        if let Some(runtime) = self.timer_runtime.take() {
            runtime.shutdown_background();
        }
    }
}
