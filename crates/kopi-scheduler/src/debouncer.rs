use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::Mutex;

use crate::{CancellationToken, Cancelled, PoolKind, Scheduler};

struct PendingRun {
    id: u64,
    token: CancellationToken,
    /// Set once the quiet period has elapsed and the run has been handed to a
    /// worker pool. A fired run is no longer superseded by `arm`; it must
    /// consult its own cancellation token before publishing.
    fired: Arc<AtomicBool>,
    timer: tokio::task::JoinHandle<()>,
}

struct DebouncerInner {
    scheduler: Scheduler,
    pool: PoolKind,
    delay: Duration,
    next_id: AtomicU64,
    pending: Mutex<Option<PendingRun>>,
}

/// Restartable deadline: arming resets the delay and supersedes whatever was
/// still waiting, so a burst of triggers collapses into one execution.
#[derive(Clone)]
pub struct Debouncer {
    inner: Arc<DebouncerInner>,
}

pub struct DebouncedHandle {
    token: CancellationToken,
}

impl DebouncedHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Debouncer {
    pub fn new(scheduler: Scheduler, pool: PoolKind, delay: Duration) -> Self {
        Self {
            inner: Arc::new(DebouncerInner {
                scheduler,
                pool,
                delay,
                next_id: AtomicU64::new(1),
                pending: Mutex::new(None),
            }),
        }
    }

    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    /// Arm (or re-arm) the delayed execution. A pending run that has not
    /// fired yet is cancelled and superseded; a run that is already executing
    /// is left to finish on its own token.
    pub fn schedule<F>(&self, f: F) -> DebouncedHandle
    where
        F: FnOnce(CancellationToken) -> Result<(), Cancelled> + Send + 'static,
    {
        self.arm(self.inner.delay, f)
    }

    /// Cancel any pending delayed execution and run the task now.
    pub fn submit_immediately<F>(&self, f: F) -> DebouncedHandle
    where
        F: FnOnce(CancellationToken) -> Result<(), Cancelled> + Send + 'static,
    {
        self.arm(Duration::ZERO, f)
    }

    fn arm<F>(&self, delay: Duration, f: F) -> DebouncedHandle
    where
        F: FnOnce(CancellationToken) -> Result<(), Cancelled> + Send + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let fired = Arc::new(AtomicBool::new(false));

        if let Some(previous) = self.inner.pending.lock().take() {
            if !previous.fired.load(Ordering::SeqCst) {
                previous.token.cancel();
                previous.timer.abort();
            }
        }

        let inner = Arc::clone(&self.inner);
        let token_for_run = token.clone();
        let fired_for_run = Arc::clone(&fired);
        let mut f = Some(f);

        let timer = self.inner.scheduler.timer_handle().spawn(async move {
            tokio::select! {
                _ = token_for_run.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    fired_for_run.store(true, Ordering::SeqCst);
                    if let Some(f) = f.take() {
                        let task = inner
                            .scheduler
                            .spawn_blocking_on(inner.pool, token_for_run.clone(), f);
                        let _ = task.join().await;
                    }
                }
            }

            let mut pending = inner.pending.lock();
            if pending.as_ref().is_some_and(|run| run.id == id) {
                *pending = None;
            }
        });

        *self.inner.pending.lock() = Some(PendingRun {
            id,
            token: token.clone(),
            fired,
            timer,
        });

        DebouncedHandle { token }
    }

    /// Cancel the pending delayed execution, if any.
    pub fn cancel(&self) -> bool {
        let Some(run) = self.inner.pending.lock().take() else {
            return false;
        };
        run.token.cancel();
        run.timer.abort();
        true
    }
}
