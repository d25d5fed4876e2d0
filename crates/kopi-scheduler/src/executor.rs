use parking_lot::Mutex;

use crate::{BlockingTask, CancellationToken, Cancelled, PoolKind, Scheduler};

/// Serializes a class of computations down to a single logical task in
/// flight.
///
/// Submitting new work cancels the token of whatever was in flight before the
/// new task is spawned, so a superseded computation can never publish its
/// result: its handle resolves to `Cancelled` when joined and is otherwise
/// safely abandoned.
pub struct AsyncExecutor {
    scheduler: Scheduler,
    pool: PoolKind,
    in_flight: Mutex<Option<CancellationToken>>,
}

impl AsyncExecutor {
    pub fn new(scheduler: Scheduler, pool: PoolKind) -> Self {
        Self {
            scheduler,
            pool,
            in_flight: Mutex::new(None),
        }
    }

    pub fn compute<T, F>(&self, f: F) -> BlockingTask<T>
    where
        T: Send + 'static,
        F: FnOnce(CancellationToken) -> Result<T, Cancelled> + Send + 'static,
    {
        let token = CancellationToken::new();
        if let Some(previous) = self.in_flight.lock().replace(token.clone()) {
            previous.cancel();
        }
        self.scheduler.spawn_blocking_on(self.pool, token, f)
    }

    /// Cancel the in-flight computation without starting a new one.
    pub fn cancel_in_flight(&self) -> bool {
        match self.in_flight.lock().take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cancelled, TaskError};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread")]
    async fn superseded_computation_is_cancelled() {
        let executor = AsyncExecutor::new(Scheduler::default(), PoolKind::Compute);

        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let first = executor.compute(move |token| {
            started_tx.send(()).unwrap();
            while !token.is_cancelled() {
                std::thread::sleep(Duration::from_millis(1));
            }
            Cancelled::check(&token)?;
            Ok(1)
        });
        started_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("first task never started");

        let second = executor.compute(|_token| Ok(2));

        assert_eq!(second.join().await, Ok(2));
        assert_eq!(first.join().await, Err(TaskError::Cancelled));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancel_in_flight_suppresses_result() {
        let executor = AsyncExecutor::new(Scheduler::default(), PoolKind::Compute);

        let task = executor.compute(|token| {
            while !token.is_cancelled() {
                std::thread::sleep(Duration::from_millis(1));
            }
            Cancelled::check(&token)?;
            Ok(())
        });
        assert!(executor.cancel_in_flight());
        assert!(!executor.cancel_in_flight());
        assert_eq!(task.join().await, Err(TaskError::Cancelled));
    }
}
