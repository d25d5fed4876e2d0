use tokio::sync::oneshot;

use crate::{CancellationToken, TaskError};

/// Handle to work running on one of the scheduler's blocking pools.
///
/// Dropping the handle abandons the task: the work keeps running (or is never
/// observed), but its result goes nowhere. Cancelling the handle makes
/// `join` resolve to [`TaskError::Cancelled`] even if the work later
/// completes.
pub struct BlockingTask<T> {
    token: CancellationToken,
    rx: oneshot::Receiver<Result<T, TaskError>>,
}

impl<T> BlockingTask<T> {
    pub(crate) fn new(
        token: CancellationToken,
        rx: oneshot::Receiver<Result<T, TaskError>>,
    ) -> Self {
        Self { token, rx }
    }

    /// An already-completed task, used for fail-fast paths that never reach a
    /// worker pool.
    pub fn ready(value: T) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Ok(value));
        Self {
            token: CancellationToken::new(),
            rx,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub async fn join(self) -> Result<T, TaskError> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(TaskError::Cancelled),
            result = self.rx => match result {
                Ok(result) => result,
                Err(_) => Err(TaskError::Panicked),
            }
        }
    }
}
