//! Execution substrate for Kopi: worker pools, cooperative cancellation,
//! cancellable task handles, the single-in-flight executor, and the
//! restartable debounce timer.

mod cancel;
mod debouncer;
mod executor;
mod progress;
mod scheduler;
mod task;

pub use cancel::{CancellationToken, Cancelled, TaskError};
pub use debouncer::{DebouncedHandle, Debouncer};
pub use executor::AsyncExecutor;
pub use progress::{OperationId, ProgressEvent, ProgressGuard, ProgressReceiver, ProgressSender};
pub use scheduler::{PoolKind, Scheduler, SchedulerConfig};
pub use task::BlockingTask;
