//! Deadline combinator for engine operations
//!
//! The operation runs as its own task. When the deadline passes first the
//! caller gets [`Error::Timeout`] and the task keeps running detached; its
//! eventual result is discarded.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};

/// Await `operation` for at most `duration`
pub async fn with_timeout<F, T>(duration: Duration, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let task = tokio::spawn(operation);

    match tokio::time::timeout(duration, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) if join_err.is_panic() => std::panic::resume_unwind(join_err.into_panic()),
        Ok(Err(_)) => Err(Error::ChannelClosed),
        Err(_) => {
            debug!("Operation exceeded {:?}, leaving it to finish in the background", duration);
            Err(Error::Timeout(duration))
        }
    }
}

/// Method form of [`with_timeout`]
pub trait WithTimeout<T>: Future<Output = Result<T>> + Send + Sized + 'static
where
    T: Send + 'static,
{
    fn with_timeout(self, duration: Duration) -> impl Future<Output = Result<T>> + Send {
        with_timeout(duration, self)
    }
}

impl<F, T> WithTimeout<T> for F
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
}
