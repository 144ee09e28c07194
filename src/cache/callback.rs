//! Completion handler adapter
//!
//! Lets callers that prefer a trailing handler drive the async cache API.

use std::future::Future;

use tokio::task::JoinHandle;

use crate::error::Result;

/// Runs `operation` on the tokio runtime and hands its result to `handler`.
///
/// The handler runs exactly once, with either the value or the error. The
/// returned handle completes after the handler has returned.
pub fn spawn_with_handler<T, Fut, F>(operation: Fut, handler: F) -> JoinHandle<()>
where
    T: Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
    F: FnOnce(Result<T>) + Send + 'static,
{
    tokio::spawn(async move {
        handler(operation.await);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_handler_receives_value() {
        let (tx, rx) = oneshot::channel();

        spawn_with_handler(async { Ok(42) }, move |result| {
            let _ = tx.send(result.unwrap());
        })
        .await
        .unwrap();

        assert_eq!(rx.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_handler_receives_error() {
        let (tx, rx) = oneshot::channel();

        spawn_with_handler(
            async { Err::<(), _>(CacheError::Configuration("broken".to_string())) },
            move |result| {
                let _ = tx.send(result.is_err());
            },
        )
        .await
        .unwrap();

        assert!(rx.await.unwrap());
    }
}
