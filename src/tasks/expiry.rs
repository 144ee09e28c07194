//! TTL Expiry Task
//!
//! One-shot background task that waits out a TTL and then runs an expiry action.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::trace;

/// Spawns a task that sleeps for `ttl` and then runs `on_expire`.
///
/// Aborting the returned handle before the TTL elapses cancels the expiry;
/// this is how a cache resets or drops the TTL of an entry.
///
/// # Arguments
/// * `ttl` - Delay before the action runs
/// * `on_expire` - Action producing the future to run on expiry
///
/// # Example
/// ```ignore
/// let handle = spawn_expiry_timer(Duration::from_secs(30), move || async move {
///     cache.remove("queue", "42").await.ok();
/// });
/// // Entry touched again: cancel and re-arm
/// handle.abort();
/// ```
pub fn spawn_expiry_timer<F, Fut>(ttl: Duration, on_expire: F) -> JoinHandle<()>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(ttl).await;
        trace!(ttl_ms = duration_millis(ttl), "Expiry timer fired");
        on_expire().await;
    })
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_timer_runs_action_after_ttl() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        let handle = spawn_expiry_timer(Duration::from_millis(50), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(fired.load(Ordering::SeqCst), 0, "Action should not run early");

        handle.await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timer_can_be_aborted() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        let handle = spawn_expiry_timer(Duration::from_millis(50), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        // Abort immediately
        handle.abort();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
        assert_eq!(fired.load(Ordering::SeqCst), 0, "Aborted timer must not fire");
    }

    #[test]
    fn test_duration_millis_saturates() {
        assert_eq!(duration_millis(Duration::from_millis(1500)), 1500);
        assert_eq!(duration_millis(Duration::MAX), u64::MAX);
    }
}
