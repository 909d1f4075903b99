//! Supervised fire-and-forget tasks
//!
//! Each task body returns a `Result`. A watcher awaits the task and logs an
//! error or a panic instead of letting it reach the caller.

use std::fmt::Display;
use std::future::Future;

use tokio::task::JoinHandle;

/// Spawn `body` and a watcher that reports its failure.
///
/// The returned handle resolves once the failure (if any) has been logged.
pub fn spawn_supervised<F, E>(label: &'static str, body: F) -> JoinHandle<()>
where
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let task = tokio::spawn(body);
    tokio::spawn(async move {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(task = label, "task failed: {}", e),
            Err(e) if e.is_panic() => tracing::error!(task = label, "task panicked: {}", e),
            Err(e) => tracing::warn!(task = label, "task cancelled: {}", e),
        }
    })
}
