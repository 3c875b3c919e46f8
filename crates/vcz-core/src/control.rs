//! Run control: one shared cancellation token for the whole batch.
//!
//! Every long-running call (admission, child process output, segment loop)
//! receives a clone of the same token. Cancelling it stops admission and
//! kills running encoders; jobs report `Cancelled` rather than `Failed`.

use tokio_util::sync::CancellationToken;

/// Shared stop switch for a batch run.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    token: CancellationToken,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token to thread into scheduler and runner calls.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Request a stop. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the run on the first Ctrl-C (or SIGTERM on Unix).
    ///
    /// `on_signal` runs once, before the token is cancelled, so the caller can
    /// tell the user that in-flight work is being stopped.
    pub fn cancel_on_signal<F>(&self, on_signal: F) -> tokio::task::JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = wait_for_signal() => {
                    tracing::info!("interrupt received, cancelling run");
                    on_signal();
                    token.cancel();
                }
                _ = token.cancelled() => {}
            }
        })
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!("could not install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
