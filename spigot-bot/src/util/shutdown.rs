//! Shutdown signal handling.
//!
//! [`Shutdown`] listens for SIGTERM and SIGINT (Ctrl+C on Windows) on a
//! background task and cancels a [`CancellationToken`] when one arrives. The
//! HTTP server and the prune loop each hold a clone of the token.

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Cancels a token on the first shutdown signal.
#[allow(missing_debug_implementations)]
pub struct Shutdown {
    tracker: TaskTracker,
    token: CancellationToken,
}

impl Shutdown {
    /// Installs the signal handlers.
    ///
    /// # Errors
    ///
    /// Returns an [`std::io::Error`] if signal registration fails.
    #[allow(clippy::unnecessary_wraps)]
    pub fn install() -> Result<Self, std::io::Error> {
        let token = CancellationToken::new();
        let trigger = token.clone();
        let tracker = TaskTracker::new();

        #[cfg(unix)]
        {
            let mut sigterm = signal(SignalKind::terminate())?;
            let mut sigint = signal(SignalKind::interrupt())?;
            tracker.spawn(async move {
                tokio::select! {
                    _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down..."),
                    _ = sigint.recv() => tracing::info!("Received SIGINT, shutting down..."),
                    () = trigger.cancelled() => return,
                }
                trigger.cancel();
            });
        }

        #[cfg(windows)]
        {
            tracker.spawn(async move {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => tracing::info!("Received Ctrl-C, shutting down..."),
                    () = trigger.cancelled() => return,
                }
                trigger.cancel();
            });
        }

        tracker.close();
        Ok(Self { tracker, token })
    }

    /// A token cancelled when shutdown begins.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Starts shutdown without a signal, e.g. after a fatal server error.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Waits until shutdown has begun and the listener task has exited.
    pub async fn wait(&self) {
        self.token.cancelled().await;
        self.tracker.wait().await;
    }
}
