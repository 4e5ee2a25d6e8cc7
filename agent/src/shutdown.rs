//! Stopping the agent and challenger loops.
//!
//! Each actor holds a [`ShutdownReceiver`] and checks it between steps, so a
//! minting or redemption step that already started runs to completion and
//! its record is saved before the process exits.

use std::fmt;

use tokio::signal;
use tokio::sync::broadcast;

pub type ShutdownReceiver = broadcast::Receiver<ShutdownReason>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownReason {
    Interrupt,
    Terminate,
    /// Asked for in code, e.g. by a test or a fatal startup failure.
    Requested,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
            Self::Requested => "requested",
        })
    }
}

pub struct ShutdownController {
    tx: broadcast::Sender<ShutdownReason>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> ShutdownReceiver {
        self.tx.subscribe()
    }

    /// Number of actors still listening.
    pub fn listeners(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn shutdown(&self, reason: ShutdownReason) {
        // No receivers left means every actor already stopped.
        let _ = self.tx.send(reason);
    }

    /// Block until SIGINT or SIGTERM, stop every actor and return which one
    /// arrived.
    pub async fn wait_for_signal(&self) -> ShutdownReason {
        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "SIGTERM handler unavailable, only SIGINT stops the bot");
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        let reason = tokio::select! {
            result = signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "SIGINT listener failed");
                }
                ShutdownReason::Interrupt
            }
            _ = terminate => ShutdownReason::Terminate,
        };
        tracing::info!(%reason, actors = self.listeners(), "stopping actors");
        self.shutdown(reason);
        reason
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_actor_sees_the_reason() {
        let controller = ShutdownController::new();
        let mut agent = controller.subscribe();
        let mut challenger = controller.subscribe();
        assert_eq!(controller.listeners(), 2);

        controller.shutdown(ShutdownReason::Requested);
        assert_eq!(agent.recv().await.unwrap(), ShutdownReason::Requested);
        assert_eq!(challenger.recv().await.unwrap(), ShutdownReason::Requested);
    }

    #[test]
    fn test_shutdown_without_actors_is_quiet() {
        let controller = ShutdownController::new();
        controller.shutdown(ShutdownReason::Terminate);
        assert_eq!(controller.listeners(), 0);
    }
}
