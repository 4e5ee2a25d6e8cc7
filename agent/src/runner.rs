//! Periodic actor loop with shutdown and backoff.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use synth_utils::format_std_duration;
use tracing::{error, info, warn};

use crate::metrics::BotMetrics;
use crate::shutdown::ShutdownReceiver;
use crate::AgentError;

/// Something stepped periodically by [`run_actor`].
#[async_trait]
pub trait Actor: Send {
    fn name(&self) -> &'static str;

    /// One pass over everything the actor is responsible for.
    async fn step(&mut self) -> Result<(), AgentError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunSettings {
    pub interval: Duration,
    pub max_backoff: Duration,
}

impl RunSettings {
    pub fn new(interval: Duration, max_backoff: Duration) -> Self {
        Self {
            interval,
            max_backoff: max_backoff.max(interval),
        }
    }

    /// Delay before the next step after `failures` transient errors in a row.
    pub fn delay(&self, failures: u32) -> Duration {
        let factor = 1u32.checked_shl(failures.min(16)).unwrap_or(u32::MAX);
        self.interval
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// Step `actor` until shutdown. A step in progress is finished first.
pub async fn run_actor<A: Actor>(
    mut actor: A,
    settings: RunSettings,
    metrics: Arc<BotMetrics>,
    mut shutdown: ShutdownReceiver,
) {
    let name = actor.name();
    info!(actor = name, interval = %format_std_duration(settings.interval), "actor started");
    let mut failures = 0u32;
    loop {
        tokio::select! {
            reason = shutdown.recv() => {
                match reason {
                    Ok(reason) => info!(actor = name, %reason, "actor stopped"),
                    Err(_) => info!(actor = name, "shutdown channel closed, actor stopped"),
                }
                break;
            }
            _ = tokio::time::sleep(settings.delay(failures)) => {}
        }

        metrics.steps.with_label_values(&[name]).inc();
        match actor.step().await {
            Ok(()) => failures = 0,
            Err(e) => {
                metrics.step_errors.with_label_values(&[name]).inc();
                if e.is_transient() {
                    failures = failures.saturating_add(1);
                    warn!(
                        actor = name,
                        error = %e,
                        retry_in = %format_std_duration(settings.delay(failures)),
                        "transient failure, backing off"
                    );
                } else {
                    failures = 0;
                    error!(actor = name, error = %e, "step failed");
                }
            }
        }
    }
}
