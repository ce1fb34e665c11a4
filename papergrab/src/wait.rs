//! The bounded-wait primitive: poll a probe at a fixed interval until it
//! yields, the attempt cap is exhausted, or the run is aborted.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Polling policy for a bounded wait.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WaitConfig {
    /// Delay between consecutive probes
    pub poll_interval: Duration,
    /// Maximum number of probes before giving up
    pub max_attempts: u32,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            max_attempts: 30,
        }
    }
}

impl WaitConfig {
    /// Upper bound on the time a single wait can take
    pub fn ceiling(&self) -> Duration {
        self.poll_interval * self.max_attempts
    }
}

/// Cooperative abort signal, checked at loop heads and at every poll tick.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    aborted: Arc<AtomicBool>,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the current run to stop at its next check point.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Relaxed)
    }
}

/// How a bounded wait ended. Timing out is a normal outcome, not an error.
#[derive(Debug)]
pub enum WaitOutcome<T> {
    /// The probe yielded a value on the `attempts`-th poll
    Found { value: T, attempts: u32 },
    /// The attempt cap was exhausted without the probe yielding
    TimedOut { attempts: u32 },
    /// The abort handle fired before the probe yielded
    Aborted { attempts: u32 },
}

impl<T> WaitOutcome<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            WaitOutcome::Found { attempts, .. }
            | WaitOutcome::TimedOut { attempts }
            | WaitOutcome::Aborted { attempts } => *attempts,
        }
    }
}

/// Poll `probe` every `config.poll_interval` until it yields `Some`, up to
/// `config.max_attempts` times.
///
/// The first probe runs after one full interval, matching an interval timer
/// that fires only after its initial delay. Exactly one outcome is produced
/// and no polling survives the call: the loop owns its timer, so returning
/// is cancellation.
pub async fn await_condition<T, F, Fut>(
    config: &WaitConfig,
    abort: &AbortHandle,
    mut probe: F,
) -> WaitOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for attempt in 1..=config.max_attempts {
        if abort.is_aborted() {
            return WaitOutcome::Aborted {
                attempts: attempt - 1,
            };
        }
        tokio::time::sleep(config.poll_interval).await;
        if abort.is_aborted() {
            return WaitOutcome::Aborted {
                attempts: attempt - 1,
            };
        }
        if let Some(value) = probe().await {
            return WaitOutcome::Found {
                value,
                attempts: attempt,
            };
        }
    }
    WaitOutcome::TimedOut {
        attempts: config.max_attempts,
    }
}
