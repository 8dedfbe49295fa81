use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::info;

use super::turns::TurnDriver;

/// Shared last-activity timestamp
///
/// Touched by every forwarded utterance and generated turn; read by the
/// liveness monitor. Stored as milliseconds since the clock was created so
/// updates are a single atomic store.
#[derive(Clone)]
pub struct ActivityClock {
    origin: Instant,
    last_ms: Arc<AtomicU64>,
}

impl ActivityClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Record activity now
    pub fn touch(&self) {
        let elapsed = self.origin.elapsed().as_millis() as u64;
        self.last_ms.store(elapsed, Ordering::SeqCst);
    }

    /// How long since the last recorded activity
    pub fn idle_for(&self) -> Duration {
        let now = self.origin.elapsed().as_millis() as u64;
        let last = self.last_ms.load(Ordering::SeqCst);
        Duration::from_millis(now.saturating_sub(last))
    }
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Periodic idle check that nudges a silent candidate
///
/// Best-effort liveness only: on each breach of the idle timeout it asks the
/// turn driver for a re-engagement turn. It never cancels or aborts
/// anything; consecutive timeouts simply re-prompt again.
pub struct LivenessMonitor;

impl LivenessMonitor {
    pub fn spawn(
        driver: Arc<Mutex<TurnDriver>>,
        activity: ActivityClock,
        check_interval: Duration,
        idle_timeout: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "Liveness monitor started (check every {:?}, timeout {:?})",
                check_interval, idle_timeout
            );

            if *shutdown.borrow() {
                return;
            }

            let mut ticker = tokio::time::interval(check_interval);
            // The first tick fires immediately; skip it
            ticker.tick().await;

            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let idle = activity.idle_for();
                        if idle >= idle_timeout {
                            info!("No activity for {:?}; re-engaging candidate", idle);
                            // The generated turn touches the clock through
                            // the driver's observers
                            driver.lock().await.reengagement_turn().await;
                        }
                    }
                }
            }

            info!("Liveness monitor stopped");
        })
    }
}
