//! Background task that samples the frame-rate monitor on a fixed cadence.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::PerformanceMonitor;

/// Handle to the running sampler. Stopping it leaves no periodic work behind.
pub struct FrameSampler {
    handle: JoinHandle<()>,
    shutdown: CancellationToken,
}

impl FrameSampler {
    pub fn spawn(
        monitor: Arc<PerformanceMonitor>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        let token = shutdown.clone();
        let handle = tokio::spawn(async move {
            info!("Frame sampler started ({:?} cadence)", interval);

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        info!("Frame sampler shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Some(fps) = monitor.sample() {
                            debug!("Frame sampler tick: {} fps", fps);
                        }
                    }
                }
            }
        });

        Self { handle, shutdown }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancel the sampler and wait for its task to exit
    pub async fn stop(self) {
        self.shutdown.cancel();
        let _ = self.handle.await;
    }
}
