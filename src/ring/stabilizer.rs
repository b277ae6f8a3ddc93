use crate::ring::manager::RingManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Level, Span};

/// Stabilizer drives periodic stabilization rounds from a background tokio
/// task, one [`RingManager::tick`] per period. Cancellation stops the loop
/// without touching the ring, so a manager can be driven manually again
/// afterwards.
pub struct Stabilizer {
    handle: JoinHandle<()>,
    token: CancellationToken,
}

impl Stabilizer {
    /// Spawns the periodic driver. Must be called from within a tokio
    /// runtime.
    pub fn spawn(manager: Arc<RingManager>, period: Duration) -> Stabilizer {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let span = tracing::span!(Level::INFO, "stabilizer");
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => {
                        span.in_scope(|| tracing::debug!("stabilizer cancelled"));
                        break;
                    }
                    _ = interval.tick() => {
                        span.in_scope(|| manager.tick());
                    }
                }
            }
        });
        Stabilizer { handle, token }
    }

    /// Requests cancellation and waits for the driver task to finish.
    pub async fn shutdown(self) {
        self.token.cancel();
        let _ = self.handle.await;
    }
}
