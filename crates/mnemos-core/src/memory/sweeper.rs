//! Background sweep of expired short-term entries.
//!
//! Reads already hide expired entries, so the sweep only reclaims storage.
//! Each sweep is independent; a failed one is logged and the next tick
//! proceeds. No lock is held between ticks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use super::traits::ShortTermStore;

/// Handle to a running sweep task.
pub struct ExpirySweeper {
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ExpirySweeper {
    /// Spawn a task sweeping `store` every `every`, first sweep after one
    /// period. Must be called within a tokio runtime.
    pub fn start(store: Arc<dyn ShortTermStore>, every: Duration) -> Self {
        let (tx, mut rx) = mpsc::channel::<()>(1);

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = ticker.tick() => {
                        match store.cleanup_expired().await {
                            Ok(0) => {}
                            Ok(removed) => debug!(removed = removed, "Swept expired short-term entries"),
                            Err(e) => error!(error = %e, "Short-term sweep failed"),
                        }
                    }
                }
            }
            debug!("Expiry sweeper stopped");
        });

        info!(interval_secs = every.as_secs_f64(), "Started expiry sweeper");
        Self {
            shutdown_tx: Some(tx),
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the task and wait for it to exit. Idempotent.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "Expiry sweeper task failed");
            }
        }
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
