//! Periodic sweep of in-process state
//!
//! Presence entries, rate windows and revocation entries all expire lazily on
//! lookup; the sweeper bounds memory for keys that are never looked up again.

use crate::services::streaming::PresenceCache;
use actix_middleware::SlidingWindowLimiter;
use jwt_security::TokenService;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Entries removed by one sweep
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub presence: usize,
    pub rate_windows: usize,
    pub revocations: usize,
}

#[derive(Clone)]
pub struct Sweeper {
    presence: Arc<PresenceCache>,
    limiter: Arc<SlidingWindowLimiter>,
    tokens: Arc<TokenService>,
}

impl Sweeper {
    pub fn new(
        presence: Arc<PresenceCache>,
        limiter: Arc<SlidingWindowLimiter>,
        tokens: Arc<TokenService>,
    ) -> Self {
        Self {
            presence,
            limiter,
            tokens,
        }
    }

    pub fn sweep_once(&self) -> SweepReport {
        let report = SweepReport {
            presence: self.presence.sweep(),
            rate_windows: self.limiter.sweep(),
            revocations: self.tokens.sweep_revocations(),
        };
        debug!(?report, "Maintenance sweep finished");
        report
    }

    /// Run `sweep_once` every `every` until the handle is shut down.
    pub fn spawn(self, every: Duration) -> MaintenanceHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(());

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            // The first tick completes immediately
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = interval.tick() => {
                        self.sweep_once();
                    }
                }
            }
            info!("Maintenance sweeper stopped");
        });

        MaintenanceHandle {
            shutdown_tx,
            handle,
        }
    }
}

pub struct MaintenanceHandle {
    shutdown_tx: watch::Sender<()>,
    handle: JoinHandle<()>,
}

impl MaintenanceHandle {
    /// Stop the sweeper and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.handle.await;
    }
}
