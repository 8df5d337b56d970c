use crate::application_port::AuthService;
use crate::server::RateLimiter;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Periodic housekeeping: expired revocations and idle rate windows.
pub struct Maintenance {
    auth_service: Arc<dyn AuthService>,
    rate_limiter: Arc<RateLimiter>,
    interval: Duration,
    cancellation_token: CancellationToken,
}

impl Maintenance {
    pub fn new(
        auth_service: Arc<dyn AuthService>,
        rate_limiter: Arc<RateLimiter>,
        interval: Duration,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            auth_service,
            rate_limiter,
            interval,
            cancellation_token,
        }
    }

    pub async fn tick_once(&self) {
        match self.auth_service.sweep_revocations().await {
            Ok(0) => {}
            Ok(n) => tracing::info!(removed = n, "expired revocations swept"),
            // retried on the next tick
            Err(e) => tracing::warn!("revocation sweep failed: {e}"),
        }

        let evicted = self.rate_limiter.evict_idle();
        if evicted > 0 {
            tracing::debug!(evicted, "idle rate windows evicted");
        }
    }

    pub async fn run(&self) {
        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + self.interval, self.interval);
        loop {
            tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    tracing::info!("Maintenance shutting down...");
                    break;
                }
                _ = ticker.tick() => self.tick_once().await,
            }
        }
    }
}
