use crate::domain_model::UserId;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_CAPACITY: usize = 100;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

const EXEMPT_PATHS: [&str; 4] = ["/health", "/docs", "/redoc", "/openapi.json"];

#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
#[error("rate limit exceeded, retry after {retry_after_secs}s")]
pub struct RateLimitExceeded {
    pub retry_after_secs: u64,
}

/// Identity a request is counted against.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RateKey {
    User(UserId),
    Ip(Option<IpAddr>),
}

impl fmt::Display for RateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateKey::User(id) => write!(f, "user:{id}"),
            RateKey::Ip(Some(ip)) => write!(f, "ip:{ip}"),
            RateKey::Ip(None) => f.write_str("ip:unknown"),
        }
    }
}

/// Sliding-window limiter: at most `capacity` admissions per key in any trailing `window`.
pub struct RateLimiter {
    windows: DashMap<String, VecDeque<Instant>>,
    capacity: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            capacity,
            window,
        }
    }

    pub fn is_exempt(path: &str) -> bool {
        EXEMPT_PATHS.contains(&path)
    }

    pub fn check(&self, key: &str) -> Result<(), RateLimitExceeded> {
        let now = Instant::now();
        // the shard stays write-locked until `window` drops
        let mut window = self.windows.entry(key.to_owned()).or_default();

        while let Some(&oldest) = window.front() {
            if now.duration_since(oldest) >= self.window {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() >= self.capacity {
            let oldest = window.front().copied().unwrap_or(now);
            let remaining = self.window.saturating_sub(now.duration_since(oldest));
            let retry_after_secs = (remaining.as_secs_f64().ceil() as u64).max(1);
            return Err(RateLimitExceeded { retry_after_secs });
        }

        window.push_back(now);
        Ok(())
    }

    /// Drops keys whose newest admission has aged out of the window.
    pub fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows.retain(|_, window| {
            window
                .back()
                .is_some_and(|&last| now.duration_since(last) < self.window)
        });
        before.saturating_sub(self.windows.len())
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn rejects_past_capacity_and_recovers() {
        let limiter = RateLimiter::new(3, DEFAULT_WINDOW);
        for _ in 0..3 {
            assert!(limiter.check("user:1").is_ok());
        }
        assert_eq!(
            limiter.check("user:1"),
            Err(RateLimitExceeded {
                retry_after_secs: 60
            })
        );

        tokio::time::advance(Duration::from_millis(30_500)).await;
        assert_eq!(
            limiter.check("user:1"),
            Err(RateLimitExceeded {
                retry_after_secs: 30
            })
        );

        tokio::time::advance(Duration::from_millis(29_500)).await;
        assert!(limiter.check("user:1").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_is_at_least_one_second() {
        let limiter = RateLimiter::new(1, DEFAULT_WINDOW);
        limiter.check("ip:10.0.0.1").unwrap();
        tokio::time::advance(DEFAULT_WINDOW - Duration::from_millis(1)).await;
        assert_eq!(
            limiter.check("ip:10.0.0.1"),
            Err(RateLimitExceeded {
                retry_after_secs: 1
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent() {
        let limiter = RateLimiter::new(1, DEFAULT_WINDOW);
        assert!(limiter.check("user:1").is_ok());
        assert!(limiter.check("user:1").is_err());
        assert!(limiter.check("user:2").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn evicts_only_stale_windows() {
        let limiter = RateLimiter::new(5, DEFAULT_WINDOW);
        limiter.check("stale").unwrap();
        tokio::time::advance(Duration::from_secs(45)).await;
        limiter.check("fresh").unwrap();
        tokio::time::advance(Duration::from_secs(20)).await;

        assert_eq!(limiter.evict_idle(), 1);
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_checks_never_overshoot() {
        let limiter = Arc::new(RateLimiter::new(100, DEFAULT_WINDOW));
        let tasks: Vec<_> = (0..250)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.check("user:9").is_ok() })
            })
            .collect();

        let mut admitted = 0;
        for task in tasks {
            if task.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 100);
    }

    #[test]
    fn key_format_and_exemptions() {
        assert_eq!(RateKey::User(UserId(5)).to_string(), "user:5");
        assert_eq!(
            RateKey::Ip(Some("127.0.0.1".parse().unwrap())).to_string(),
            "ip:127.0.0.1"
        );
        assert_eq!(RateKey::Ip(None).to_string(), "ip:unknown");
        assert!(RateLimiter::is_exempt("/health"));
        assert!(RateLimiter::is_exempt("/openapi.json"));
        assert!(!RateLimiter::is_exempt("/api/v1/users"));
    }
}
