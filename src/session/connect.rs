//! Connection establishment with bounded retry
//!
//! The server is often still booting when a run starts (or right after a
//! reset), so connection failures are retried at a fixed interval.

use std::time::Duration;

use crate::common::{Error, Result};

use super::{Connector, ServerTarget, Session};

/// How many times to try, and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, interval: Duration) -> Self {
        Self {
            max_retries,
            interval,
        }
    }
}

/// Open a session, retrying up to `policy.max_retries` consecutive times
///
/// The failure count is local to this call. Exhausting it is fatal for the
/// whole run and reported as [`Error::ConnectionExhausted`].
pub async fn connect_with_retry(
    connector: &dyn Connector,
    target: &ServerTarget,
    policy: &RetryPolicy,
) -> Result<Box<dyn Session>> {
    tracing::info!("Attempting to connect to host at {} on port {}", target.host, target.port);

    let mut failures = 0;
    while failures < policy.max_retries {
        match connector.connect(target).await {
            Ok(session) => {
                tracing::info!("Connected to script server at {}", target);
                return Ok(session);
            }
            Err(e) => {
                failures += 1;
                tracing::warn!(
                    "Failed to connect to script server (attempt {}/{}): {}. Waiting to try again",
                    failures,
                    policy.max_retries,
                    e
                );
                tokio::time::sleep(policy.interval).await;
            }
        }
    }

    Err(Error::ConnectionExhausted {
        host: target.host.clone(),
        port: target.port,
        attempts: policy.max_retries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::SubmitError;
    use crate::session::SessionKind;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct NullSession;

    #[async_trait]
    impl Session for NullSession {
        async fn run(&mut self, _code: &str) -> std::result::Result<(), SubmitError> {
            Ok(())
        }
    }

    /// Fails the first `failures` attempts, then succeeds
    struct FlakyConnector {
        failures: u32,
        attempts: AtomicU32,
    }

    impl FlakyConnector {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                attempts: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Connector for FlakyConnector {
        async fn connect(&self, _target: &ServerTarget) -> Result<Box<dyn Session>> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                Err(Error::ServerClosed)
            } else {
                Ok(Box::new(NullSession))
            }
        }
    }

    fn target() -> ServerTarget {
        ServerTarget::new("localhost", 10000, SessionKind::Python)
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let connector = FlakyConnector::new(3);
        let policy = RetryPolicy::new(5, Duration::ZERO);

        let result = connect_with_retry(&connector, &target(), &policy).await;
        assert!(result.is_ok());
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_exhausted_after_max_retries() {
        let connector = FlakyConnector::new(u32::MAX);
        let policy = RetryPolicy::new(25, Duration::ZERO);

        let err = connect_with_retry(&connector, &target(), &policy)
            .await
            .err()
            .unwrap();
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 25);
        assert!(matches!(err, Error::ConnectionExhausted { attempts: 25, .. }));
        assert!(err.to_string().contains("after 25 attempts"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_fixed_interval_between_attempts() {
        let connector = FlakyConnector::new(2);
        let policy = RetryPolicy::new(5, Duration::from_secs(1));

        let start = tokio::time::Instant::now();
        connect_with_retry(&connector, &target(), &policy)
            .await
            .ok()
            .unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_secs(3));
    }

    /// Fails twice, succeeds once, forever
    struct CyclingConnector {
        attempts: AtomicU32,
    }

    #[async_trait]
    impl Connector for CyclingConnector {
        async fn connect(&self, _target: &ServerTarget) -> Result<Box<dyn Session>> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt % 3 == 2 {
                Ok(Box::new(NullSession))
            } else {
                Err(Error::ServerClosed)
            }
        }
    }

    #[tokio::test]
    async fn test_failure_count_not_carried_across_calls() {
        let connector = CyclingConnector {
            attempts: AtomicU32::new(0),
        };
        let policy = RetryPolicy::new(3, Duration::ZERO);

        assert!(connect_with_retry(&connector, &target(), &policy).await.is_ok());
        assert!(connect_with_retry(&connector, &target(), &policy).await.is_ok());
    }
}
