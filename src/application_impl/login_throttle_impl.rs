use crate::application_port::*;
use crate::domain_port::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const FAILED_ATTEMPTS_PREFIX: &str = "failed-attempts:";

#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    pub max_attempts: u64,
    pub window: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        ThrottleConfig {
            max_attempts: 5,
            window: Duration::from_secs(15 * 60),
        }
    }
}

/// Counters live only in the side store: losing them re-opens the gate,
/// which is an accepted degradation for advisory state.
pub struct RealLoginThrottle {
    store: Arc<dyn RevocationStore>,
    cfg: ThrottleConfig,
}

impl RealLoginThrottle {
    pub fn new(store: Arc<dyn RevocationStore>, cfg: ThrottleConfig) -> Self {
        Self { store, cfg }
    }

    #[inline]
    fn key(identifier: &str) -> String {
        format!("{FAILED_ATTEMPTS_PREFIX}{}", identifier.trim().to_lowercase())
    }
}

#[async_trait::async_trait]
impl LoginThrottle for RealLoginThrottle {
    async fn may_attempt(&self, identifier: &str) -> Result<bool, AuthError> {
        let key = Self::key(identifier);
        let stored = self.store.get(&key).await?;
        let count = match stored {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|e| StoreError::Corrupt {
                    key,
                    detail: e.to_string(),
                })?,
            None => 0,
        };
        Ok(count < self.cfg.max_attempts)
    }

    async fn record_failure(&self, identifier: &str) -> Result<u64, AuthError> {
        let count = self
            .store
            .increment_with_ttl_on_first(&Self::key(identifier), self.cfg.window.as_secs().max(1))
            .await?;
        debug!(count, "failed login attempt recorded");
        Ok(count)
    }

    async fn clear(&self, identifier: &str) -> Result<(), AuthError> {
        self.store.atomic_delete(&Self::key(identifier)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra_memory::MemoryRevocationStore;

    fn throttle() -> RealLoginThrottle {
        RealLoginThrottle::new(
            Arc::new(MemoryRevocationStore::new()),
            ThrottleConfig::default(),
        )
    }

    #[tokio::test]
    async fn gate_closes_at_exactly_five_failures() {
        let throttle = throttle();
        for expected in 1..=4 {
            assert_eq!(throttle.record_failure("c@x.com").await.unwrap(), expected);
            assert!(throttle.may_attempt("c@x.com").await.unwrap());
        }

        assert_eq!(throttle.record_failure("c@x.com").await.unwrap(), 5);
        assert!(!throttle.may_attempt("c@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn clear_reopens_the_gate_immediately() {
        let throttle = throttle();
        for _ in 0..5 {
            throttle.record_failure("c@x.com").await.unwrap();
        }
        throttle.clear("c@x.com").await.unwrap();

        assert!(throttle.may_attempt("c@x.com").await.unwrap());
        assert_eq!(throttle.record_failure("c@x.com").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn identifiers_are_case_insensitive() {
        let throttle = throttle();
        for _ in 0..5 {
            throttle.record_failure("C@X.com").await.unwrap();
        }
        assert!(!throttle.may_attempt("c@x.com").await.unwrap());
        assert!(throttle.may_attempt("d@x.com").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn window_is_anchored_to_the_first_failure() {
        let throttle = throttle();
        throttle.record_failure("c@x.com").await.unwrap();

        tokio::time::advance(Duration::from_secs(10 * 60)).await;
        for _ in 0..4 {
            throttle.record_failure("c@x.com").await.unwrap();
        }
        assert!(!throttle.may_attempt("c@x.com").await.unwrap());

        // 16 minutes after the first failure, although the last one was 6
        // minutes ago.
        tokio::time::advance(Duration::from_secs(6 * 60)).await;
        assert!(throttle.may_attempt("c@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn store_outage_is_surfaced() {
        let store = Arc::new(MemoryRevocationStore::new());
        let throttle = RealLoginThrottle::new(store.clone(), ThrottleConfig::default());
        store.set_available(false);

        assert!(matches!(
            throttle.may_attempt("c@x.com").await,
            Err(AuthError::StoreUnavailable(_))
        ));
    }
}
