//! One-time codes gating progress subscriptions.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

use crate::cache::{handshake_key, Take, TtlCache};
use crate::{Result, VaultError};

/// Issues and verifies handshake codes.
///
/// A code is bound to an application and a caller-supplied correlation ID,
/// lives for the configured TTL, and is consumed by the first successful
/// verification.
#[derive(Clone)]
pub struct HandshakeBroker {
    cache: Arc<dyn TtlCache>,
    ttl: Duration,
}

impl HandshakeBroker {
    /// Create a broker storing codes in `cache`.
    pub fn new(cache: Arc<dyn TtlCache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// Issue a fresh code for `(app, id)`.
    pub fn issue(&self, app: &str, id: &str) -> String {
        let code = Uuid::new_v4().to_string();
        self.cache
            .set(&handshake_key(app, &code), id.to_string(), self.ttl);
        debug!(app, "Issued handshake code");
        code
    }

    /// Verify and consume a code.
    ///
    /// The check and the removal are one atomic step, so a code admits at
    /// most one caller even when presented concurrently.
    pub fn verify(&self, app: &str, id: &str, code: &str) -> Result<()> {
        if app.is_empty() || id.is_empty() || code.is_empty() {
            return Err(VaultError::Handshake(
                "app, id and code are required".to_string(),
            ));
        }

        match self
            .cache
            .take_if(&handshake_key(app, code), &|stored| stored == id)
        {
            Take::Taken(_) => {}
            Take::Kept(_) => {
                debug!(app, "Handshake correlation id mismatch");
                return Err(VaultError::Handshake(
                    "code was issued for another id".to_string(),
                ));
            }
            Take::Missing => {
                return Err(VaultError::Handshake("unknown or expired code".to_string()));
            }
        }

        debug!(app, "Handshake accepted");
        Ok(())
    }
}

impl std::fmt::Debug for HandshakeBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakeBroker")
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;

    use crate::cache::MemoryTtlCache;

    fn broker(ttl: Duration) -> HandshakeBroker {
        HandshakeBroker::new(Arc::new(MemoryTtlCache::new(100)), ttl)
    }

    #[test]
    fn test_issue_and_verify() {
        let broker = broker(Duration::from_secs(60));
        let code = broker.issue("shop", "client-1");
        assert_eq!(code.len(), 36);
        broker.verify("shop", "client-1", &code).unwrap();
    }

    #[test]
    fn test_code_is_single_use() {
        let broker = broker(Duration::from_secs(60));
        let code = broker.issue("shop", "client-1");
        broker.verify("shop", "client-1", &code).unwrap();
        assert!(matches!(
            broker.verify("shop", "client-1", &code),
            Err(VaultError::Handshake(_))
        ));
    }

    #[test]
    fn test_unknown_code_rejected() {
        let broker = broker(Duration::from_secs(60));
        assert!(broker.verify("shop", "client-1", "never-issued").is_err());
    }

    #[test]
    fn test_other_app_rejected() {
        let broker = broker(Duration::from_secs(60));
        let code = broker.issue("shop", "client-1");
        assert!(broker.verify("blog", "client-1", &code).is_err());
        // Still valid for the right app.
        broker.verify("shop", "client-1", &code).unwrap();
    }

    #[test]
    fn test_mismatched_id_does_not_consume() {
        let broker = broker(Duration::from_secs(60));
        let code = broker.issue("shop", "client-1");
        assert!(broker.verify("shop", "client-2", &code).is_err());
        broker.verify("shop", "client-1", &code).unwrap();
    }

    #[test]
    fn test_expired_code_rejected() {
        let broker = broker(Duration::from_millis(50));
        let code = broker.issue("shop", "client-1");
        std::thread::sleep(Duration::from_millis(150));
        assert!(broker.verify("shop", "client-1", &code).is_err());
    }

    #[test]
    fn test_concurrent_verify_admits_one() {
        let broker = broker(Duration::from_secs(60));
        for round in 0..200 {
            let code = broker.issue("shop", "client-1");
            let barrier = Arc::new(Barrier::new(4));

            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let broker = broker.clone();
                    let barrier = Arc::clone(&barrier);
                    let code = code.clone();
                    std::thread::spawn(move || {
                        barrier.wait();
                        broker.verify("shop", "client-1", &code).is_ok()
                    })
                })
                .collect();

            let accepted = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|ok| *ok)
                .count();
            assert_eq!(accepted, 1, "round {round}");
        }
    }

    #[test]
    fn test_empty_parameters_rejected() {
        let broker = broker(Duration::from_secs(60));
        assert!(broker.verify("", "client-1", "x").is_err());
        assert!(broker.verify("shop", "", "x").is_err());
        assert!(broker.verify("shop", "client-1", "").is_err());
    }
}
