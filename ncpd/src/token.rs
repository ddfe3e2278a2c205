//! The shared access-token cache.

use crate::error::Result;
use crate::oauth::TokenRefresher;
use jiff::Timestamp;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::instrument;

/// A token is handed out only if it stays valid for at least this long.
pub const EXPIRY_SKEW: Duration = Duration::from_secs(30);

/// Longest lifetime a token is trusted for, whatever the server claims.
pub const MAX_LIFETIME: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// The one live credential of a [`TokenCache`].
#[derive(Clone)]
struct AccessCredential {
    access_token: String,
    refresh_token: String,
    /// Monotonic expiry used for validity checks
    expires_at: Instant,
    /// Wall-clock expiry, for reporting only
    expires_at_wall: Option<Timestamp>,
}

impl AccessCredential {
    fn is_fresh(&self, now: Instant) -> bool {
        now + EXPIRY_SKEW < self.expires_at
    }
}

/// Hands out a currently valid access token, refreshing it when needed.
///
/// Reads take the shared lock. A caller that finds the token stale takes the
/// exclusive lock and checks again before refreshing, so callers racing on an
/// expired token cause exactly one refresh and all observe its result.
///
/// A failed refresh leaves the previous credential in place and is reported to
/// the caller; the cache never retries by itself.
pub struct TokenCache<R> {
    refresher: R,
    /// Used until the first refresh hands out a rotated token
    bootstrap_refresh_token: String,
    credential: RwLock<Option<AccessCredential>>,
}

impl<R> std::fmt::Debug for TokenCache<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache").finish_non_exhaustive()
    }
}

impl<R: TokenRefresher> TokenCache<R> {
    pub fn new(refresher: R, bootstrap_refresh_token: impl Into<String>) -> Self {
        Self {
            refresher,
            bootstrap_refresh_token: bootstrap_refresh_token.into(),
            credential: RwLock::new(None),
        }
    }

    /// Returns an access token valid for at least [`EXPIRY_SKEW`].
    #[instrument(skip(self))]
    pub async fn token(&self) -> Result<String> {
        {
            let credential = self.credential.read().await;
            if let Some(c) = credential.as_ref().filter(|c| c.is_fresh(Instant::now())) {
                return Ok(c.access_token.clone());
            }
        }

        let mut credential = self.credential.write().await;

        // someone else may have refreshed while we waited for the write lock
        if let Some(c) = credential.as_ref().filter(|c| c.is_fresh(Instant::now())) {
            tracing::trace!("access token refreshed by a concurrent caller");
            return Ok(c.access_token.clone());
        }

        let refresh_token = credential
            .as_ref()
            .map(|c| c.refresh_token.clone())
            .unwrap_or_else(|| self.bootstrap_refresh_token.clone());

        tracing::info!(first = credential.is_none(), "refreshing access token");
        let refreshed = self.refresher.refresh(&refresh_token).await?;
        let now = Instant::now();
        let lifetime = refreshed.expires_in.min(MAX_LIFETIME);
        if lifetime < refreshed.expires_in {
            tracing::warn!(
                expires_in = refreshed.expires_in.as_secs(),
                "access token lifetime clamped"
            );
        }

        let next = AccessCredential {
            access_token: refreshed.access_token,
            // keep the old refresh token if the server did not rotate it
            refresh_token: refreshed.refresh_token.unwrap_or(refresh_token),
            // an unrepresentable expiry counts as already expired
            expires_at: now.checked_add(lifetime).unwrap_or(now),
            expires_at_wall: Timestamp::now().checked_add(lifetime).ok(),
        };

        match next.expires_at_wall {
            Some(at) => tracing::info!(expires_at = %at, "access token refreshed"),
            None => tracing::info!("access token refreshed"),
        }

        let token = next.access_token.clone();
        *credential = Some(next);
        Ok(token)
    }

    /// The most recent refresh token, so it can be persisted across restarts.
    ///
    /// Before the first refresh this is the bootstrap token.
    pub async fn refresh_token(&self) -> String {
        self.credential
            .read()
            .await
            .as_ref()
            .map(|c| c.refresh_token.clone())
            .unwrap_or_else(|| self.bootstrap_refresh_token.clone())
    }

    /// When the cached access token expires, if one has been obtained.
    pub async fn expiry(&self) -> Option<Timestamp> {
        self.credential
            .read()
            .await
            .as_ref()
            .and_then(|c| c.expires_at_wall)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::oauth::RefreshedToken;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const LIFETIME: Duration = Duration::from_secs(3600);

    /// Counts refreshes and mints `access-N` / `refresh-N` on the N-th call.
    #[derive(Default)]
    struct FakeRefresher {
        calls: AtomicUsize,
        presented: Mutex<Vec<String>>,
        fail_on: Option<usize>,
        rotate: bool,
        delay: Duration,
        lifetime: Option<Duration>,
    }

    impl FakeRefresher {
        fn rotating() -> Self {
            Self {
                rotate: true,
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TokenRefresher for Arc<FakeRefresher> {
        async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.presented.lock().unwrap().push(refresh_token.to_string());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail_on == Some(n) {
                return Err(Error::TokenRefresh("auth server unavailable".into()));
            }
            Ok(RefreshedToken {
                access_token: format!("access-{n}"),
                refresh_token: self.rotate.then(|| format!("refresh-{n}")),
                expires_in: self.lifetime.unwrap_or(LIFETIME),
            })
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_refresh() {
        let refresher = Arc::new(FakeRefresher {
            delay: Duration::from_millis(50),
            ..FakeRefresher::rotating()
        });
        let cache = Arc::new(TokenCache::new(refresher.clone(), "bootstrap"));

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.token().await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "access-1");
        }
        assert_eq!(refresher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_on_expired_token_share_one_refresh() {
        let refresher = Arc::new(FakeRefresher {
            delay: Duration::from_millis(50),
            ..FakeRefresher::rotating()
        });
        let cache = Arc::new(TokenCache::new(refresher.clone(), "bootstrap"));
        assert_eq!(cache.token().await.unwrap(), "access-1");

        tokio::time::advance(LIFETIME).await;
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.token().await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "access-2");
        }
        assert_eq!(refresher.calls(), 2);
        assert_eq!(
            *refresher.presented.lock().unwrap(),
            vec!["bootstrap".to_string(), "refresh-1".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn absurd_lifetime_is_clamped() {
        let refresher = Arc::new(FakeRefresher {
            lifetime: Some(Duration::from_secs(u64::MAX)),
            ..FakeRefresher::rotating()
        });
        let cache = TokenCache::new(refresher.clone(), "bootstrap");

        assert_eq!(cache.token().await.unwrap(), "access-1");
        let expiry = cache.expiry().await.unwrap();
        assert!(expiry <= Timestamp::now().checked_add(MAX_LIFETIME).unwrap());

        tokio::time::advance(MAX_LIFETIME - EXPIRY_SKEW - Duration::from_secs(1)).await;
        assert_eq!(cache.token().await.unwrap(), "access-1");
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.token().await.unwrap(), "access-2");
        assert_eq!(refresher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn valid_token_is_reused() {
        let refresher = Arc::new(FakeRefresher::rotating());
        let cache = TokenCache::new(refresher.clone(), "bootstrap");

        let first = cache.token().await.unwrap();
        tokio::time::advance(Duration::from_secs(600)).await;
        let second = cache.token().await.unwrap();

        assert_eq!(first, "access-1");
        assert_eq!(first, second);
        assert_eq!(refresher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refreshes_within_skew_of_expiry() {
        let refresher = Arc::new(FakeRefresher::rotating());
        let cache = TokenCache::new(refresher.clone(), "bootstrap");
        cache.token().await.unwrap();

        // one second before the skew window opens
        tokio::time::advance(LIFETIME - EXPIRY_SKEW - Duration::from_secs(1)).await;
        assert_eq!(cache.token().await.unwrap(), "access-1");
        assert_eq!(refresher.calls(), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.token().await.unwrap(), "access-2");
        assert_eq!(refresher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn rotated_refresh_token_is_used_next() {
        let refresher = Arc::new(FakeRefresher::rotating());
        let cache = TokenCache::new(refresher.clone(), "bootstrap");

        assert_eq!(cache.refresh_token().await, "bootstrap");
        assert!(cache.expiry().await.is_none());

        cache.token().await.unwrap();
        assert_eq!(cache.refresh_token().await, "refresh-1");
        assert!(cache.expiry().await.is_some());

        tokio::time::advance(LIFETIME).await;
        cache.token().await.unwrap();

        assert_eq!(
            *refresher.presented.lock().unwrap(),
            vec!["bootstrap".to_string(), "refresh-1".to_string()]
        );
        assert_eq!(cache.refresh_token().await, "refresh-2");
    }

    #[tokio::test(start_paused = true)]
    async fn unrotated_refresh_token_is_kept() {
        let refresher = Arc::new(FakeRefresher::default());
        let cache = TokenCache::new(refresher.clone(), "bootstrap");

        cache.token().await.unwrap();
        assert_eq!(cache.refresh_token().await, "bootstrap");

        tokio::time::advance(LIFETIME).await;
        cache.token().await.unwrap();
        assert_eq!(
            *refresher.presented.lock().unwrap(),
            vec!["bootstrap".to_string(), "bootstrap".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_leaves_state_unchanged() {
        let refresher = Arc::new(FakeRefresher {
            fail_on: Some(2),
            ..FakeRefresher::rotating()
        });
        let cache = TokenCache::new(refresher.clone(), "bootstrap");
        cache.token().await.unwrap();
        let expiry = cache.expiry().await;

        tokio::time::advance(LIFETIME).await;
        let err = cache.token().await.unwrap_err();
        assert!(matches!(err, Error::TokenRefresh(_)));
        assert_eq!(cache.refresh_token().await, "refresh-1");
        assert_eq!(cache.expiry().await, expiry);

        // the caller retries explicitly
        assert_eq!(cache.token().await.unwrap(), "access-3");
        assert_eq!(refresher.calls(), 3);
        assert_eq!(
            refresher.presented.lock().unwrap()[1..],
            ["refresh-1".to_string(), "refresh-1".to_string()]
        );
    }
}
