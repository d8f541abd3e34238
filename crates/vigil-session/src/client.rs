//! The wired-up client: cache, resources, and sign-out in one place.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use vigil_protocol::{IdentitySnapshot, Role};

use crate::{
    AccountApi, Navigator, Notifier, ResourceCache, SessionCache,
    SessionCacheConfig, SignOutConfig, SignOutCoordinator, SignOutOutcome,
};

/// Everything the client needs to know and change about the signed-in
/// user.
///
/// Revocations reported by the cache are turned into forced sign-outs by
/// a background task that lives as long as this value.
pub struct ClientSession<A, N, T> {
    cache: SessionCache,
    resources: ResourceCache,
    coordinator: Arc<SignOutCoordinator<A, N, T>>,
    watcher: JoinHandle<()>,
}

impl<A, N, T> ClientSession<A, N, T>
where
    A: AccountApi,
    N: Navigator,
    T: Notifier,
{
    /// Starts the session cache and the revocation watcher.
    pub fn start(
        api: Arc<A>,
        navigator: N,
        notifier: T,
        cache_config: SessionCacheConfig,
        sign_out_config: SignOutConfig,
    ) -> Self {
        let refresh_on_start = cache_config.refresh_on_start;
        // The watcher must be subscribed before the first fetch can land.
        let cache = SessionCache::spawn(
            Arc::clone(&api),
            SessionCacheConfig {
                refresh_on_start: false,
                ..cache_config
            },
        );
        let resources = ResourceCache::new();
        let coordinator = Arc::new(SignOutCoordinator::new(
            api,
            cache.clone(),
            resources.clone(),
            navigator,
            notifier,
            sign_out_config,
        ));

        let mut revoked = cache.on_revoked();
        let watcher = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                loop {
                    match revoked.recv().await {
                        Ok(event) => {
                            tracing::info!(
                                user = ?event.user.as_ref().map(|u| &u.user_name),
                                "privilege revoked"
                            );
                            coordinator.sign_out_revoked().await;
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => {
                            coordinator.sign_out_revoked().await;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            })
        };

        if refresh_on_start {
            cache.refresh();
        }

        Self {
            cache,
            resources,
            coordinator,
            watcher,
        }
    }

    /// The latest identity snapshot, without blocking.
    pub fn current_user(&self) -> Option<Arc<IdentitySnapshot>> {
        self.cache.current_user()
    }

    /// The current user's role, if signed in.
    pub fn role(&self) -> Option<Role> {
        self.cache.role()
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    pub fn resources(&self) -> &ResourceCache {
        &self.resources
    }

    /// Signs the user out. See [`SignOutCoordinator::sign_out`].
    pub async fn sign_out(&self) -> SignOutOutcome {
        self.coordinator.sign_out().await
    }
}

impl<A, N, T> Drop for ClientSession<A, N, T> {
    fn drop(&mut self) {
        // The watcher holds a cache handle, which would keep the actor
        // alive forever.
        self.watcher.abort();
    }
}
