//! Sign-out coordinator: makes "signed out" a local fact no matter what
//! the server says.
//!
//! The coordinator does not touch any UI itself. Navigation and toasts
//! go through the [`Navigator`] and [`Notifier`] it is constructed with.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::{AccountApi, InvalidationScope, ResourceCache, SessionCache};

/// Moves the client to another route.
pub trait Navigator: Send + Sync + 'static {
    fn navigate(&self, route: &str);
}

/// Shows a transient notification to the user.
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, notice: Notice);
}

/// Visual severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Notifications the coordinator can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// The user asked to sign out and the server confirmed it.
    SignedOut,
    /// The server reported the account as disabled.
    AccountDisabled,
}

impl Notice {
    pub fn level(self) -> NoticeLevel {
        match self {
            Self::SignedOut => NoticeLevel::Success,
            Self::AccountDisabled => NoticeLevel::Error,
        }
    }

    /// Translation key of the message text.
    pub fn message_key(self) -> &'static str {
        match self {
            Self::SignedOut => "Account_SignedOut",
            Self::AccountDisabled => "Account_Disabled",
        }
    }
}

/// Result of a sign-out, shared by every caller that joined it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutOutcome {
    /// The server ended the session.
    Confirmed,
    /// The remote call failed; the client is signed out locally only.
    LocalOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reason {
    Requested,
    Revoked,
}

/// Where sign-out sends the user and what it drops.
#[derive(Debug, Clone)]
pub struct SignOutConfig {
    /// Route of the unauthenticated landing page.
    pub landing_route: String,
    /// Cached resources to drop along with the identity.
    pub scope: InvalidationScope,
}

impl Default for SignOutConfig {
    fn default() -> Self {
        Self {
            landing_route: "/".to_string(),
            scope: InvalidationScope::containing("game/"),
        }
    }
}

/// The sign-out currently running, if any.
struct Inflight {
    done: watch::Receiver<Option<SignOutOutcome>>,
    /// Set when a revocation joined, so the shared notice escalates.
    revoked: bool,
}

type InflightSlot = Mutex<Option<Inflight>>;

enum Turn {
    Lead(watch::Sender<Option<SignOutOutcome>>),
    Join(watch::Receiver<Option<SignOutOutcome>>),
}

/// Clears the in-flight slot if the leading call is cancelled, so joiners
/// retry instead of waiting on a dead operation.
struct InflightGuard<'a> {
    slot: &'a InflightSlot,
    armed: bool,
}

impl InflightGuard<'_> {
    /// Empties the slot and reports whether a revocation joined. Callers
    /// arriving afterwards start a fresh sign-out.
    fn close(mut self) -> bool {
        self.armed = false;
        self.slot.lock().take().is_some_and(|inflight| inflight.revoked)
    }
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            *self.slot.lock() = None;
        }
    }
}

/// Coordinates remote sign-out with local invalidation.
pub struct SignOutCoordinator<A, N, T> {
    api: Arc<A>,
    cache: SessionCache,
    resources: ResourceCache,
    navigator: N,
    notifier: T,
    config: SignOutConfig,
    inflight: InflightSlot,
}

impl<A, N, T> SignOutCoordinator<A, N, T>
where
    A: AccountApi,
    N: Navigator,
    T: Notifier,
{
    pub fn new(
        api: Arc<A>,
        cache: SessionCache,
        resources: ResourceCache,
        navigator: N,
        notifier: T,
        config: SignOutConfig,
    ) -> Self {
        Self {
            api,
            cache,
            resources,
            navigator,
            notifier,
            config,
            inflight: Mutex::new(None),
        }
    }

    /// Signs the user out at their request.
    ///
    /// A confirmation is shown only if the server confirmed. Concurrent
    /// calls share one operation and one navigation. If the call driving
    /// that operation is dropped, a waiting caller takes it over.
    pub async fn sign_out(&self) -> SignOutOutcome {
        self.run(Reason::Requested).await
    }

    /// Signs the user out because the server disabled the account.
    ///
    /// The "account disabled" notice is always shown. Joining a requested
    /// sign-out that is still running turns its notice into this one.
    pub async fn sign_out_revoked(&self) -> SignOutOutcome {
        self.run(Reason::Revoked).await
    }

    async fn run(&self, reason: Reason) -> SignOutOutcome {
        loop {
            let turn = {
                let mut slot = self.inflight.lock();
                match slot.as_mut() {
                    Some(inflight) => {
                        inflight.revoked |= reason == Reason::Revoked;
                        Turn::Join(inflight.done.clone())
                    }
                    None => {
                        let (tx, rx) = watch::channel(None);
                        *slot = Some(Inflight {
                            done: rx,
                            revoked: reason == Reason::Revoked,
                        });
                        Turn::Lead(tx)
                    }
                }
            };

            match turn {
                Turn::Lead(tx) => {
                    let guard = InflightGuard {
                        slot: &self.inflight,
                        armed: true,
                    };
                    let outcome = self.perform().await;
                    let revoked = guard.close();
                    self.announce(revoked, outcome);
                    tx.send_replace(Some(outcome));
                    return outcome;
                }
                Turn::Join(mut rx) => {
                    tracing::debug!(?reason, "sign-out already in progress; joining it");
                    if let Ok(outcome) = rx.wait_for(Option::is_some).await {
                        if let Some(outcome) = *outcome {
                            return outcome;
                        }
                    }
                    tracing::debug!(?reason, "leading sign-out was cancelled; retrying");
                }
            }
        }
    }

    async fn perform(&self) -> SignOutOutcome {
        let remote = self.api.log_out().await;
        let outcome = match &remote {
            Ok(()) => SignOutOutcome::Confirmed,
            Err(e) => {
                tracing::warn!(error = %e, "remote sign-out failed; signing out locally");
                SignOutOutcome::LocalOnly
            }
        };

        // No reader may see the landing page with a user still cached.
        if let Err(e) = self.cache.invalidate().await {
            tracing::debug!(error = %e, "session cache already stopped");
        }
        let dropped = self.resources.invalidate(&self.config.scope);
        self.navigator.navigate(&self.config.landing_route);
        tracing::debug!(dropped, "local session state cleared");
        outcome
    }

    fn announce(&self, revoked: bool, outcome: SignOutOutcome) {
        match (revoked, outcome) {
            (true, _) => self.notifier.notify(Notice::AccountDisabled),
            (false, SignOutOutcome::Confirmed) => self.notifier.notify(Notice::SignedOut),
            (false, SignOutOutcome::LocalOnly) => {}
        }
        tracing::info!(revoked, ?outcome, "signed out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_levels_are_distinct() {
        assert_eq!(Notice::SignedOut.level(), NoticeLevel::Success);
        assert_eq!(Notice::AccountDisabled.level(), NoticeLevel::Error);
        assert_ne!(
            Notice::SignedOut.message_key(),
            Notice::AccountDisabled.message_key()
        );
    }

    #[test]
    fn test_default_config_targets_game_resources() {
        let cfg = SignOutConfig::default();
        assert_eq!(cfg.landing_route, "/");
        assert!(cfg.scope.matches("/api/game/12/details"));
        assert!(!cfg.scope.matches("/api/account/profile"));
    }
}
