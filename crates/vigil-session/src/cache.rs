//! Session cache actor: the client's single source of truth for "who is
//! the current user".
//!
//! One Tokio task owns the reconciliation state machine and everything
//! that mutates it. Handles talk to it through an mpsc channel and read
//! its published [`SessionView`] through a `watch` channel, so readers
//! never block and never see a half-applied update.
//!
//! ```text
//!            refresh                 Ok / 401 / 403 / budget spent
//!   Idle ───────────────→ Fetching ───────────────────────────────→ Idle
//!                           │  ↑
//!          transient error  │  │ retry timer fires (or refresh)
//!                           ▼  │
//!                        Backoff(n)
//! ```
//!
//! `invalidate` from any state returns to `Idle`, cancels the retry timer
//! and discards the result of any fetch still in flight.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use vigil_protocol::{IdentitySnapshot, Role};

use crate::{AccountApi, ApiError, FailureClass, SessionError};

/// Command channel size. Refreshes beyond this are coalesced.
const COMMAND_CHANNEL_SIZE: usize = 16;

/// Tuning for the reconciliation loop.
#[derive(Debug, Clone)]
pub struct SessionCacheConfig {
    /// Fixed delay before retrying a transient failure.
    pub retry_delay: Duration,
    /// Consecutive transient failures after which the cache gives up.
    pub max_failures: u32,
    /// Fetch the profile as soon as the cache starts.
    pub refresh_on_start: bool,
}

impl Default for SessionCacheConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(10),
            max_failures: 5,
            refresh_on_start: true,
        }
    }
}

/// Where the reconciliation state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Fetching,
    /// Waiting to retry after `n` consecutive failures.
    Backoff(u32),
}

/// The last thing that changed the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Refreshed,
    Unauthenticated,
    PrivilegeRevoked,
    /// A transient failure; `attempt` is the number of the next fetch.
    RetryScheduled { attempt: u32 },
    RetryBudgetExhausted,
    Invalidated,
    Replaced,
}

/// What readers of the cache observe.
#[derive(Debug, Clone, Default)]
pub struct SessionView {
    /// The current identity, or `None` when signed out or given up.
    pub user: Option<Arc<IdentitySnapshot>>,
    /// The error of the last failed fetch, cleared by success.
    pub error: Option<ApiError>,
    pub phase: Phase,
    /// Consecutive failed fetches in the current cycle.
    pub failures: u32,
    pub outcome: Option<Outcome>,
}

/// Sent to revocation subscribers when the server reports the account
/// as disabled.
#[derive(Debug, Clone)]
pub struct Revoked {
    /// The user that was signed in when the revocation arrived.
    pub user: Option<Arc<IdentitySnapshot>>,
}

enum Command {
    Refresh,
    Invalidate {
        reply: oneshot::Sender<()>,
    },
    Replace {
        user: Option<IdentitySnapshot>,
        reply: oneshot::Sender<()>,
    },
}

struct FetchDone {
    epoch: u64,
    result: Result<IdentitySnapshot, ApiError>,
}

/// Handle to a running session cache.
///
/// Cheap to clone. The actor stops, and any pending retry with it, once
/// every handle has been dropped.
#[derive(Clone)]
pub struct SessionCache {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<SessionView>,
    revoked: broadcast::Sender<Revoked>,
}

impl SessionCache {
    /// Spawns the cache actor on the current Tokio runtime.
    pub fn spawn<A: AccountApi>(api: Arc<A>, config: SessionCacheConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let (view_tx, view_rx) = watch::channel(SessionView::default());
        let (revoked_tx, _) = broadcast::channel(4);
        let (done_tx, done_rx) = mpsc::unbounded_channel();

        let refresh_on_start = config.refresh_on_start;
        let actor = CacheActor {
            api,
            config,
            commands: cmd_rx,
            done_tx,
            done_rx,
            view: view_tx,
            revoked: revoked_tx.clone(),
            user: None,
            phase: Phase::Idle,
            failures: 0,
            epoch: 0,
            retry_at: None,
            inflight: None,
        };
        tokio::spawn(actor.run());

        let cache = Self {
            commands: cmd_tx,
            view: view_rx,
            revoked: revoked_tx,
        };
        if refresh_on_start {
            cache.refresh();
        }
        cache
    }

    /// The latest identity snapshot. Never blocks, never fetches.
    pub fn current_user(&self) -> Option<Arc<IdentitySnapshot>> {
        self.view.borrow().user.clone()
    }

    /// The current user's role, if signed in.
    pub fn role(&self) -> Option<Role> {
        self.view.borrow().user.as_ref().map(|u| u.role)
    }

    /// A copy of the full current view.
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Subscribes to every replacement of the view.
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Subscribes to privilege revocations.
    pub fn on_revoked(&self) -> broadcast::Receiver<Revoked> {
        self.revoked.subscribe()
    }

    /// Requests a reconciliation cycle.
    ///
    /// Returns immediately. A refresh while a fetch is outstanding is
    /// coalesced into it.
    pub fn refresh(&self) {
        match self.commands.try_send(Command::Refresh) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!("refresh coalesced: command queue full");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("refresh ignored: session cache closed");
            }
        }
    }

    /// Clears the identity and cancels any pending or in-flight
    /// reconciliation. Resolves once the cleared view is published.
    pub async fn invalidate(&self) -> Result<(), SessionError> {
        let (reply, done) = oneshot::channel();
        self.commands
            .send(Command::Invalidate { reply })
            .await
            .map_err(|_| SessionError::CacheClosed)?;
        done.await.map_err(|_| SessionError::CacheClosed)
    }

    /// Writes an identity directly, without revalidating. Used after an
    /// explicit sign-in returned the profile.
    pub async fn replace(
        &self,
        user: Option<IdentitySnapshot>,
    ) -> Result<(), SessionError> {
        let (reply, done) = oneshot::channel();
        self.commands
            .send(Command::Replace { user, reply })
            .await
            .map_err(|_| SessionError::CacheClosed)?;
        done.await.map_err(|_| SessionError::CacheClosed)
    }
}

/// The actor state. Only this task touches it.
struct CacheActor<A> {
    api: Arc<A>,
    config: SessionCacheConfig,
    commands: mpsc::Receiver<Command>,
    done_tx: mpsc::UnboundedSender<FetchDone>,
    done_rx: mpsc::UnboundedReceiver<FetchDone>,
    view: watch::Sender<SessionView>,
    revoked: broadcast::Sender<Revoked>,
    user: Option<Arc<IdentitySnapshot>>,
    phase: Phase,
    failures: u32,
    /// Bumped on invalidate/replace so stale fetch results are dropped.
    epoch: u64,
    retry_at: Option<Instant>,
    inflight: Option<JoinHandle<()>>,
}

impl<A: AccountApi> CacheActor<A> {
    async fn run(mut self) {
        tracing::debug!("session cache started");

        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                Some(done) = self.done_rx.recv() => self.handle_done(done),
                () = wait_until(self.retry_at) => {
                    self.retry_at = None;
                    self.start_fetch();
                }
            }
        }

        if let Some(task) = self.inflight.take() {
            task.abort();
        }
        tracing::debug!("session cache stopped");
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Refresh => match self.phase {
                Phase::Fetching => {
                    tracing::debug!("refresh coalesced into in-flight fetch");
                }
                Phase::Backoff(n) => {
                    tracing::debug!(failures = n, "refresh cuts backoff short");
                    self.retry_at = None;
                    self.start_fetch();
                }
                Phase::Idle => {
                    self.failures = 0;
                    self.start_fetch();
                }
            },
            Command::Invalidate { reply } => {
                self.reset(None);
                self.publish(None, Outcome::Invalidated);
                tracing::debug!("session cache invalidated");
                let _ = reply.send(());
            }
            Command::Replace { user, reply } => {
                self.reset(user.map(Arc::new));
                self.publish(None, Outcome::Replaced);
                let _ = reply.send(());
            }
        }
    }

    fn handle_done(&mut self, done: FetchDone) {
        if done.epoch != self.epoch || self.phase != Phase::Fetching {
            tracing::debug!("discarding stale profile fetch");
            return;
        }
        self.inflight = None;

        let err = match done.result {
            Ok(snapshot) => {
                self.failures = 0;
                self.phase = Phase::Idle;
                self.user = Some(Arc::new(snapshot));
                self.publish(None, Outcome::Refreshed);
                return;
            }
            Err(err) => err,
        };

        match err.class() {
            FailureClass::PrivilegeRevoked => {
                tracing::warn!("account disabled by server; forcing sign-out");
                let user = self.user.take();
                self.failures = 0;
                self.phase = Phase::Idle;
                self.publish(Some(err), Outcome::PrivilegeRevoked);
                let _ = self.revoked.send(Revoked { user });
            }
            FailureClass::Unauthenticated => {
                self.user = None;
                self.failures = 0;
                self.phase = Phase::Idle;
                self.publish(Some(err), Outcome::Unauthenticated);
            }
            FailureClass::Transient => {
                self.failures += 1;
                if self.failures >= self.config.max_failures {
                    tracing::info!(
                        failures = self.failures,
                        error = %err,
                        "profile refresh gave up"
                    );
                    self.user = None;
                    self.phase = Phase::Idle;
                    self.publish(Some(err), Outcome::RetryBudgetExhausted);
                } else {
                    tracing::debug!(
                        failures = self.failures,
                        delay = ?self.config.retry_delay,
                        error = %err,
                        "profile refresh failed; retry scheduled"
                    );
                    self.phase = Phase::Backoff(self.failures);
                    self.retry_at = Some(Instant::now() + self.config.retry_delay);
                    let attempt = self.failures + 1;
                    self.publish(Some(err), Outcome::RetryScheduled { attempt });
                }
            }
        }
    }

    fn start_fetch(&mut self) {
        self.phase = Phase::Fetching;
        let attempt = self.failures + 1;
        self.view.send_modify(|view| {
            view.phase = Phase::Fetching;
        });
        tracing::debug!(attempt, "fetching profile");

        let api = Arc::clone(&self.api);
        let done = self.done_tx.clone();
        let epoch = self.epoch;
        self.inflight = Some(tokio::spawn(async move {
            let result = api.fetch_profile().await;
            let _ = done.send(FetchDone { epoch, result });
        }));
    }

    /// Drops all reconciliation state and installs `user`.
    fn reset(&mut self, user: Option<Arc<IdentitySnapshot>>) {
        self.epoch += 1;
        if let Some(task) = self.inflight.take() {
            task.abort();
        }
        self.retry_at = None;
        self.failures = 0;
        self.phase = Phase::Idle;
        self.user = user;
    }

    fn publish(&self, error: Option<ApiError>, outcome: Outcome) {
        self.view.send_replace(SessionView {
            user: self.user.clone(),
            error,
            phase: self.phase,
            failures: self.failures,
            outcome: Some(outcome),
        });
    }
}

/// Resolves at `deadline`, or never when there is none.
fn wait_until(deadline: Option<Instant>) -> impl Future<Output = ()> {
    async move {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_retry_policy() {
        let cfg = SessionCacheConfig::default();
        assert_eq!(cfg.retry_delay, Duration::from_secs(10));
        assert_eq!(cfg.max_failures, 5);
        assert!(cfg.refresh_on_start);
    }

    #[test]
    fn test_default_view_is_absent_and_idle() {
        let view = SessionView::default();
        assert!(view.user.is_none());
        assert!(view.error.is_none());
        assert_eq!(view.phase, Phase::Idle);
        assert_eq!(view.failures, 0);
    }
}
