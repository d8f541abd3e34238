//! The push substrate: connection registry, groups, and broadcast.
//!
//! [`PushHub`] is the lifecycle capability every hub exposes. The
//! [`BroadcastHub`] is the base implementation that actually keeps track
//! of peers and fans pushes out to them; gates such as
//! [`ConnectionGate`](crate::ConnectionGate) wrap it rather than extend it.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Mutex};
use vigil_protocol::{Codec, Envelope, JsonCodec, Push};
use vigil_transport::{ConnectionContext, ConnectionId};

use crate::HubError;

/// Channel sender that delivers encoded pushes to one connection's
/// writer task.
pub type PeerSender = mpsc::UnboundedSender<Arc<[u8]>>;

/// A connection as the hub sees it: an id and a way to reach it.
#[derive(Debug)]
pub struct Peer {
    pub id: ConnectionId,
    pub sender: PeerSender,
}

/// Outcome of a connect-time lifecycle hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The connection is registered and may receive pushes.
    Accept,
    /// The connection must be torn down without any data exchanged.
    Reject,
}

/// Who should receive a push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Every registered connection.
    All,
    /// Every member of a named group.
    Group(String),
    /// One specific connection.
    Connection(ConnectionId),
    /// Everyone except one connection.
    AllExcept(ConnectionId),
}

/// Connection lifecycle hooks of a push hub.
///
/// The driver calls `on_connect` once per accepted transport connection
/// and `on_disconnect` once when an admitted connection goes away.
pub trait PushHub: Send + Sync + 'static {
    /// Decides whether `peer` joins the hub.
    ///
    /// On [`Admission::Reject`] the peer is dropped and nothing about it
    /// may be retained.
    fn on_connect(
        &self,
        peer: Peer,
        ctx: &ConnectionContext,
    ) -> impl Future<Output = Admission> + Send;

    /// Forgets a previously admitted connection.
    fn on_disconnect(&self, id: ConnectionId) -> impl Future<Output = ()> + Send;
}

/// Registry state behind the hub's lock.
#[derive(Debug, Default)]
struct Registry {
    peers: HashMap<ConnectionId, PeerSender>,
    groups: HashMap<String, HashSet<ConnectionId>>,
}

impl Registry {
    fn recipients(&self, target: &Target) -> Vec<ConnectionId> {
        match target {
            Target::All => self.peers.keys().copied().collect(),
            Target::Group(name) => self
                .groups
                .get(name)
                .map(|members| members.iter().copied().collect())
                .unwrap_or_default(),
            Target::Connection(id) => {
                if self.peers.contains_key(id) {
                    vec![*id]
                } else {
                    Vec::new()
                }
            }
            Target::AllExcept(skip) => {
                self.peers.keys().filter(|id| *id != skip).copied().collect()
            }
        }
    }

    fn remove(&mut self, id: ConnectionId) -> bool {
        let existed = self.peers.remove(&id).is_some();
        self.groups.retain(|_, members| {
            members.remove(&id);
            !members.is_empty()
        });
        existed
    }
}

struct HubInner<C> {
    registry: Mutex<Registry>,
    codec: C,
    next_seq: AtomicU64,
    started: Instant,
}

/// The base [`PushHub`]: admits every peer and delivers broadcasts.
///
/// Cloning is cheap; all clones share one registry. Keep a clone around
/// to publish while the server owns another inside its gate.
pub struct BroadcastHub<C: Codec = JsonCodec> {
    inner: Arc<HubInner<C>>,
}

impl<C: Codec> Clone for BroadcastHub<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl BroadcastHub<JsonCodec> {
    /// Creates an empty hub that encodes pushes as JSON.
    pub fn new() -> Self {
        Self::with_codec(JsonCodec)
    }
}

impl Default for BroadcastHub<JsonCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Codec> BroadcastHub<C> {
    /// Creates an empty hub with a custom codec.
    pub fn with_codec(codec: C) -> Self {
        Self {
            inner: Arc::new(HubInner {
                registry: Mutex::new(Registry::default()),
                codec,
                next_seq: AtomicU64::new(1),
                started: Instant::now(),
            }),
        }
    }

    /// Encodes `push` once and queues it to every connection in `target`.
    ///
    /// Returns the number of connections the push was queued to. Peers
    /// whose writer has already gone away are pruned.
    pub async fn broadcast(
        &self,
        target: &Target,
        push: Push,
    ) -> Result<usize, HubError> {
        let envelope = Envelope {
            seq: self.inner.next_seq.fetch_add(1, Ordering::Relaxed),
            timestamp: self.inner.started.elapsed().as_millis() as u64,
            payload: push,
        };
        let bytes = self.inner.codec.encode(&envelope)?;

        let mut registry = self.inner.registry.lock().await;
        let mut delivered = 0;
        let mut dead = Vec::new();
        for id in registry.recipients(target) {
            let Some(sender) = registry.peers.get(&id) else {
                continue;
            };
            if sender.send(Arc::clone(&bytes)).is_ok() {
                delivered += 1;
            } else {
                dead.push(id);
            }
        }
        for id in dead {
            registry.remove(id);
            tracing::debug!(conn_id = %id, "pruned closed peer");
        }

        tracing::trace!(seq = envelope.seq, ?target, delivered, "push queued");
        Ok(delivered)
    }

    /// Adds a registered connection to a named group.
    pub async fn add_to_group(
        &self,
        id: ConnectionId,
        group: &str,
    ) -> Result<(), HubError> {
        let mut registry = self.inner.registry.lock().await;
        if !registry.peers.contains_key(&id) {
            return Err(HubError::UnknownConnection(id));
        }
        registry
            .groups
            .entry(group.to_string())
            .or_default()
            .insert(id);
        tracing::debug!(conn_id = %id, group, "joined group");
        Ok(())
    }

    /// Removes a connection from a named group. Returns `true` if it was
    /// a member.
    pub async fn remove_from_group(&self, id: ConnectionId, group: &str) -> bool {
        let mut registry = self.inner.registry.lock().await;
        let Some(members) = registry.groups.get_mut(group) else {
            return false;
        };
        let removed = members.remove(&id);
        if members.is_empty() {
            registry.groups.remove(group);
        }
        removed
    }

    /// Returns `true` if the connection is currently registered.
    pub async fn is_connected(&self, id: ConnectionId) -> bool {
        self.inner.registry.lock().await.peers.contains_key(&id)
    }

    /// Number of registered connections.
    pub async fn connection_count(&self) -> usize {
        self.inner.registry.lock().await.peers.len()
    }

    /// Ids of every registered connection, in no particular order.
    pub async fn connection_ids(&self) -> Vec<ConnectionId> {
        self.inner.registry.lock().await.peers.keys().copied().collect()
    }

    /// Number of members of a group.
    pub async fn group_size(&self, group: &str) -> usize {
        self.inner
            .registry
            .lock()
            .await
            .groups
            .get(group)
            .map_or(0, HashSet::len)
    }
}

impl<C: Codec> PushHub for BroadcastHub<C> {
    async fn on_connect(&self, peer: Peer, _ctx: &ConnectionContext) -> Admission {
        let mut registry = self.inner.registry.lock().await;
        registry.peers.insert(peer.id, peer.sender);
        tracing::info!(
            conn_id = %peer.id,
            connections = registry.peers.len(),
            "connection registered"
        );
        Admission::Accept
    }

    async fn on_disconnect(&self, id: ConnectionId) {
        if self.inner.registry.lock().await.remove(id) {
            tracing::info!(conn_id = %id, "connection unregistered");
        }
    }
}
