//! Publishing handle for the administrator log feed.

use vigil_hub::{BroadcastHub, HubError, Target};
use vigil_protocol::{LogMessage, Push};
use vigil_transport::ConnectionId;

/// Pushes server log lines to connected administrators.
///
/// Every connection the feed can reach has passed the privilege gate, so
/// publishing needs no further checks. Cloning is cheap.
#[derive(Clone)]
pub struct AdminFeed {
    hub: BroadcastHub,
}

impl AdminFeed {
    pub(crate) fn new(hub: BroadcastHub) -> Self {
        Self { hub }
    }

    /// Sends `log` to every administrator. Returns how many connections
    /// it was queued to.
    pub async fn push_log(&self, log: LogMessage) -> Result<usize, HubError> {
        self.hub.broadcast(&Target::All, Push::Log(log)).await
    }

    /// Sends `log` to the administrators in `group`.
    pub async fn push_log_to(
        &self,
        group: &str,
        log: LogMessage,
    ) -> Result<usize, HubError> {
        self.hub
            .broadcast(&Target::Group(group.to_string()), Push::Log(log))
            .await
    }

    pub async fn add_to_group(
        &self,
        id: ConnectionId,
        group: &str,
    ) -> Result<(), HubError> {
        self.hub.add_to_group(id, group).await
    }

    pub async fn remove_from_group(&self, id: ConnectionId, group: &str) -> bool {
        self.hub.remove_from_group(id, group).await
    }

    /// Number of administrators currently connected.
    pub async fn connection_count(&self) -> usize {
        self.hub.connection_count().await
    }

    pub async fn connections(&self) -> Vec<ConnectionId> {
        self.hub.connection_ids().await
    }

    /// The underlying hub, for targets the feed does not cover.
    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }
}
