//! Privilege-gated push hub for Vigil.
//!
//! The hub pushes server events to connected administrators. Admission is
//! decided once per connection, at connect time, by an
//! [`AuthorizationOracle`]; everything after that is plain broadcast.
//!
//! # Key types
//!
//! - [`PushHub`] — connect/disconnect lifecycle capability
//! - [`BroadcastHub`] — base substrate: registry, groups, broadcast
//! - [`ConnectionGate`] — wraps any hub with an oracle check
//! - [`SessionOracle`] — oracle backed by an [`AccountDirectory`]
//! - [`ConnectionState`] — per-connection lifecycle state machine
//!
//! ```text
//! accept ──→ ConnectionGate ──(has_admin?)──→ BroadcastHub
//!                  │ no
//!                  ▼
//!               abort
//! ```

mod directory;
mod error;
mod gate;
mod hub;
mod oracle;
mod state;

pub use directory::{Account, AccountDirectory, InMemoryDirectory};
pub use error::HubError;
pub use gate::{ConnectionGate, PrivilegedHub};
pub use hub::{Admission, BroadcastHub, Peer, PeerSender, PushHub, Target};
pub use oracle::{AuthorizationOracle, OracleConfig, SessionOracle};
pub use state::ConnectionState;
