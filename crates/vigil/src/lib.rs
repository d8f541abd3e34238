//! # Vigil
//!
//! Privileged real-time notifications and client session consistency.
//!
//! On the server, Vigil runs a WebSocket hub that only administrators can
//! join: each connection is checked once, at connect time, by an
//! [`AuthorizationOracle`](vigil_hub::AuthorizationOracle), and admitted
//! connections receive pushes published through an [`AdminFeed`].
//!
//! On the client, [`ClientSession`](vigil_session::ClientSession) keeps
//! the cached identity in step with the server and turns a revoked
//! account into a clean, local sign-out.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vigil::prelude::*;
//!
//! # async fn demo() -> Result<(), VigilError> {
//! let directory = InMemoryDirectory::new();
//! let server = HubServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .build(SessionOracle::new(directory))
//!     .await?;
//! let feed = server.feed();
//! tokio::spawn(server.run());
//! feed.push_log(LogMessage {
//!     time: 0,
//!     name: None,
//!     ip: None,
//!     msg: "server started".into(),
//!     status: None,
//!     level: LogLevel::Information,
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod feed;
mod handler;
mod server;

pub use error::VigilError;
pub use feed::AdminFeed;
pub use server::{HubServer, HubServerBuilder};

/// Re-exports everything needed to run a hub or a client session.
pub mod prelude {
    pub use crate::{AdminFeed, HubServer, HubServerBuilder, VigilError};
    pub use vigil_hub::{
        Account, AccountDirectory, AuthorizationOracle, ConnectionGate,
        HubError, InMemoryDirectory, OracleConfig, PushHub, SessionOracle,
        Target,
    };
    pub use vigil_protocol::{
        AccountId, Envelope, IdentitySnapshot, LogLevel, LogMessage, Push,
        Role,
    };
    pub use vigil_session::{
        AccountApi, ApiError, ClientSession, Navigator, Notice, Notifier,
        SessionCacheConfig, SignOutConfig, SignOutOutcome,
    };
    pub use vigil_transport::{ConnectionContext, ConnectionId};
}
