//! Wire protocol for Vigil.
//!
//! - **Types** ([`Envelope`], [`Push`], [`IdentitySnapshot`], etc.) —
//!   the structures that travel between server and client.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how an envelope becomes
//!   the frame the hub fans out.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while doing so.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Hub (connections, groups)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    AccountId, Envelope, IdentitySnapshot, LogLevel, LogMessage, Push, Role,
};
