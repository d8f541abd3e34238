//! Envelope codecs.
//!
//! The hub encodes each envelope once and hands the same frame to every
//! recipient, so [`Codec::encode`] returns a shared `Arc<[u8]>` rather
//! than an owned buffer per peer.

use std::sync::Arc;

use crate::{Envelope, ProtocolError};

/// Converts envelopes to and from wire frames.
pub trait Codec: Send + Sync + 'static {
    /// Encodes one envelope into a frame shared by all recipients.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the envelope cannot be written.
    fn encode(&self, envelope: &Envelope) -> Result<Arc<[u8]>, ProtocolError>;

    /// Reads a frame back into an envelope, as a subscribing client does.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the frame is not an envelope.
    fn decode(&self, frame: &[u8]) -> Result<Envelope, ProtocolError>;
}

/// Writes envelopes as JSON text, the form browser clients dispatch on.
///
/// ```rust
/// use vigil_protocol::{Codec, Envelope, JsonCodec, LogLevel, LogMessage, Push};
///
/// let envelope = Envelope {
///     seq: 1,
///     timestamp: 0,
///     payload: Push::Log(LogMessage {
///         time: 0,
///         name: None,
///         ip: None,
///         msg: "server started".into(),
///         status: None,
///         level: LogLevel::Information,
///     }),
/// };
///
/// let frame = JsonCodec.encode(&envelope).unwrap();
/// assert!(std::str::from_utf8(&frame).unwrap().contains("\"ReceivedLog\""));
/// assert_eq!(JsonCodec.decode(&frame).unwrap(), envelope);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode(&self, envelope: &Envelope) -> Result<Arc<[u8]>, ProtocolError> {
        serde_json::to_vec(envelope)
            .map(Arc::from)
            .map_err(ProtocolError::Encode)
    }

    fn decode(&self, frame: &[u8]) -> Result<Envelope, ProtocolError> {
        serde_json::from_slice(frame).map_err(ProtocolError::Decode)
    }
}
