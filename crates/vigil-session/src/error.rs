//! Error types for the client session layer.

/// A failed call to the remote account API.
///
/// Only the status class matters to the session cache, so the variants
/// mirror the classes it distinguishes rather than every HTTP status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// 401: there is no valid session.
    #[error("not signed in")]
    Unauthorized,

    /// 403: the account exists but is disabled or forbidden to act.
    #[error("account is disabled")]
    Forbidden,

    /// Any other non-success status.
    #[error("server responded with status {0}")]
    Status(u16),

    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),
}

/// How the session cache reacts to an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Force a sign-out, no retry.
    PrivilegeRevoked,
    /// Expected steady state, no retry.
    Unauthenticated,
    /// Retry after a fixed delay, counted toward the retry budget.
    Transient,
}

impl ApiError {
    /// Maps a raw HTTP status to an error.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            other => Self::Status(other),
        }
    }

    /// The HTTP status behind this error, if there was a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized => Some(401),
            Self::Forbidden => Some(403),
            Self::Status(code) => Some(*code),
            Self::Network(_) => None,
        }
    }

    /// Classifies the error. Revocation is checked before
    /// unauthenticated; everything else is transient.
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Forbidden => FailureClass::PrivilegeRevoked,
            Self::Unauthorized => FailureClass::Unauthenticated,
            Self::Status(_) | Self::Network(_) => FailureClass::Transient,
        }
    }
}

/// Errors from talking to the session cache itself.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The cache actor has stopped.
    #[error("session cache is closed")]
    CacheClosed,
}
