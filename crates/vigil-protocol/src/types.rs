//! Core protocol types for Vigil's wire format.
//!
//! Two families of types live here:
//!
//! - **Push types** ([`Envelope`], [`Push`], [`LogMessage`]) — what the
//!   privileged hub sends to connected administrators. The channel is
//!   push-only: clients never send business payloads back.
//! - **Identity types** ([`IdentitySnapshot`], [`Role`], [`AccountId`]) —
//!   the profile the client-side session cache holds for the current user.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for an account.
///
/// `#[serde(transparent)]` keeps it a plain number on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A-{}", self.0)
    }
}

/// Privilege level of an account.
///
/// Variants are declared from least to most privileged, so the derived
/// `Ord` can be used for "at least" checks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "PascalCase")]
pub enum Role {
    /// Disabled account. May not act at all.
    Banned,
    /// Regular participant.
    #[default]
    User,
    /// May observe but not administer.
    Monitor,
    /// Full administrative privilege.
    Admin,
}

impl Role {
    /// Returns `true` for [`Role::Admin`].
    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Banned => "Banned",
            Self::User => "User",
            Self::Monitor => "Monitor",
            Self::Admin => "Admin",
        };
        f.write_str(name)
    }
}

/// The authenticated user's profile as last returned by the server.
///
/// Snapshots are immutable values: the session cache replaces them
/// wholesale on every successful refresh and never patches fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentitySnapshot {
    pub user_id: AccountId,
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub role: Role,
}

// ---------------------------------------------------------------------------
// Push types
// ---------------------------------------------------------------------------

/// Severity of a pushed log line.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "PascalCase")]
pub enum LogLevel {
    Debug,
    #[default]
    Information,
    Warning,
    Error,
    Critical,
}

/// A server log line forwarded to administrators in real time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogMessage {
    /// Milliseconds since the Unix epoch.
    pub time: u64,
    /// User the log line is about, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Remote address the action came from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    pub msg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub level: LogLevel,
}

/// A server-to-client push.
///
/// Serialized as `{"method": "...", "args": ...}` so browser clients can
/// dispatch on the method name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "args")]
pub enum Push {
    /// A new server log line.
    #[serde(rename = "ReceivedLog")]
    Log(LogMessage),
}

/// The outer wrapper for every push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-hub sequence number, starting at 1.
    pub seq: u64,
    /// Milliseconds since the hub started.
    pub timestamp: u64,
    /// The push itself.
    pub payload: Push,
}
