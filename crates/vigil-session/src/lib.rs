//! Client-side session consistency for Vigil.
//!
//! This crate keeps the client's idea of "who is signed in" in step with
//! the server:
//!
//! 1. **Session cache** — [`SessionCache`] actor that fetches the profile,
//!    classifies failures, and retries transient ones on a fixed delay
//! 2. **Resource cache** — [`ResourceCache`] of other fetched data, dropped
//!    by [`InvalidationScope`]
//! 3. **Sign-out** — [`SignOutCoordinator`] that clears everything locally
//!    whatever the server answers
//!
//! [`ClientSession`] wires the three together.
//!
//! ```text
//! AccountApi ──fetch_profile──→ SessionCache ──watch──→ readers
//!                                   │ 403
//!                                   ▼
//! AccountApi ←──log_out── SignOutCoordinator ──→ Navigator, Notifier
//! ```

mod api;
mod cache;
mod client;
mod error;
mod resources;
mod signout;

pub use api::AccountApi;
pub use cache::{
    Outcome, Phase, Revoked, SessionCache, SessionCacheConfig, SessionView,
};
pub use client::ClientSession;
pub use error::{ApiError, FailureClass, SessionError};
pub use resources::{InvalidationScope, ResourceCache};
pub use signout::{
    Navigator, Notice, NoticeLevel, Notifier, SignOutConfig,
    SignOutCoordinator, SignOutOutcome,
};
