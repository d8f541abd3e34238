//! The authorization oracle: "is this caller an administrator right now?"
//!
//! The hub asks this question exactly once per connection attempt, with
//! the context captured from the upgrade request. The answer is a plain
//! `bool`. A missing, malformed, or unknown credential is simply `false`
//! so the hub only ever has two outcomes to handle.

use std::future::Future;

use vigil_transport::ConnectionContext;

use crate::AccountDirectory;

/// Decides whether a connection context belongs to an administrator.
///
/// Implementations must not mutate the context or any shared state, and
/// must be safe to call concurrently for many connection attempts.
pub trait AuthorizationOracle: Send + Sync + 'static {
    /// Returns `true` only if the caller currently holds admin privilege.
    fn has_admin(
        &self,
        ctx: &ConnectionContext,
    ) -> impl Future<Output = bool> + Send;
}

/// Where [`SessionOracle`] looks for a credential.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Name of the session cookie. Checked first.
    pub cookie_name: String,
    /// Name of the query-string parameter. Checked last, after the
    /// `Authorization: Bearer` header.
    pub query_param: String,
    /// Longest credential accepted before it is treated as malformed.
    pub max_token_len: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            cookie_name: "GZCTF_Token".to_string(),
            query_param: "access_token".to_string(),
            max_token_len: 512,
        }
    }
}

/// An [`AuthorizationOracle`] that resolves a session credential through
/// an [`AccountDirectory`] and checks the account's live role.
#[derive(Debug, Clone)]
pub struct SessionOracle<D> {
    directory: D,
    config: OracleConfig,
}

impl<D: AccountDirectory> SessionOracle<D> {
    /// Creates an oracle with the default credential locations.
    pub fn new(directory: D) -> Self {
        Self::with_config(directory, OracleConfig::default())
    }

    /// Creates an oracle with custom credential locations.
    pub fn with_config(directory: D, config: OracleConfig) -> Self {
        Self { directory, config }
    }

    /// Picks the first credential present, in cookie → bearer → query order.
    fn credential<'a>(&self, ctx: &'a ConnectionContext) -> Option<&'a str> {
        ctx.cookie(&self.config.cookie_name)
            .or_else(|| ctx.bearer_token())
            .or_else(|| ctx.query(&self.config.query_param))
    }

    fn is_well_formed(&self, token: &str) -> bool {
        !token.is_empty()
            && token.len() <= self.config.max_token_len
            && token
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b"-_.+/=".contains(&b))
    }
}

impl<D: AccountDirectory> AuthorizationOracle for SessionOracle<D> {
    async fn has_admin(&self, ctx: &ConnectionContext) -> bool {
        let Some(token) = self.credential(ctx) else {
            tracing::debug!(remote = ?ctx.remote_addr(), "no credential presented");
            return false;
        };
        if !self.is_well_formed(token) {
            tracing::debug!(remote = ?ctx.remote_addr(), "malformed credential");
            return false;
        }

        match self.directory.resolve(token).await {
            Some(account) => {
                let admin = account.role.is_admin();
                tracing::debug!(
                    account = %account.id,
                    role = %account.role,
                    admin,
                    "credential resolved"
                );
                admin
            }
            None => {
                tracing::debug!(remote = ?ctx.remote_addr(), "unknown credential");
                false
            }
        }
    }
}
