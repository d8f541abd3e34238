//! Account lookup used by the authorization oracle.
//!
//! Vigil does not store accounts. The [`AccountDirectory`] trait is the
//! seam to whatever does: a database, an identity service, or the
//! [`InMemoryDirectory`] used in development and tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;
use rand::Rng;
use vigil_protocol::{AccountId, Role};

/// The slice of an account the oracle needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub user_name: String,
    pub role: Role,
}

/// Resolves a session credential to the account it belongs to.
///
/// Implementations must read live data: the result decides whether a
/// connection is admitted and is never cached by the hub.
pub trait AccountDirectory: Send + Sync + 'static {
    /// Returns the account behind `token`, or `None` if the token is
    /// unknown, expired, or revoked.
    fn resolve(
        &self,
        token: &str,
    ) -> impl Future<Output = Option<Account>> + Send;
}

#[derive(Debug, Default)]
struct DirectoryState {
    accounts: HashMap<AccountId, Account>,
    sessions: HashMap<String, AccountId>,
}

/// A process-local [`AccountDirectory`].
///
/// Cloning is cheap and every clone sees the same accounts, so a test can
/// hand one clone to the oracle and keep another to change roles.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    state: Arc<RwLock<DirectoryState>>,
}

impl InMemoryDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an account.
    pub fn insert(&self, account: Account) {
        self.state.write().accounts.insert(account.id, account);
    }

    /// Issues a new session token for an existing account.
    ///
    /// Returns `None` if the account is unknown.
    pub fn issue_session(&self, id: AccountId) -> Option<String> {
        let mut state = self.state.write();
        if !state.accounts.contains_key(&id) {
            return None;
        }
        let token = generate_token();
        state.sessions.insert(token.clone(), id);
        tracing::debug!(account = %id, "session issued");
        Some(token)
    }

    /// Invalidates a session token. Returns `true` if it existed.
    pub fn revoke_session(&self, token: &str) -> bool {
        self.state.write().sessions.remove(token).is_some()
    }

    /// Changes an account's role. Returns `false` if the account is unknown.
    ///
    /// Existing connections are unaffected; only the next connection
    /// attempt sees the new role.
    pub fn set_role(&self, id: AccountId, role: Role) -> bool {
        match self.state.write().accounts.get_mut(&id) {
            Some(account) => {
                account.role = role;
                true
            }
            None => false,
        }
    }
}

impl AccountDirectory for InMemoryDirectory {
    async fn resolve(&self, token: &str) -> Option<Account> {
        let state = self.state.read();
        let id = state.sessions.get(token)?;
        state.accounts.get(id).cloned()
    }
}

/// Generates a random 32-character hex string (128 bits of entropy).
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
