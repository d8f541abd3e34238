//! Scripted collaborators shared by the session integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use vigil_protocol::{AccountId, IdentitySnapshot, Role};
use vigil_session::{AccountApi, ApiError, Navigator, Notice, Notifier};

pub fn profile(name: &str, role: Role) -> IdentitySnapshot {
    IdentitySnapshot {
        user_id: AccountId(1),
        user_name: name.into(),
        email: None,
        bio: None,
        real_name: None,
        avatar: None,
        role,
    }
}

/// An [`AccountApi`] that replays scripted responses.
///
/// Profile responses are popped from the script; once it is empty the
/// fallback is returned forever. Every call time is recorded.
pub struct ScriptedApi {
    script: Mutex<VecDeque<Result<IdentitySnapshot, ApiError>>>,
    fallback: Result<IdentitySnapshot, ApiError>,
    pub fetch_times: Mutex<Vec<Instant>>,
    fetch_delay: Duration,
    logout: Result<(), ApiError>,
    logout_delay: Duration,
    pub logout_calls: AtomicUsize,
}

impl ScriptedApi {
    pub fn new(fallback: Result<IdentitySnapshot, ApiError>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            fetch_times: Mutex::new(Vec::new()),
            fetch_delay: Duration::ZERO,
            logout: Ok(()),
            logout_delay: Duration::ZERO,
            logout_calls: AtomicUsize::new(0),
        }
    }

    pub fn then(self, response: Result<IdentitySnapshot, ApiError>) -> Self {
        self.script.lock().unwrap().push_back(response);
        self
    }

    pub fn fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    pub fn logout_result(mut self, result: Result<(), ApiError>) -> Self {
        self.logout = result;
        self
    }

    pub fn logout_delay(mut self, delay: Duration) -> Self {
        self.logout_delay = delay;
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetch_times.lock().unwrap().len()
    }

    pub fn logouts(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }
}

impl AccountApi for ScriptedApi {
    async fn fetch_profile(&self) -> Result<IdentitySnapshot, ApiError> {
        self.fetch_times.lock().unwrap().push(Instant::now());
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }

    async fn log_out(&self) -> Result<(), ApiError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        if !self.logout_delay.is_zero() {
            tokio::time::sleep(self.logout_delay).await;
        }
        self.logout.clone()
    }
}

/// Records every navigation.
#[derive(Clone, Default)]
pub struct RecordingNavigator {
    pub routes: Arc<Mutex<Vec<String>>>,
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: &str) {
        self.routes.lock().unwrap().push(route.to_string());
    }
}

impl RecordingNavigator {
    pub fn routes(&self) -> Vec<String> {
        self.routes.lock().unwrap().clone()
    }
}

/// Records every notice.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    pub notices: Arc<Mutex<Vec<Notice>>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}
