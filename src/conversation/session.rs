//! Process-wide session map with idle eviction.
//!
//! Every session sits behind its own `tokio::sync::Mutex`, so messages for
//! one identity are handled one at a time while other identities proceed.
//! The sweeper only evicts sessions it can lock without waiting; a handler
//! that acquires a session must check [`Session::is_evicted`] and fetch a
//! fresh one if the sweeper got there first.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Local, NaiveDateTime};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use super::state::ConversationState;
use crate::order::OrderDraft;

/// Source of "now" for idle tracking, dispatch years and order timestamps.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: std::sync::Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: std::sync::Mutex::new(start),
        }
    }

    pub fn set(&self, to: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Conversation state plus the order being assembled.
#[derive(Debug)]
pub struct Session {
    pub key: String,
    pub state: ConversationState,
    pub draft: OrderDraft,
    pub last_activity: NaiveDateTime,
    evicted: bool,
}

impl Session {
    fn new(key: &str, now: NaiveDateTime) -> Self {
        Self {
            key: key.to_string(),
            state: ConversationState::Start,
            draft: OrderDraft::default(),
            last_activity: now,
            evicted: false,
        }
    }

    /// Back to the main menu with an empty draft.
    pub fn reset(&mut self) {
        self.state = ConversationState::Start;
        self.draft = OrderDraft::default();
    }

    /// Whether this session was removed from the store. An evicted session
    /// must not be used further.
    pub fn is_evicted(&self) -> bool {
        self.evicted
    }

    fn is_idle(&self, now: NaiveDateTime, idle: Duration) -> bool {
        now - self.last_activity >= idle
    }
}

pub type SessionHandle = Arc<Mutex<Session>>;

#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    clock: Arc<dyn Clock>,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(clock: Arc<dyn Clock>, idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            clock,
            idle_timeout,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub async fn get(&self, key: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(key).cloned()
    }

    /// Existing session for `key`, or a new one at the main menu. The flag
    /// is `true` when the session was created by this call.
    pub async fn get_or_create(&self, key: &str) -> (SessionHandle, bool) {
        if let Some(handle) = self.get(key).await {
            return (handle, false);
        }

        let mut sessions = self.sessions.write().await;
        if let Some(handle) = sessions.get(key) {
            return (handle.clone(), false);
        }
        let handle = Arc::new(Mutex::new(Session::new(key, self.clock.now())));
        sessions.insert(key.to_string(), handle.clone());
        info!(session = %key, "Session created");
        (handle, true)
    }

    /// Drop the session. The caller holds its lock and passes the guarded
    /// session so it can be flagged as evicted.
    pub async fn remove(&self, session: &mut Session) {
        session.evicted = true;
        self.sessions.write().await.remove(&session.key);
        debug!(session = %session.key, "Session removed");
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Evict sessions idle for at least the timeout. Sessions currently
    /// being handled are skipped.
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.sessions.write().await;

        let mut evicted = Vec::new();
        for (key, handle) in sessions.iter() {
            let Ok(mut session) = handle.try_lock() else {
                continue;
            };
            if session.is_idle(now, self.idle_timeout) {
                session.evicted = true;
                evicted.push(key.clone());
            }
        }

        for key in &evicted {
            sessions.remove(key);
            info!(session = %key, "Session evicted after inactivity");
        }
        evicted.len()
    }
}
