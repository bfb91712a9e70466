//! Session Management
//!
//! A session owns one conversation, one [`SharedState`] and the frontend
//! tool calls still waiting for a client-supplied result. Sessions live in
//! a [`SessionManager`]; each sits behind its own mutex, held for the
//! duration of a turn, so two turns never overlap on the same session.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::message::{Conversation, Message};
use crate::state::{SharedState, StateSnapshot};
use crate::tool::{ToolCall, ToolResult};

/// Unique session identifier (the client's thread id)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tool call handed to the client and not yet answered
#[derive(Clone, Debug)]
pub struct PendingCall {
    pub call: ToolCall,
    pub requested_at: DateTime<Utc>,
}

/// A complete agent session
#[derive(Debug)]
pub struct Session {
    /// Unique identifier
    pub id: SessionId,

    /// Conversation history
    pub conversation: Conversation,

    /// State mutated by tools and mirrored to the client
    pub state: SharedState,

    pending: Vec<PendingCall>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last activity timestamp
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a session with freshly seeded state
    pub fn new(id: SessionId, seed: StateSnapshot) -> Self {
        let now = Utc::now();
        Self {
            id,
            conversation: Conversation::new(),
            state: SharedState::new(seed),
            pending: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Update the activity timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Message count
    pub fn message_count(&self) -> usize {
        self.conversation.len()
    }

    pub fn pending_calls(&self) -> &[PendingCall] {
        &self.pending
    }

    pub fn is_pending(&self, tool_call_id: &str) -> bool {
        self.pending.iter().any(|p| p.call.id == tool_call_id)
    }

    /// Park a call until the client answers it
    pub fn add_pending(&mut self, call: ToolCall) {
        self.pending.push(PendingCall {
            call,
            requested_at: Utc::now(),
        });
    }

    /// Mark a pending call answered. Returns false if it was not pending.
    pub fn resolve_pending(&mut self, tool_call_id: &str) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.call.id != tool_call_id);
        self.pending.len() != before
    }

    /// Close every pending call with a failed result.
    ///
    /// Returns the ids of the calls that were closed.
    pub fn cancel_pending(&mut self, reason: &str) -> Vec<String> {
        let cancelled: Vec<PendingCall> = std::mem::take(&mut self.pending);
        cancelled
            .into_iter()
            .map(|p| {
                self.record_failure(&p.call, reason);
                p.call.id
            })
            .collect()
    }

    /// Close pending calls older than `timeout` with a failed result
    pub fn expire_pending(&mut self, timeout: Duration, now: DateTime<Utc>) -> usize {
        let (expired, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|p| now - p.requested_at >= timeout);
        self.pending = kept;

        for p in &expired {
            self.record_failure(&p.call, "timed out waiting for a response");
        }
        expired.len()
    }

    fn record_failure(&mut self, call: &ToolCall, reason: &str) {
        let result = ToolResult::failure(&call.name, reason).with_id(&call.id);
        self.conversation.push(Message::tool(result.content(), &call.id));
    }
}

/// Outcome of one [`SessionManager::sweep`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_calls: usize,
    pub removed_sessions: usize,
}

/// In-memory registry of live sessions
pub struct SessionManager {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<Session>>>>,
    seed: StateSnapshot,
}

impl SessionManager {
    /// New sessions start from `seed`
    pub fn new(seed: StateSnapshot) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            seed,
        }
    }

    /// Fetch a session, creating it on first use
    pub async fn get_or_create(&self, id: &SessionId) -> Arc<Mutex<Session>> {
        if let Some(session) = self.sessions.read().await.get(id) {
            return session.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(id.clone())
            .or_insert_with(|| {
                tracing::info!(session = %id, "Session created");
                Arc::new(Mutex::new(Session::new(id.clone(), self.seed.clone())))
            })
            .clone()
    }

    pub async fn get(&self, id: &SessionId) -> Option<Arc<Mutex<Session>>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Tear a session down
    pub async fn remove(&self, id: &SessionId) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Expire stale pending calls and drop idle sessions.
    ///
    /// Sessions with a turn in flight are skipped. Idle candidates are
    /// checked again under the write lock, so a request that fetched the
    /// session after the first pass keeps it alive.
    pub async fn sweep(&self, idle_ttl: Duration, pending_timeout: Duration) -> SweepReport {
        let now = Utc::now();
        let mut report = SweepReport::default();
        let mut idle = Vec::new();

        {
            let sessions = self.sessions.read().await;
            for (id, session) in sessions.iter() {
                let Ok(mut session) = session.try_lock() else {
                    continue;
                };

                let expired = session.expire_pending(pending_timeout, now);
                if expired > 0 {
                    tracing::info!(session = %id, expired, "Expired pending tool calls");
                    report.expired_calls += expired;
                }

                if now - session.updated_at >= idle_ttl {
                    idle.push(id.clone());
                }
            }
        }

        if !idle.is_empty() {
            let mut sessions = self.sessions.write().await;
            for id in idle {
                let evictable = sessions
                    .get(&id)
                    .is_some_and(|session| is_evictable(session, idle_ttl, Utc::now()));
                if !evictable {
                    tracing::debug!(session = %id, "Session became active during sweep, keeping it");
                    continue;
                }

                sessions.remove(&id);
                tracing::info!(session = %id, "Session removed after idle timeout");
                report.removed_sessions += 1;
            }
        }

        report
    }
}

/// Unreferenced outside the registry, unlocked and still idle
fn is_evictable(session: &Arc<Mutex<Session>>, idle_ttl: Duration, now: DateTime<Utc>) -> bool {
    if Arc::strong_count(session) > 1 {
        return false;
    }
    session
        .try_lock()
        .is_ok_and(|session| now - session.updated_at >= idle_ttl)
}
