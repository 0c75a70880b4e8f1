//! Client-held session state and the per-request context that mediates access to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

/// A complete session record: who the visitor is and where they currently are.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub id: i64,
    pub start_time: DateTime<Utc>,
    pub previous_path: String,
}

/// Cookie payload as stored on the client. Any field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionCookie {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_path: Option<String>,
}

impl SessionCookie {
    pub fn assigned(id: i64, start_time: DateTime<Utc>, previous_path: &str) -> Self {
        Self {
            id: Some(id),
            start_time: Some(start_time),
            previous_path: Some(previous_path.to_string()),
        }
    }

    /// Identity with no current page; the next tracked request fills in the rest.
    pub fn identity_only(id: i64) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// `Some` only when all three fields are present.
    pub fn state(&self) -> Option<SessionState> {
        Some(SessionState {
            id: self.id?,
            start_time: self.start_time?,
            previous_path: self.previous_path.clone()?,
        })
    }
}

#[derive(Debug)]
struct ContextInner {
    cookie: SessionCookie,
    fresh: bool,
    dirty: bool,
}

/// Request-scoped handle on the session. Cloned into request extensions so
/// handlers read the same value the tracker writes back.
#[derive(Debug, Clone)]
pub struct SessionContext {
    inner: Arc<Mutex<ContextInner>>,
}

impl SessionContext {
    /// Session carried in by the request; nothing to write back yet.
    pub fn existing(cookie: SessionCookie) -> Self {
        Self::build(cookie, false)
    }

    /// Session assigned while handling this request.
    pub fn fresh(cookie: SessionCookie) -> Self {
        Self::build(cookie, true)
    }

    fn build(cookie: SessionCookie, fresh: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ContextInner {
                cookie,
                fresh,
                dirty: fresh,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ContextInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn read<R>(&self, f: impl FnOnce(&SessionCookie) -> R) -> R {
        f(&self.lock().cookie)
    }

    /// Mutate the cookie; the tracker re-issues it on the way out.
    pub fn write<R>(&self, f: impl FnOnce(&mut SessionCookie) -> R) -> R {
        let mut inner = self.lock();
        inner.dirty = true;
        f(&mut inner.cookie)
    }

    pub fn session_id(&self) -> Option<i64> {
        self.read(|cookie| cookie.id)
    }

    pub fn state(&self) -> Option<SessionState> {
        self.read(SessionCookie::state)
    }

    pub fn snapshot(&self) -> SessionCookie {
        self.read(|cookie| cookie.clone())
    }

    pub fn is_fresh(&self) -> bool {
        self.lock().fresh
    }

    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }
}
