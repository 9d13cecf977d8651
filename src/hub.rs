//! Fan-out of position updates to connected viewers
//!
//! Each viewer session owns a bounded channel. Publishing never waits on a
//! viewer: an update that does not fit in a session's channel is dropped for
//! that session only, and sessions whose receiver is gone are pruned. Delivery
//! is at most once, there is no replay for late joiners.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

use crate::models::PositionUpdate;

/// Process-unique viewer connection identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sending half of a viewer connection
#[derive(Debug, Clone)]
pub struct ViewerSession {
    id: SessionId,
    tx: mpsc::Sender<PositionUpdate>,
}

impl ViewerSession {
    pub fn id(&self) -> SessionId {
        self.id
    }
}

/// Outcome of a single publish
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub dropped: usize,
}

pub struct Hub {
    sessions: RwLock<HashMap<SessionId, mpsc::Sender<PositionUpdate>>>,
    next_id: AtomicU64,
    session_buffer: usize,
}

impl Hub {
    /// Create a hub whose sessions buffer up to `session_buffer` updates
    pub fn new(session_buffer: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            session_buffer: session_buffer.max(1),
        }
    }

    /// Allocate a session and its receiving channel. The session receives
    /// nothing until it is registered.
    pub fn open_session(&self) -> (ViewerSession, mpsc::Receiver<PositionUpdate>) {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.session_buffer);
        (ViewerSession { id, tx }, rx)
    }

    /// Add a session to the active set. Returns `false` if it was already present.
    pub async fn register(&self, session: &ViewerSession) -> bool {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return false;
        }
        sessions.insert(session.id, session.tx.clone());
        debug!("Registered viewer session {}", session.id);
        true
    }

    /// Remove a session. Returns `false` if it was not registered.
    pub async fn unregister(&self, id: SessionId) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            debug!("Unregistered viewer session {}", id);
        }
        removed
    }

    /// Deliver `update` to every session registered at the time of the call
    pub async fn publish(&self, update: &PositionUpdate) -> Delivery {
        let mut delivery = Delivery::default();
        let mut closed = Vec::new();

        {
            let sessions = self.sessions.read().await;
            for (id, tx) in sessions.iter() {
                match tx.try_send(update.clone()) {
                    Ok(()) => delivery.delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!("Viewer session {} is lagging, dropping update", id);
                        delivery.dropped += 1;
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        delivery.dropped += 1;
                        closed.push(*id);
                    }
                }
            }
        }

        if !closed.is_empty() {
            let mut sessions = self.sessions.write().await;
            for id in closed {
                sessions.remove(&id);
                debug!("Pruned closed viewer session {}", id);
            }
        }

        delivery
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
