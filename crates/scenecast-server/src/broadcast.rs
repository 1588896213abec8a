//! Broadcaster and mutation log
//!
//! Every accepted mutation is stamped with the next sequence number, kept
//! in a bounded log, and queued to every connected session. Queueing never
//! waits: a session whose queue is full or closed is torn down instead of
//! holding up the writer.

use crate::session::SessionEntry;
use dashmap::DashMap;
use parking_lot::Mutex;
use scenecast_protocol::{Envelope, Origin, ServerMessage, SessionId};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;

/// Bounded ring of the most recent envelopes
#[derive(Debug)]
pub struct MutationLog {
    capacity: usize,
    inner: Mutex<VecDeque<Arc<Envelope>>>,
}

impl MutationLog {
    /// Create a log keeping at most `capacity` envelopes
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
        }
    }

    /// Append, evicting the oldest entry when full
    pub fn append(&self, envelope: Arc<Envelope>) {
        let mut guard = self.inner.lock();
        if guard.len() == self.capacity {
            guard.pop_front();
        }
        guard.push_back(envelope);
    }

    /// Retained envelopes, oldest first
    #[must_use]
    pub fn recent(&self) -> Vec<Envelope> {
        self.inner.lock().iter().map(|e| Envelope::clone(e)).collect()
    }

    /// Number of retained envelopes
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Check if nothing has been logged
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Sequence number of the newest entry
    #[must_use]
    pub fn last_seq(&self) -> Option<u64> {
        self.inner.lock().back().map(|e| e.seq)
    }
}

/// Fan-out of sequenced mutations to live sessions
#[derive(Debug)]
pub(crate) struct Broadcaster {
    pub(crate) sessions: DashMap<SessionId, SessionEntry>,
    pub(crate) log: MutationLog,
    echo_to_origin: bool,
}

impl Broadcaster {
    pub(crate) fn new(log_capacity: usize, echo_to_origin: bool) -> Self {
        Self {
            sessions: DashMap::new(),
            log: MutationLog::new(log_capacity),
            echo_to_origin,
        }
    }

    /// Stamp and queue `messages` in order
    ///
    /// Must be called while holding the state lock so that sequence order,
    /// canonical order and per-session queue order agree.
    pub(crate) fn publish(&self, seq: &mut u64, messages: Vec<ServerMessage>, origin: Origin) {
        if messages.is_empty() {
            return;
        }
        let skip = if self.echo_to_origin {
            None
        } else {
            origin.session()
        };
        let mut dropped: Vec<SessionId> = Vec::new();

        for message in messages {
            *seq += 1;
            let envelope = Arc::new(Envelope { seq: *seq, message });
            tracing::trace!(seq = envelope.seq, kind = envelope.message.name(), "mutation");
            self.log.append(Arc::clone(&envelope));

            for entry in &self.sessions {
                let id = *entry.key();
                if Some(id) == skip || dropped.contains(&id) {
                    continue;
                }
                match entry.value().enqueue(Arc::clone(&envelope)) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(session = %id, seq = envelope.seq, "outbound queue full, dropping session");
                        dropped.push(id);
                    }
                    Err(TrySendError::Closed(_)) => {
                        tracing::debug!(session = %id, "outbound queue closed, dropping session");
                        dropped.push(id);
                    }
                }
            }
        }

        for id in dropped {
            self.disconnect(id);
        }
    }

    /// Forget a session; its queue closes once drained
    pub(crate) fn disconnect(&self, id: SessionId) -> bool {
        match self.sessions.remove(&id) {
            Some((_, entry)) => {
                tracing::info!(
                    session = %id,
                    connected_at = %entry.connected_at,
                    last_seq = entry.last_seq(),
                    "viewer disconnected"
                );
                true
            }
            None => false,
        }
    }

    /// Drop every session
    pub(crate) fn disconnect_all(&self) -> usize {
        let ids: Vec<SessionId> = self.sessions.iter().map(|e| *e.key()).collect();
        ids.into_iter().filter(|id| self.disconnect(*id)).count()
    }
}
