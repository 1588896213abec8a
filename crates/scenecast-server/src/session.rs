//! Viewer sessions
//!
//! A session is transport plumbing only: an outbound queue fed by the
//! broadcaster and an inbound path into the server. It never owns
//! canonical state, so dropping it loses nothing.

use crate::error::{Result, ServerError, TransportError};
use crate::server::ServerInner;
use chrono::{DateTime, Utc};
use scenecast_gui::DispatchReport;
use scenecast_protocol::{ClientMessage, Envelope, SessionId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Broadcaster-side record of one connected viewer
#[derive(Debug)]
pub(crate) struct SessionEntry {
    sender: mpsc::Sender<Arc<Envelope>>,
    pub(crate) connected_at: DateTime<Utc>,
    last_seq: AtomicU64,
}

impl SessionEntry {
    pub(crate) fn new(sender: mpsc::Sender<Arc<Envelope>>, last_seq: u64) -> Self {
        Self {
            sender,
            connected_at: Utc::now(),
            last_seq: AtomicU64::new(last_seq),
        }
    }

    /// Queue without waiting
    pub(crate) fn enqueue(&self, envelope: Arc<Envelope>) -> std::result::Result<(), TrySendError<Arc<Envelope>>> {
        let seq = envelope.seq;
        self.sender.try_send(envelope)?;
        self.last_seq.store(seq, Ordering::Release);
        Ok(())
    }

    /// Sequence number of the last envelope queued to this session
    pub(crate) fn last_seq(&self) -> u64 {
        self.last_seq.load(Ordering::Acquire)
    }
}

/// Cloneable inbound path of one session
///
/// Handed to whatever reads the viewer's frames; each call applies one
/// viewer event and runs the triggered observers before returning.
#[derive(Debug, Clone)]
pub struct InboundPort {
    session: SessionId,
    server: Weak<ServerInner>,
}

impl InboundPort {
    /// Session the events are attributed to
    #[inline]
    #[must_use]
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Apply one viewer event
    ///
    /// Events that do not apply (unknown or disabled widget, bad value) are
    /// dropped with a warning and yield an empty report.
    ///
    /// # Errors
    /// Returns [`ServerError::ServerGone`] if the server was stopped or dropped.
    pub fn handle_message(&self, message: ClientMessage) -> Result<DispatchReport> {
        let server = self.server.upgrade().ok_or(ServerError::ServerGone)?;
        server.handle_client_message(self.session, message)
    }

    /// Decode and apply one JSON text frame
    ///
    /// # Errors
    /// Returns [`TransportError::Decode`] for malformed frames, otherwise as
    /// [`Self::handle_message`].
    pub fn handle_text(&self, text: &str) -> Result<DispatchReport> {
        let message = ClientMessage::from_json(text).map_err(TransportError::Decode)?;
        self.handle_message(message)
    }
}

/// One connected viewer
///
/// The first envelope is always the full snapshot; live mutations follow in
/// sequence order. Dropping the session disconnects it.
#[derive(Debug)]
pub struct ViewerSession {
    id: SessionId,
    connected_at: DateTime<Utc>,
    server: Weak<ServerInner>,
    receiver: mpsc::Receiver<Arc<Envelope>>,
}

impl ViewerSession {
    pub(crate) fn new(
        id: SessionId,
        connected_at: DateTime<Utc>,
        server: Weak<ServerInner>,
        receiver: mpsc::Receiver<Arc<Envelope>>,
    ) -> Self {
        Self {
            id,
            connected_at,
            server,
            receiver,
        }
    }

    /// Session identity
    #[inline]
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// When the session was opened
    #[inline]
    #[must_use]
    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Next outbound envelope; `None` once the session has been torn down
    /// and its queue drained
    pub async fn recv(&mut self) -> Option<Arc<Envelope>> {
        self.receiver.recv().await
    }

    /// Next queued envelope without waiting
    pub fn try_recv(&mut self) -> Option<Arc<Envelope>> {
        self.receiver.try_recv().ok()
    }

    /// Everything queued right now
    pub fn drain(&mut self) -> Vec<Arc<Envelope>> {
        std::iter::from_fn(|| self.receiver.try_recv().ok()).collect()
    }

    /// Inbound path for this session
    #[must_use]
    pub fn inbound(&self) -> InboundPort {
        InboundPort {
            session: self.id,
            server: self.server.clone(),
        }
    }

    /// Shorthand for `self.inbound().handle_message(message)`
    ///
    /// # Errors
    /// See [`InboundPort::handle_message`].
    pub fn handle_message(&self, message: ClientMessage) -> Result<DispatchReport> {
        self.inbound().handle_message(message)
    }

    /// Shorthand for `self.inbound().handle_text(text)`
    ///
    /// # Errors
    /// See [`InboundPort::handle_text`].
    pub fn handle_text(&self, text: &str) -> Result<DispatchReport> {
        self.inbound().handle_text(text)
    }

    /// Whether the broadcaster still delivers to this session
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.server
            .upgrade()
            .is_some_and(|server| server.broadcaster.sessions.contains_key(&self.id))
    }

    /// Sequence number of the last envelope queued to this session
    #[must_use]
    pub fn last_seq(&self) -> Option<u64> {
        let server = self.server.upgrade()?;
        let entry = server.broadcaster.sessions.get(&self.id)?;
        Some(entry.last_seq())
    }

    /// Tear the session down
    pub fn disconnect(self) {
        drop(self);
    }
}

impl Drop for ViewerSession {
    fn drop(&mut self) {
        if let Some(server) = self.server.upgrade() {
            server.broadcaster.disconnect(self.id);
        }
    }
}
