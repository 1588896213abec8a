//! Server orchestration
//!
//! All canonical state lives behind one lock. Every mutation applies to the
//! registries and hands its messages to the broadcaster inside that lock, so
//! broadcast order always matches canonical order. Observers run after the
//! lock is released.

use crate::broadcast::Broadcaster;
use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::gui::Gui;
use crate::scene::{NodeObservers, Scene, SceneEvent, SceneEventKind, POSITION, WXYZ};
use crate::session::{SessionEntry, ViewerSession};
use parking_lot::Mutex;
use scenecast_gui::{dispatch, DispatchReport, WidgetRegistry};
use scenecast_protocol::{
    ClientMessage, Envelope, NodeId, NodeInput, Origin, ServerMessage, SessionId, Snapshot,
};
use scenecast_tree::NodeRegistry;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

/// Canonical state guarded by the server lock
#[derive(Debug, Default)]
pub(crate) struct State {
    pub(crate) nodes: NodeRegistry,
    pub(crate) widgets: WidgetRegistry,
    pub(crate) node_observers: HashMap<NodeId, NodeObservers>,
    /// Sequence number of the last published mutation
    pub(crate) seq: u64,
}

impl State {
    fn snapshot(&self) -> Snapshot {
        Snapshot {
            seq: self.seq,
            nodes: self.nodes.snapshot(),
            widgets: self.widgets.snapshot(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct ServerInner {
    pub(crate) config: ServerConfig,
    pub(crate) state: Mutex<State>,
    pub(crate) broadcaster: Broadcaster,
    stopped: AtomicBool,
}

impl ServerInner {
    pub(crate) fn ensure_running(&self) -> Result<()> {
        if self.stopped.load(Ordering::Acquire) {
            Err(ServerError::ServerGone)
        } else {
            Ok(())
        }
    }

    /// Apply a host mutation and publish what it produced
    pub(crate) fn mutate<T>(
        &self,
        apply: impl FnOnce(&mut State) -> Result<(T, Vec<ServerMessage>)>,
    ) -> Result<T> {
        self.ensure_running()?;
        let mut state = self.state.lock();
        let (out, messages) = apply(&mut state)?;
        self.publish(&mut state, messages, Origin::Host);
        Ok(out)
    }

    /// Read canonical state
    pub(crate) fn read<T>(&self, read: impl FnOnce(&State) -> T) -> Result<T> {
        self.ensure_running()?;
        Ok(read(&self.state.lock()))
    }

    fn publish(&self, state: &mut State, messages: Vec<ServerMessage>, origin: Origin) {
        self.broadcaster.publish(&mut state.seq, messages, origin);
    }

    /// Events from a torn-down session are ignored. Checked under the state
    /// lock, where the broadcaster drops stalled sessions.
    fn is_registered(&self, session: SessionId) -> bool {
        let registered = self.broadcaster.sessions.contains_key(&session);
        if !registered {
            tracing::debug!(session = %session, "dropping event from disconnected session");
        }
        registered
    }

    /// Fold one viewer event into canonical state, then run its observers
    pub(crate) fn handle_client_message(
        &self,
        session: SessionId,
        message: ClientMessage,
    ) -> Result<DispatchReport> {
        self.ensure_running()?;
        let origin = Origin::Viewer(session);

        match message {
            ClientMessage::WidgetEvent { id, input } => {
                let applied = {
                    let mut state = self.state.lock();
                    if !self.is_registered(session) {
                        return Ok(DispatchReport::default());
                    }
                    match state.widgets.apply_input(id, input, origin) {
                        Ok(mut applied) => {
                            if let Some(mutation) = applied.mutation.take() {
                                // the origin holds the value it sent, not the stored one
                                let target = if applied.normalized { Origin::Host } else { origin };
                                self.publish(&mut state, vec![mutation], target);
                            }
                            applied
                        }
                        Err(err) => {
                            tracing::warn!(session = %session, widget = %id, error = %err, "dropping widget event");
                            return Ok(DispatchReport::default());
                        }
                    }
                };
                tracing::debug!(session = %session, widget = %id, observers = applied.observers.len(), "widget event applied");
                Ok(dispatch(&applied.observers, &applied.event))
            }
            ClientMessage::NodeEvent { path, input } => {
                let (observers, event) = {
                    let mut state = self.state.lock();
                    if !self.is_registered(session) {
                        return Ok(DispatchReport::default());
                    }
                    let Some(record) = state.nodes.get(&path) else {
                        tracing::warn!(session = %session, path = %path, "dropping event for absent node");
                        return Ok(DispatchReport::default());
                    };
                    let (node, kind) = (record.id, record.kind.clone());

                    let event_kind = match input {
                        NodeInput::Click => SceneEventKind::Click,
                        NodeInput::Transform { position, wxyz } => {
                            if !kind.accepts_transform() {
                                tracing::warn!(session = %session, path = %path, kind = %kind, "dropping transform for static node");
                                return Ok(DispatchReport::default());
                            }
                            let mutations = vec![
                                state.nodes.set_property(&path, node, POSITION, Value::from(position.to_vec()))?,
                                state.nodes.set_property(&path, node, WXYZ, Value::from(wxyz.to_vec()))?,
                            ];
                            self.publish(&mut state, mutations, origin);
                            SceneEventKind::Transform { position, wxyz }
                        }
                    };

                    let observers = state
                        .node_observers
                        .get(&node)
                        .map(|o| o.snapshot(&event_kind))
                        .unwrap_or_default();
                    (
                        observers,
                        SceneEvent {
                            path,
                            node,
                            kind: event_kind,
                            origin,
                        },
                    )
                };
                Ok(dispatch(&observers, &event))
            }
        }
    }
}

/// Authoritative scene and control-panel server
///
/// Cheap to clone; all clones share one state. Handles returned by the scene
/// and GUI APIs keep only a weak reference, so once the last clone is dropped
/// (or [`Server::stop`] is called) they fail with [`ServerError::ServerGone`].
///
/// # Example
///
/// ```rust,ignore
/// let server = Server::new(ServerConfig::default())?;
/// let count = server.gui().add_number("Count", 42.0)?;
/// let mut viewer = server.connect()?;
/// count.set_value(7)?;
/// ```
#[derive(Debug, Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

impl Server {
    /// Create a server after validating `config`
    ///
    /// # Errors
    /// Returns [`ServerError::Config`] if the configuration is invalid.
    pub fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: ServerConfig) -> Self {
        let broadcaster = Broadcaster::new(config.mutation_log_capacity, config.echo_to_origin);
        tracing::info!(
            queue_capacity = config.outbound_queue_capacity,
            echo_to_origin = config.echo_to_origin,
            "scenecast server created"
        );
        Self {
            inner: Arc::new(ServerInner {
                config,
                state: Mutex::new(State::default()),
                broadcaster,
                stopped: AtomicBool::new(false),
            }),
        }
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Scene tree API
    #[must_use]
    pub fn scene(&self) -> Scene {
        Scene::new(self.clone())
    }

    /// Control panel API
    ///
    /// Each returned [`Gui`] keeps its own container scope: a scope opened
    /// through one value does not affect widgets declared through another,
    /// and a fresh value always starts at the top level. Keep one `Gui` per
    /// thread of declarations that should share scopes.
    #[must_use]
    pub fn gui(&self) -> Gui {
        Gui::new(self.clone())
    }

    /// Open a viewer session
    ///
    /// The snapshot is taken and the session registered under the state
    /// lock, so the session sees every later mutation and none twice.
    ///
    /// # Errors
    /// Returns [`ServerError::ServerGone`] after [`Server::stop`].
    pub fn connect(&self) -> Result<ViewerSession> {
        self.inner.ensure_running()?;
        let id = SessionId::new();
        let (sender, receiver) = mpsc::channel(self.inner.config.outbound_queue_capacity.max(1));

        let state = self.inner.state.lock();
        let snapshot = state.snapshot();
        let (seq, nodes, widgets) = (snapshot.seq, snapshot.nodes.len(), snapshot.widgets.len());
        let entry = SessionEntry::new(sender, seq);
        let connected_at = entry.connected_at;
        if entry
            .enqueue(Arc::new(Envelope {
                seq,
                message: ServerMessage::Snapshot(snapshot),
            }))
            .is_err()
        {
            tracing::warn!(session = %id, "could not queue initial snapshot");
        }
        self.inner.broadcaster.sessions.insert(id, entry);
        drop(state);

        tracing::info!(session = %id, seq, nodes, widgets, "viewer connected");
        Ok(ViewerSession::new(id, connected_at, self.downgrade(), receiver))
    }

    /// Current full state
    ///
    /// # Errors
    /// Returns [`ServerError::ServerGone`] after [`Server::stop`].
    pub fn snapshot(&self) -> Result<Snapshot> {
        self.inner.read(State::snapshot)
    }

    /// Number of connected sessions
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.inner.broadcaster.sessions.len()
    }

    /// Connected session ids
    #[must_use]
    pub fn session_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.inner.broadcaster.sessions.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }

    /// Disconnect one session
    pub fn disconnect(&self, session: SessionId) -> bool {
        self.inner.broadcaster.disconnect(session)
    }

    /// Sequence number of the last published mutation
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.inner.state.lock().seq
    }

    /// Most recent published mutations, oldest first
    #[must_use]
    pub fn recent_mutations(&self) -> Vec<Envelope> {
        self.inner.broadcaster.log.recent()
    }

    /// Disconnect every session and refuse further work
    ///
    /// Idempotent. Outstanding handles fail with [`ServerError::ServerGone`].
    pub fn stop(&self) {
        if self.inner.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        let _state = self.inner.state.lock();
        let sessions = self.inner.broadcaster.disconnect_all();
        tracing::info!(sessions, "scenecast server stopped");
    }

    /// Check if [`Server::stop`] was called
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    pub(crate) fn inner(&self) -> &Arc<ServerInner> {
        &self.inner
    }

    pub(crate) fn downgrade(&self) -> Weak<ServerInner> {
        Arc::downgrade(&self.inner)
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::build(ServerConfig::default())
    }
}
