//! Node and widget handles
//!
//! Handles are disposable views: an identity plus a weak reference to the
//! server. They own no state. Every call re-resolves the identity, so a
//! handle to a removed record is rejected even if its path or slot has since
//! been reused.

use crate::error::{Result, ServerError};
use crate::scene::{SceneEvent, POSITION, WXYZ};
use crate::server::{ServerInner, State};
use scenecast_gui::{GuiEvent, GuiEventKind, WidgetSpec};
use scenecast_protocol::{NodeId, NodeKind, PathKey, WidgetId, WidgetKind};
use serde_json::Value;
use std::ops::Deref;
use std::sync::{Arc, Weak};

fn upgrade(server: &Weak<ServerInner>) -> Result<Arc<ServerInner>> {
    let server = server.upgrade().ok_or(ServerError::ServerGone)?;
    server.ensure_running()?;
    Ok(server)
}

/// Capability to read and mutate one scene node
#[derive(Debug, Clone)]
pub struct NodeHandle {
    server: Weak<ServerInner>,
    path: PathKey,
    id: NodeId,
}

impl NodeHandle {
    pub(crate) fn new(server: Weak<ServerInner>, path: PathKey, id: NodeId) -> Self {
        Self { server, path, id }
    }

    /// Node path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &PathKey {
        &self.path
    }

    /// Record identity
    #[inline]
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    fn read<T>(&self, read: impl FnOnce(&scenecast_tree::NodeRecord) -> T) -> Result<T> {
        let server = upgrade(&self.server)?;
        let state = server.state.lock();
        let record = state.nodes.resolve(&self.path, self.id)?;
        Ok(read(record))
    }

    /// Check if the record was removed, directly or with an ancestor
    ///
    /// A handle whose server is gone counts as removed.
    #[must_use]
    pub fn is_removed(&self) -> bool {
        self.read(|_| ()).is_err()
    }

    /// Render type
    ///
    /// # Errors
    /// Returns a removed-handle error or [`ServerError::ServerGone`].
    pub fn kind(&self) -> Result<NodeKind> {
        self.read(|r| r.kind.clone())
    }

    /// Own visibility flag
    ///
    /// # Errors
    /// Returns a removed-handle error or [`ServerError::ServerGone`].
    pub fn visible(&self) -> Result<bool> {
        self.read(|r| r.visible)
    }

    /// Whether the node was synthesized as an ancestor and never added
    ///
    /// # Errors
    /// Returns a removed-handle error or [`ServerError::ServerGone`].
    pub fn is_auto_created(&self) -> Result<bool> {
        self.read(|r| r.auto_created)
    }

    /// One property
    ///
    /// # Errors
    /// Returns a removed-handle error or [`ServerError::ServerGone`].
    pub fn property(&self, key: &str) -> Result<Option<Value>> {
        self.read(|r| r.prop(key).cloned())
    }

    /// Set one property and broadcast it
    ///
    /// # Errors
    /// Returns a removed-handle error or [`ServerError::ServerGone`].
    pub fn set_property(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        upgrade(&self.server)?.mutate(|state| {
            let message = state.nodes.set_property(&self.path, self.id, key, value)?;
            Ok(((), vec![message]))
        })
    }

    /// Show or hide; descendants keep their own flags
    ///
    /// # Errors
    /// Returns a removed-handle error or [`ServerError::ServerGone`].
    pub fn set_visible(&self, visible: bool) -> Result<()> {
        upgrade(&self.server)?.mutate(|state| {
            let message = state.nodes.set_visible(&self.path, self.id, visible)?;
            Ok(((), vec![message]))
        })
    }

    /// Move the node
    ///
    /// # Errors
    /// Returns a removed-handle error or [`ServerError::ServerGone`].
    pub fn set_position(&self, position: [f64; 3]) -> Result<()> {
        self.set_property(POSITION, position.to_vec())
    }

    /// Rotate the node
    ///
    /// # Errors
    /// Returns a removed-handle error or [`ServerError::ServerGone`].
    pub fn set_wxyz(&self, wxyz: [f64; 4]) -> Result<()> {
        self.set_property(WXYZ, wxyz.to_vec())
    }

    /// Remove the node and its subtree
    ///
    /// Removing an already-removed node is a no-op.
    ///
    /// # Errors
    /// Returns [`ServerError::ServerGone`] if the server is gone.
    pub fn remove(&self) -> Result<()> {
        upgrade(&self.server)?.mutate(|state| {
            let outcome = state.nodes.remove(&self.path, self.id);
            for record in &outcome.removed {
                state.node_observers.remove(&record.id);
            }
            if !outcome.is_noop() {
                tracing::debug!(path = %self.path, removed = outcome.removed.len(), "node removed");
            }
            Ok(((), outcome.mutations))
        })
    }

    /// Run `callback` when a viewer clicks the node
    ///
    /// # Errors
    /// Returns a removed-handle error or [`ServerError::ServerGone`].
    pub fn on_click<F>(&self, callback: F) -> Result<()>
    where
        F: Fn(&SceneEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.observe(|observers| observers.on_click.push(callback))
    }

    /// Run `callback` after a viewer moves the node
    ///
    /// # Errors
    /// Returns a removed-handle error or [`ServerError::ServerGone`].
    pub fn on_update<F>(&self, callback: F) -> Result<()>
    where
        F: Fn(&SceneEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.observe(|observers| observers.on_update.push(callback))
    }

    fn observe(&self, register: impl FnOnce(&mut crate::scene::NodeObservers)) -> Result<()> {
        let server = upgrade(&self.server)?;
        let mut state = server.state.lock();
        state.nodes.resolve(&self.path, self.id)?;
        register(state.node_observers.entry(self.id).or_default());
        Ok(())
    }
}

/// Capability to read and mutate one widget
#[derive(Debug, Clone)]
pub struct WidgetHandle {
    server: Weak<ServerInner>,
    id: WidgetId,
    kind: WidgetKind,
}

impl WidgetHandle {
    pub(crate) fn new(server: Weak<ServerInner>, id: WidgetId, kind: WidgetKind) -> Self {
        Self { server, id, kind }
    }

    /// Widget identity
    #[inline]
    #[must_use]
    pub fn id(&self) -> WidgetId {
        self.id
    }

    /// Widget type
    #[inline]
    #[must_use]
    pub fn kind(&self) -> WidgetKind {
        self.kind
    }

    fn read<T>(&self, read: impl FnOnce(&scenecast_gui::WidgetRecord) -> T) -> Result<T> {
        let server = upgrade(&self.server)?;
        let state = server.state.lock();
        let record = state.widgets.resolve(self.id)?;
        Ok(read(record))
    }

    fn update(
        &self,
        apply: impl FnOnce(&mut State) -> std::result::Result<scenecast_protocol::ServerMessage, scenecast_gui::GuiError>,
    ) -> Result<()> {
        upgrade(&self.server)?.mutate(|state| Ok(((), vec![apply(state)?])))
    }

    /// Check if the widget was removed, directly or with its container
    ///
    /// A handle whose server is gone counts as removed.
    #[must_use]
    pub fn is_removed(&self) -> bool {
        self.read(|_| ()).is_err()
    }

    /// Canonical value, including changes made by viewers
    ///
    /// # Errors
    /// Returns a removed-handle error or [`ServerError::ServerGone`].
    pub fn value(&self) -> Result<Value> {
        self.read(|r| r.value.clone())
    }

    /// Display label
    ///
    /// # Errors
    /// Returns a removed-handle error or [`ServerError::ServerGone`].
    pub fn label(&self) -> Result<String> {
        self.read(|r| r.label.clone())
    }

    /// Visibility flag
    ///
    /// # Errors
    /// Returns a removed-handle error or [`ServerError::ServerGone`].
    pub fn visible(&self) -> Result<bool> {
        self.read(|r| r.visible)
    }

    /// Disabled flag
    ///
    /// # Errors
    /// Returns a removed-handle error or [`ServerError::ServerGone`].
    pub fn disabled(&self) -> Result<bool> {
        self.read(|r| r.disabled)
    }

    /// One kind-specific property
    ///
    /// # Errors
    /// Returns a removed-handle error or [`ServerError::ServerGone`].
    pub fn property(&self, key: &str) -> Result<Option<Value>> {
        self.read(|r| r.props.get(key).cloned())
    }

    /// Set the value and broadcast it; observers are not run
    ///
    /// # Errors
    /// Returns a removed-handle error, [`ServerError::Gui`] for values the
    /// widget does not accept, or [`ServerError::ServerGone`].
    pub fn set_value(&self, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.update(|state| state.widgets.set_value(self.id, value))
    }

    /// Show or hide
    ///
    /// # Errors
    /// Returns a removed-handle error or [`ServerError::ServerGone`].
    pub fn set_visible(&self, visible: bool) -> Result<()> {
        self.update(|state| state.widgets.set_visible(self.id, visible))
    }

    /// Enable or disable; viewer events are ignored while disabled
    ///
    /// # Errors
    /// Returns a removed-handle error or [`ServerError::ServerGone`].
    pub fn set_disabled(&self, disabled: bool) -> Result<()> {
        self.update(|state| state.widgets.set_disabled(self.id, disabled))
    }

    /// Change a kind-specific property such as options or bounds
    ///
    /// # Errors
    /// Returns a removed-handle error, [`ServerError::Gui`] if the current
    /// value no longer fits, or [`ServerError::ServerGone`].
    pub fn set_property(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.update(|state| state.widgets.set_prop(self.id, key, value))
    }

    /// Remove the widget; containers take their members with them
    ///
    /// Removing an already-removed widget is a no-op.
    ///
    /// # Errors
    /// Returns [`ServerError::ServerGone`] if the server is gone.
    pub fn remove(&self) -> Result<()> {
        upgrade(&self.server)?.mutate(|state| {
            let outcome = state.widgets.remove(self.id);
            if !outcome.is_noop() {
                tracing::debug!(widget = %self.id, removed = outcome.removed.len(), "widget removed");
            }
            Ok(((), outcome.mutations))
        })
    }

    /// Run `callback` after a viewer changes the value
    ///
    /// The callback sees the already-applied value.
    ///
    /// # Errors
    /// Returns a removed-handle error or [`ServerError::ServerGone`].
    pub fn on_update<F>(&self, callback: F) -> Result<()>
    where
        F: Fn(&GuiEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.observe(GuiEventKind::Update, callback)
    }

    /// Run `callback` when a viewer activates the widget
    ///
    /// # Errors
    /// Returns a removed-handle error or [`ServerError::ServerGone`].
    pub fn on_click<F>(&self, callback: F) -> Result<()>
    where
        F: Fn(&GuiEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.observe(GuiEventKind::Click, callback)
    }

    fn observe<F>(&self, kind: GuiEventKind, callback: F) -> Result<()>
    where
        F: Fn(&GuiEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let server = upgrade(&self.server)?;
        let mut state = server.state.lock();
        Ok(state.widgets.observe(self.id, kind, callback)?)
    }
}

/// Modal dialog
#[derive(Debug, Clone)]
pub struct ModalHandle(pub(crate) WidgetHandle);

impl ModalHandle {
    /// Dismiss the modal and everything declared inside it
    ///
    /// # Errors
    /// Returns [`ServerError::ServerGone`] if the server is gone.
    pub fn close(&self) -> Result<()> {
        self.0.remove()
    }
}

impl Deref for ModalHandle {
    type Target = WidgetHandle;

    fn deref(&self) -> &WidgetHandle {
        &self.0
    }
}

/// Tab group; tabs are added through it
#[derive(Debug, Clone)]
pub struct TabGroupHandle(pub(crate) WidgetHandle);

impl TabGroupHandle {
    /// Append a tab
    ///
    /// # Errors
    /// Returns a removed-handle error or [`ServerError::ServerGone`].
    pub fn add_tab(&self, label: impl Into<String>) -> Result<WidgetHandle> {
        let spec = WidgetSpec::new(WidgetKind::Tab, label).in_container(Some(self.0.id));
        add_widget(&self.0.server, spec)
    }
}

impl Deref for TabGroupHandle {
    type Target = WidgetHandle;

    fn deref(&self) -> &WidgetHandle {
        &self.0
    }
}

pub(crate) fn add_widget(server: &Weak<ServerInner>, spec: WidgetSpec) -> Result<WidgetHandle> {
    let kind = spec.kind;
    let id = upgrade(server)?.mutate(|state| {
        let (id, message) = state.widgets.add(spec)?;
        Ok((id, vec![message]))
    })?;
    tracing::debug!(widget = %id, kind = ?kind, "widget added");
    Ok(WidgetHandle::new(server.clone(), id, kind))
}
