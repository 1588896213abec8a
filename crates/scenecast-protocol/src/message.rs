//! Wire messages between the server and viewers
//!
//! Everything is JSON with an internal `type` tag so a browser client can
//! switch on `msg.type` directly.

use crate::id::{SessionId, WidgetId};
use crate::kind::{NodeKind, WidgetKind};
use crate::path::PathKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Property bag carried by nodes and widgets
pub type Props = BTreeMap<String, Value>;

/// Wire form of a live node record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
    pub path: PathKey,
    pub kind: NodeKind,
    #[serde(default)]
    pub props: Props,
    pub visible: bool,
}

/// Wire form of a live widget record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetState {
    pub id: WidgetId,
    pub kind: WidgetKind,
    pub label: String,
    /// Enclosing container, `None` for the top level of the panel
    pub container: Option<WidgetId>,
    /// Declaration order within the container
    pub order: f64,
    pub value: Value,
    #[serde(default)]
    pub props: Props,
    pub visible: bool,
    pub disabled: bool,
}

/// Complete current state, sent once to a newly connected viewer
///
/// Nodes are listed parents first; widgets are listed containers first and
/// in declaration order within each container.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Sequence number of the last mutation folded into this snapshot
    pub seq: u64,
    pub nodes: Vec<NodeState>,
    pub widgets: Vec<WidgetState>,
}

/// Server → viewer message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once, first, to every session
    Snapshot(Snapshot),
    UpsertNode(NodeState),
    /// Removes the node and everything below it
    RemoveSubtree { path: PathKey },
    UpdateNodeProperty { path: PathKey, key: String, value: Value },
    SetNodeVisible { path: PathKey, visible: bool },
    UpsertWidget(WidgetState),
    /// Removes the widget and, for containers, everything declared inside
    RemoveWidget { id: WidgetId },
    UpdateWidgetValue { id: WidgetId, value: Value },
    UpdateWidgetFlags { id: WidgetId, visible: bool, disabled: bool },
}

impl ServerMessage {
    /// Short name used in logs
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Snapshot(_) => "snapshot",
            Self::UpsertNode(_) => "upsert_node",
            Self::RemoveSubtree { .. } => "remove_subtree",
            Self::UpdateNodeProperty { .. } => "update_node_property",
            Self::SetNodeVisible { .. } => "set_node_visible",
            Self::UpsertWidget(_) => "upsert_widget",
            Self::RemoveWidget { .. } => "remove_widget",
            Self::UpdateWidgetValue { .. } => "update_widget_value",
            Self::UpdateWidgetFlags { .. } => "update_widget_flags",
        }
    }
}

/// Sequenced server message as it travels to a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub seq: u64,
    pub message: ServerMessage,
}

impl Envelope {
    /// Encode as a JSON text frame
    ///
    /// # Errors
    /// Returns error if a property value cannot be serialized.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Viewer interaction with a widget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WidgetInput {
    /// The viewer edited the widget's value
    Value { value: Value },
    /// Momentary activation; button groups carry the clicked option
    Activate {
        #[serde(default)]
        value: Option<Value>,
    },
}

/// Viewer interaction with a scene node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeInput {
    Click,
    /// New pose after a drag of transform controls
    Transform { position: [f64; 3], wxyz: [f64; 4] },
}

/// Viewer → server message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    WidgetEvent { id: WidgetId, input: WidgetInput },
    NodeEvent { path: PathKey, input: NodeInput },
}

impl ClientMessage {
    /// Decode a JSON text frame
    ///
    /// # Errors
    /// Returns error on malformed JSON or an invalid path.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Where a value change came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Host,
    Viewer(SessionId),
}

impl Origin {
    /// The originating session, if any
    #[inline]
    #[must_use]
    pub fn session(self) -> Option<SessionId> {
        match self {
            Self::Host => None,
            Self::Viewer(id) => Some(id),
        }
    }
}
