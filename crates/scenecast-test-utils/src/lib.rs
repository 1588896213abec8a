//! Testing utilities for the scenecast workspace
//!
//! [`ViewerMirror`] plays the role of a viewer: it applies a snapshot and the
//! live message stream the way a renderer would, so tests can compare what
//! different viewers ended up with.

#![allow(missing_docs)]

use scenecast_protocol::{Envelope, NodeState, PathKey, ServerMessage, WidgetId, WidgetState};
use serde_json::Value;
use std::collections::BTreeMap;
use std::ops::Deref;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewerMirror {
    pub nodes: BTreeMap<PathKey, NodeState>,
    pub widgets: BTreeMap<WidgetId, WidgetState>,
    /// Highest sequence number applied
    pub seq: u64,
    pub snapshots: usize,
    pub applied: usize,
}

impl ViewerMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mirror from everything a session has received so far
    pub fn from_envelopes<E: Deref<Target = Envelope>>(envelopes: impl IntoIterator<Item = E>) -> Self {
        let mut mirror = Self::new();
        mirror.apply_all(envelopes);
        mirror
    }

    pub fn apply_all<E: Deref<Target = Envelope>>(&mut self, envelopes: impl IntoIterator<Item = E>) {
        for envelope in envelopes {
            self.apply(&envelope);
        }
    }

    /// Record an edit the viewer made locally before telling the server
    pub fn edit_widget_value(&mut self, id: WidgetId, value: Value) {
        if let Some(widget) = self.widgets.get_mut(&id) {
            widget.value = value;
        }
    }

    /// Apply one envelope
    ///
    /// Panics if sequence numbers go backwards, since that would mean the
    /// session saw mutations out of order.
    pub fn apply(&mut self, envelope: &Envelope) {
        if let ServerMessage::Snapshot(snapshot) = &envelope.message {
            assert!(
                snapshot.seq >= self.seq,
                "snapshot seq {} behind mirror seq {}",
                snapshot.seq,
                self.seq
            );
            self.nodes = snapshot.nodes.iter().map(|n| (n.path.clone(), n.clone())).collect();
            self.widgets = snapshot.widgets.iter().map(|w| (w.id, w.clone())).collect();
            self.seq = snapshot.seq;
            self.snapshots += 1;
            return;
        }

        assert!(
            envelope.seq > self.seq,
            "out of order: seq {} after {}",
            envelope.seq,
            self.seq
        );
        self.seq = envelope.seq;
        self.applied += 1;

        match &envelope.message {
            ServerMessage::Snapshot(_) => {}
            ServerMessage::UpsertNode(node) => {
                self.nodes.insert(node.path.clone(), node.clone());
            }
            ServerMessage::RemoveSubtree { path } => {
                self.nodes.retain(|p, _| !path.is_prefix_of(p));
            }
            ServerMessage::UpdateNodeProperty { path, key, value } => {
                if let Some(node) = self.nodes.get_mut(path) {
                    node.props.insert(key.clone(), value.clone());
                }
            }
            ServerMessage::SetNodeVisible { path, visible } => {
                if let Some(node) = self.nodes.get_mut(path) {
                    node.visible = *visible;
                }
            }
            ServerMessage::UpsertWidget(widget) => {
                self.widgets.insert(widget.id, widget.clone());
            }
            ServerMessage::RemoveWidget { id } => {
                self.widgets.remove(id);
            }
            ServerMessage::UpdateWidgetValue { id, value } => {
                if let Some(widget) = self.widgets.get_mut(id) {
                    widget.value = value.clone();
                }
            }
            ServerMessage::UpdateWidgetFlags { id, visible, disabled } => {
                if let Some(widget) = self.widgets.get_mut(id) {
                    widget.visible = *visible;
                    widget.disabled = *disabled;
                }
            }
        }
    }

    pub fn has_node(&self, path: &str) -> bool {
        PathKey::parse(path).is_ok_and(|p| self.nodes.contains_key(&p))
    }

    pub fn node(&self, path: &str) -> Option<&NodeState> {
        self.nodes.get(&PathKey::parse(path).ok()?)
    }

    pub fn widget_value(&self, id: WidgetId) -> Option<&Value> {
        self.widgets.get(&id).map(|w| &w.value)
    }

    /// Labels of a container's members in display order
    pub fn labels_in(&self, container: Option<WidgetId>) -> Vec<String> {
        let mut members: Vec<&WidgetState> = self
            .widgets
            .values()
            .filter(|w| w.container == container)
            .collect();
        members.sort_by(|a, b| a.order.total_cmp(&b.order));
        members.into_iter().map(|w| w.label.clone()).collect()
    }

    /// State only, ignoring how it was reached
    pub fn same_state(&self, other: &Self) -> bool {
        self.nodes == other.nodes && self.widgets == other.widgets
    }
}

/// Sequence numbers of a batch of envelopes
pub fn seqs<E: Deref<Target = Envelope>>(envelopes: &[E]) -> Vec<u64> {
    envelopes.iter().map(|e| e.seq).collect()
}

/// Message names of a batch of envelopes, for readable assertions
pub fn message_names<E: Deref<Target = Envelope>>(envelopes: &[E]) -> Vec<&'static str> {
    envelopes.iter().map(|e| e.message.name()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenecast_protocol::{NodeKind, Snapshot};

    fn node(path: &str) -> NodeState {
        NodeState {
            path: PathKey::parse(path).unwrap(),
            kind: NodeKind::Frame,
            props: Default::default(),
            visible: true,
        }
    }

    #[test]
    fn remove_subtree_drops_descendants_only() {
        let mut mirror = ViewerMirror::new();
        mirror.apply(&Envelope {
            seq: 0,
            message: ServerMessage::Snapshot(Snapshot {
                seq: 0,
                nodes: vec![node("/a"), node("/a/b"), node("/ab")],
                widgets: vec![],
            }),
        });
        mirror.apply(&Envelope {
            seq: 1,
            message: ServerMessage::RemoveSubtree {
                path: PathKey::parse("/a").unwrap(),
            },
        });
        assert!(!mirror.has_node("/a/b"));
        assert!(mirror.has_node("/ab"));
    }

    #[test]
    #[should_panic(expected = "out of order")]
    fn out_of_order_panics() {
        let mut mirror = ViewerMirror::new();
        let msg = ServerMessage::RemoveSubtree {
            path: PathKey::parse("/x").unwrap(),
        };
        mirror.apply(&Envelope { seq: 2, message: msg.clone() });
        mirror.apply(&Envelope { seq: 1, message: msg });
    }
}
