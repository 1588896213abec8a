//! Node registry with parent index
//!
//! Provides [`NodeRegistry`], the canonical path → record mapping plus the
//! derived parent → children index. The registry has no networking
//! knowledge: every mutating call returns the [`ServerMessage`]s that
//! describe it, and the caller decides how to deliver them.

use crate::error::TreeError;
use crate::node::{NodeRecord, NodeSpec};
use indexmap::IndexMap;
use scenecast_protocol::{NodeId, NodeState, PathKey, ServerMessage};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

/// How an `add` landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddStatus {
    /// A fresh record was created
    Created,
    /// An auto-created ancestor became an explicit node
    Upgraded,
    /// An explicit node was re-declared in place
    Replaced,
}

/// Result of [`NodeRegistry::add`]
#[derive(Debug, Clone)]
pub struct AddOutcome {
    /// Identity of the added (or upgraded) record
    pub id: NodeId,
    /// Normalized path
    pub path: PathKey,
    /// Created, upgraded or replaced
    pub status: AddStatus,
    /// Ancestors synthesized by this call, top-down
    pub auto_created: Vec<PathKey>,
    /// Messages to broadcast, ancestors first
    pub mutations: Vec<ServerMessage>,
}

/// Result of [`NodeRegistry::remove`]
#[derive(Debug, Clone, Default)]
pub struct RemoveOutcome {
    /// Removed records (marked `removed`), the target first
    pub removed: Vec<NodeRecord>,
    /// Messages to broadcast (empty for a no-op)
    pub mutations: Vec<ServerMessage>,
}

impl RemoveOutcome {
    /// `true` when the call removed nothing
    #[inline]
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty()
    }
}

/// Canonical scene tree
///
/// Records are kept in insertion order. Because a node is only ever inserted
/// after all of its ancestors exist, and ancestors cannot be removed without
/// their descendants, iteration order is always parent-before-child.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    records: IndexMap<PathKey, NodeRecord>,
    children: HashMap<PathKey, BTreeSet<PathKey>>,
}

impl NodeRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records (including auto-created ones)
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Add a node, synthesizing missing ancestors
    ///
    /// Re-adding at a live path upgrades the existing record in place: its
    /// identity and children are kept, kind/properties/visibility are
    /// replaced, and it stops being auto-created.
    ///
    /// # Errors
    /// Returns [`TreeError::RootNotAddressable`] for the root path.
    pub fn add(&mut self, path: &PathKey, spec: NodeSpec) -> Result<AddOutcome, TreeError> {
        if path.is_root() {
            return Err(TreeError::RootNotAddressable);
        }

        let mut mutations = Vec::new();
        let mut auto_created = Vec::new();

        for ancestor in path.ancestors() {
            if self.records.contains_key(&ancestor) {
                continue;
            }
            let record = NodeRecord::from_spec(ancestor.clone(), NodeSpec::auto_ancestor(), true);
            mutations.push(ServerMessage::UpsertNode(record.to_state()));
            self.insert(record);
            auto_created.push(ancestor);
        }

        let (id, status) = if let Some(record) = self.records.get_mut(path) {
            let status = if record.auto_created {
                AddStatus::Upgraded
            } else {
                AddStatus::Replaced
            };
            record.kind = spec.kind;
            record.props = spec.props;
            record.visible = spec.visible;
            record.auto_created = false;
            mutations.push(ServerMessage::UpsertNode(record.to_state()));
            (record.id, status)
        } else {
            let record = NodeRecord::from_spec(path.clone(), spec, false);
            let id = record.id;
            mutations.push(ServerMessage::UpsertNode(record.to_state()));
            self.insert(record);
            (id, AddStatus::Created)
        };

        Ok(AddOutcome {
            id,
            path: path.clone(),
            status,
            auto_created,
            mutations,
        })
    }

    fn insert(&mut self, record: NodeRecord) {
        let parent = record.path.parent().unwrap_or_default();
        self.children
            .entry(parent)
            .or_default()
            .insert(record.path.clone());
        self.records.insert(record.path.clone(), record);
    }

    /// Remove the record `id` at `path` and its whole subtree
    ///
    /// A stale identity (already removed, or the path now holds a different
    /// record) is a no-op.
    pub fn remove(&mut self, path: &PathKey, id: NodeId) -> RemoveOutcome {
        match self.records.get(path) {
            Some(record) if record.id == id => self.remove_subtree(path),
            _ => RemoveOutcome::default(),
        }
    }

    /// Remove whatever live record sits at `path`, with its subtree
    pub fn remove_by_path(&mut self, path: &PathKey) -> RemoveOutcome {
        if self.records.contains_key(path) {
            self.remove_subtree(path)
        } else {
            RemoveOutcome::default()
        }
    }

    fn remove_subtree(&mut self, path: &PathKey) -> RemoveOutcome {
        let mut removed = Vec::new();
        let mut stack = vec![path.clone()];

        while let Some(current) = stack.pop() {
            if let Some(kids) = self.children.remove(&current) {
                stack.extend(kids);
            }
            if let Some(mut record) = self.records.shift_remove(&current) {
                record.removed = true;
                removed.push(record);
            }
        }

        let parent = path.parent().unwrap_or_default();
        if let Some(siblings) = self.children.get_mut(&parent) {
            siblings.remove(path);
            if siblings.is_empty() {
                self.children.remove(&parent);
            }
        }

        RemoveOutcome {
            removed,
            mutations: vec![ServerMessage::RemoveSubtree { path: path.clone() }],
        }
    }

    /// Live record at `path`
    #[inline]
    #[must_use]
    pub fn get(&self, path: &PathKey) -> Option<&NodeRecord> {
        self.records.get(path)
    }

    /// Live record at `path` only if it is still the record `id`
    ///
    /// # Errors
    /// Returns [`TreeError::Removed`] if the record is gone.
    pub fn resolve(&self, path: &PathKey, id: NodeId) -> Result<&NodeRecord, TreeError> {
        match self.records.get(path) {
            Some(record) if record.id == id => Ok(record),
            _ => Err(TreeError::Removed { path: path.clone() }),
        }
    }

    fn resolve_mut(&mut self, path: &PathKey, id: NodeId) -> Result<&mut NodeRecord, TreeError> {
        match self.records.get_mut(path) {
            Some(record) if record.id == id => Ok(record),
            _ => Err(TreeError::Removed { path: path.clone() }),
        }
    }

    /// Check whether the record `id` is still live at `path`
    #[inline]
    #[must_use]
    pub fn is_live(&self, path: &PathKey, id: NodeId) -> bool {
        self.resolve(path, id).is_ok()
    }

    /// Set one property
    ///
    /// # Errors
    /// Returns [`TreeError::Removed`] if the record is gone.
    pub fn set_property(
        &mut self,
        path: &PathKey,
        id: NodeId,
        key: &str,
        value: Value,
    ) -> Result<ServerMessage, TreeError> {
        let record = self.resolve_mut(path, id)?;
        record.props.insert(key.to_string(), value.clone());
        Ok(ServerMessage::UpdateNodeProperty {
            path: path.clone(),
            key: key.to_string(),
            value,
        })
    }

    /// Set the node's own visibility flag
    ///
    /// Descendants keep their flags; hiding them is up to the renderer.
    ///
    /// # Errors
    /// Returns [`TreeError::Removed`] if the record is gone.
    pub fn set_visible(
        &mut self,
        path: &PathKey,
        id: NodeId,
        visible: bool,
    ) -> Result<ServerMessage, TreeError> {
        let record = self.resolve_mut(path, id)?;
        record.visible = visible;
        Ok(ServerMessage::SetNodeVisible {
            path: path.clone(),
            visible,
        })
    }

    /// Immediate children of `path` (the root included)
    #[must_use]
    pub fn children_of(&self, path: &PathKey) -> Vec<PathKey> {
        self.children
            .get(path)
            .map(|kids| kids.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Iterate over live records, parents first
    pub fn iter(&self) -> impl Iterator<Item = &NodeRecord> {
        self.records.values()
    }

    /// Wire states of every live node, parents first
    #[must_use]
    pub fn snapshot(&self) -> Vec<NodeState> {
        self.records.values().map(NodeRecord::to_state).collect()
    }

    /// Verify the ancestor invariant and the parent index
    ///
    /// # Errors
    /// Returns [`TreeError::Invariant`] describing the first inconsistency.
    pub fn check_invariants(&self) -> Result<(), TreeError> {
        for (position, (path, record)) in self.records.iter().enumerate() {
            if &record.path != path || record.removed {
                return Err(TreeError::Invariant(format!("bad record at {path}")));
            }
            let parent = path.parent().unwrap_or_default();
            if !parent.is_root() {
                match self.records.get_index_of(&parent) {
                    Some(parent_pos) if parent_pos < position => {}
                    Some(_) => {
                        return Err(TreeError::Invariant(format!(
                            "{parent} is ordered after its child {path}"
                        )))
                    }
                    None => {
                        return Err(TreeError::Invariant(format!("{path} has no parent")));
                    }
                }
            }
            let linked = self
                .children
                .get(&parent)
                .is_some_and(|kids| kids.contains(path));
            if !linked {
                return Err(TreeError::Invariant(format!(
                    "{path} missing from children of {parent}"
                )));
            }
        }

        for (parent, kids) in &self.children {
            if !parent.is_root() && !self.records.contains_key(parent) {
                return Err(TreeError::Invariant(format!("dangling index entry {parent}")));
            }
            if let Some(kid) = kids.iter().find(|k| !self.records.contains_key(*k)) {
                return Err(TreeError::Invariant(format!(
                    "index lists removed child {kid} under {parent}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{POSITION, SHOW_AXES, WXYZ};
    use proptest::prelude::*;
    use scenecast_protocol::NodeKind;

    fn p(s: &str) -> PathKey {
        PathKey::parse(s).unwrap()
    }

    fn frame() -> NodeSpec {
        NodeSpec::new(NodeKind::Frame)
    }

    #[test]
    fn remove_parent_removes_children() {
        let mut reg = NodeRegistry::new();
        let parent = reg.add(&p("/parent"), frame()).unwrap();
        reg.add(&p("/parent/child"), frame()).unwrap();
        reg.add(&p("/parent/child/grandchild"), frame()).unwrap();

        let outcome = reg.remove(&p("/parent"), parent.id);

        assert_eq!(outcome.removed.len(), 3);
        assert!(outcome.removed.iter().all(|r| r.removed));
        assert!(reg.get(&p("/parent")).is_none());
        assert!(reg.get(&p("/parent/child")).is_none());
        assert!(reg.get(&p("/parent/child/grandchild")).is_none());
        assert_eq!(
            outcome.mutations,
            vec![ServerMessage::RemoveSubtree { path: p("/parent") }]
        );
        reg.check_invariants().unwrap();
    }

    #[test]
    fn remove_leaf_preserves_parent() {
        let mut reg = NodeRegistry::new();
        reg.add(&p("/parent"), frame()).unwrap();
        let child = reg.add(&p("/parent/child"), frame()).unwrap();

        reg.remove(&p("/parent/child"), child.id);

        assert!(reg.get(&p("/parent")).is_some());
        assert!(reg.get(&p("/parent/child")).is_none());
        assert!(!reg.children_of(&p("/parent")).contains(&p("/parent/child")));
        reg.check_invariants().unwrap();
    }

    #[test]
    fn intermediate_frames_auto_created() {
        let mut reg = NodeRegistry::new();
        let outcome = reg.add(&p("/a/b/c"), frame()).unwrap();

        assert_eq!(outcome.status, AddStatus::Created);
        assert_eq!(outcome.auto_created, vec![p("/a"), p("/a/b")]);
        assert_eq!(outcome.mutations.len(), 3);

        for path in ["/a", "/a/b"] {
            let record = reg.get(&p(path)).unwrap();
            assert!(record.auto_created);
            assert!(record.visible);
            assert_eq!(record.prop(SHOW_AXES), Some(&Value::Bool(false)));
        }
        assert!(!reg.get(&p("/a/b/c")).unwrap().auto_created);
    }

    #[test]
    fn auto_created_ancestors_carry_identity_pose() {
        let mut reg = NodeRegistry::new();
        let outcome = reg.add(&p("/a/b"), frame()).unwrap();

        let record = reg.get(&p("/a")).unwrap();
        assert_eq!(record.prop(POSITION), Some(&serde_json::json!([0.0, 0.0, 0.0])));
        assert_eq!(record.prop(WXYZ), Some(&serde_json::json!([1.0, 0.0, 0.0, 0.0])));

        let upsert = outcome
            .mutations
            .iter()
            .find_map(|m| match m {
                ServerMessage::UpsertNode(state) if state.path == p("/a") => Some(state),
                _ => None,
            })
            .unwrap();
        assert!(upsert.props.contains_key(POSITION));
        assert!(upsert.props.contains_key(WXYZ));
    }

    #[test]
    fn remove_cascades_through_auto_created() {
        let mut reg = NodeRegistry::new();
        reg.add(&p("/a/b/c"), frame()).unwrap();

        let outcome = reg.remove_by_path(&p("/a"));

        assert_eq!(outcome.removed.len(), 3);
        assert!(reg.is_empty());
        assert!(reg.children_of(&PathKey::root()).is_empty());
    }

    #[test]
    fn re_add_upgrades_auto_created_in_place() {
        let mut reg = NodeRegistry::new();
        reg.add(&p("/a/b"), frame()).unwrap();
        let auto_id = reg.get(&p("/a")).unwrap().id;

        let outcome = reg
            .add(&p("/a"), NodeSpec::new(NodeKind::Box).with_prop("color", Value::from("red")))
            .unwrap();

        assert_eq!(outcome.status, AddStatus::Upgraded);
        assert_eq!(outcome.id, auto_id);
        let record = reg.get(&p("/a")).unwrap();
        assert!(!record.auto_created);
        assert_eq!(record.kind, NodeKind::Box);
        assert!(record.prop(SHOW_AXES).is_none());
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.children_of(&p("/a")), vec![p("/a/b")]);
    }

    #[test]
    fn re_add_explicit_is_replace_not_duplicate() {
        let mut reg = NodeRegistry::new();
        let first = reg.add(&p("/x"), frame()).unwrap();
        let second = reg.add(&p("/x"), NodeSpec::new(NodeKind::Label)).unwrap();

        assert_eq!(second.status, AddStatus::Replaced);
        assert_eq!(first.id, second.id);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn add_after_remove_creates_fresh_identity() {
        let mut reg = NodeRegistry::new();
        let first = reg.add(&p("/x"), frame()).unwrap();
        reg.remove(&p("/x"), first.id);
        let second = reg.add(&p("/x"), frame()).unwrap();

        assert_ne!(first.id, second.id);
        assert!(!reg.is_live(&p("/x"), first.id));
        assert!(reg.is_live(&p("/x"), second.id));

        // Stale identity does not touch the new record.
        assert!(reg.remove(&p("/x"), first.id).is_noop());
        assert!(reg.get(&p("/x")).is_some());
    }

    #[test]
    fn remove_twice_is_noop() {
        let mut reg = NodeRegistry::new();
        let node = reg.add(&p("/x"), frame()).unwrap();
        assert!(!reg.remove(&p("/x"), node.id).is_noop());
        let again = reg.remove(&p("/x"), node.id);
        assert!(again.is_noop());
        assert!(again.mutations.is_empty());
    }

    #[test]
    fn setters_reject_removed() {
        let mut reg = NodeRegistry::new();
        reg.add(&p("/a"), frame()).unwrap();
        let child = reg.add(&p("/a/b"), frame()).unwrap();
        reg.remove_by_path(&p("/a"));

        assert_eq!(
            reg.set_property(&p("/a/b"), child.id, "color", Value::from(1)),
            Err(TreeError::Removed { path: p("/a/b") })
        );
        assert!(reg.set_visible(&p("/a/b"), child.id, false).is_err());
    }

    #[test]
    fn visibility_does_not_cascade() {
        let mut reg = NodeRegistry::new();
        let parent = reg.add(&p("/a"), frame()).unwrap();
        reg.add(&p("/a/b"), frame()).unwrap();

        let msg = reg.set_visible(&p("/a"), parent.id, false).unwrap();

        assert_eq!(msg, ServerMessage::SetNodeVisible { path: p("/a"), visible: false });
        assert!(!reg.get(&p("/a")).unwrap().visible);
        assert!(reg.get(&p("/a/b")).unwrap().visible);
    }

    #[test]
    fn root_is_not_addressable() {
        let mut reg = NodeRegistry::new();
        assert_eq!(
            reg.add(&PathKey::root(), frame()).unwrap_err(),
            TreeError::RootNotAddressable
        );
    }

    #[test]
    fn snapshot_is_parent_first() {
        let mut reg = NodeRegistry::new();
        reg.add(&p("/z/y/x"), frame()).unwrap();
        reg.add(&p("/b"), frame()).unwrap();
        reg.add(&p("/z/w"), frame()).unwrap();

        let paths: Vec<String> = reg.snapshot().into_iter().map(|n| n.path.into()).collect();
        assert_eq!(paths, vec!["/z", "/z/y", "/z/y/x", "/b", "/z/w"]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(Vec<u8>),
        Remove(Vec<u8>),
    }

    fn path_from(segs: &[u8]) -> PathKey {
        let joined: Vec<String> = segs.iter().map(|s| format!("n{s}")).collect();
        PathKey::parse(&joined.join("/")).unwrap()
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        let segs = prop::collection::vec(0u8..3, 1..4);
        prop_oneof![
            segs.clone().prop_map(Op::Add),
            segs.prop_map(Op::Remove),
        ]
    }

    proptest! {
        #[test]
        fn invariants_hold_under_random_ops(ops in prop::collection::vec(op_strategy(), 1..40)) {
            let mut reg = NodeRegistry::new();
            for op in ops {
                match op {
                    Op::Add(segs) => {
                        reg.add(&path_from(&segs), frame()).unwrap();
                    }
                    Op::Remove(segs) => {
                        let target = path_from(&segs);
                        reg.remove_by_path(&target);
                        prop_assert!(reg.iter().all(|r| !target.is_prefix_of(&r.path)));
                    }
                }
                prop_assert!(reg.check_invariants().is_ok());
            }
        }
    }
}
