//! Node records

use scenecast_protocol::{NodeId, NodeKind, NodeState, PathKey, Props};
use serde_json::Value;

/// Property key controlling whether a frame draws its axes
pub const SHOW_AXES: &str = "show_axes";
/// Pose translation property, `[x, y, z]`
pub const POSITION: &str = "position";
/// Pose rotation property, quaternion `[w, x, y, z]`
pub const WXYZ: &str = "wxyz";

/// What the host asked for when adding a node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    /// Render type
    pub kind: NodeKind,
    /// Initial properties
    pub props: Props,
    /// Initial visibility
    pub visible: bool,
}

impl NodeSpec {
    /// Visible node of `kind` with no properties
    #[must_use]
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            props: Props::new(),
            visible: true,
        }
    }

    /// Set one property
    #[must_use]
    pub fn with_prop(mut self, key: impl Into<String>, value: Value) -> Self {
        self.props.insert(key.into(), value);
        self
    }

    /// Merge a property bag
    #[must_use]
    pub fn with_props(mut self, props: Props) -> Self {
        self.props.extend(props);
        self
    }

    /// Set initial visibility
    #[must_use]
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Fill in any missing pose: origin position, identity rotation
    #[must_use]
    pub fn with_default_pose(mut self) -> Self {
        self.props
            .entry(POSITION.to_string())
            .or_insert_with(|| Value::from(vec![0.0, 0.0, 0.0]));
        self.props
            .entry(WXYZ.to_string())
            .or_insert_with(|| Value::from(vec![1.0, 0.0, 0.0, 0.0]));
        self
    }

    /// Spec of a synthesized ancestor: an axis-less frame at the identity pose
    #[must_use]
    pub fn auto_ancestor() -> Self {
        Self::new(NodeKind::Frame)
            .with_prop(SHOW_AXES, Value::Bool(false))
            .with_default_pose()
    }
}

impl Default for NodeSpec {
    fn default() -> Self {
        Self::new(NodeKind::Frame)
    }
}

/// Canonical record of one node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    /// Record identity, fresh for every created record
    pub id: NodeId,
    /// Normalized location in the tree
    pub path: PathKey,
    /// Render type
    pub kind: NodeKind,
    /// Current properties
    pub props: Props,
    /// The node's own visibility flag
    pub visible: bool,
    /// Set only on records handed back by a removal
    pub removed: bool,
    /// Synthesized to satisfy the ancestor invariant, not requested
    pub auto_created: bool,
}

impl NodeRecord {
    pub(crate) fn from_spec(path: PathKey, spec: NodeSpec, auto_created: bool) -> Self {
        Self {
            id: NodeId::new(),
            path,
            kind: spec.kind,
            props: spec.props,
            visible: spec.visible,
            removed: false,
            auto_created,
        }
    }

    /// Wire form for upserts and snapshots
    #[must_use]
    pub fn to_state(&self) -> NodeState {
        NodeState {
            path: self.path.clone(),
            kind: self.kind.clone(),
            props: self.props.clone(),
            visible: self.visible,
        }
    }

    /// Read one property
    #[inline]
    #[must_use]
    pub fn prop(&self, key: &str) -> Option<&Value> {
        self.props.get(key)
    }
}
