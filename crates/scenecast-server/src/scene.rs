//! Scene tree API

use crate::error::Result;
use crate::handle::NodeHandle;
use crate::server::Server;
use scenecast_gui::{Observer, ObserverList};
use scenecast_protocol::{NodeId, NodeKind, Origin, PathKey};
use scenecast_tree::{AddStatus, NodeSpec, SHOW_AXES};
use serde_json::Value;

pub use scenecast_tree::{POSITION, WXYZ};

/// Viewer interaction with a node
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEventKind {
    /// The node was clicked
    Click,
    /// Transform controls were dragged to a new pose
    Transform {
        /// New translation
        position: [f64; 3],
        /// New rotation
        wxyz: [f64; 4],
    },
}

/// Event handed to node observers
#[derive(Debug, Clone, PartialEq)]
pub struct SceneEvent {
    /// Node path
    pub path: PathKey,
    /// Node identity
    pub node: NodeId,
    /// What happened
    pub kind: SceneEventKind,
    /// Originating session
    pub origin: Origin,
}

/// Observers of one node
#[derive(Debug, Default)]
pub(crate) struct NodeObservers {
    pub(crate) on_click: ObserverList<SceneEvent>,
    pub(crate) on_update: ObserverList<SceneEvent>,
}

impl NodeObservers {
    pub(crate) fn snapshot(&self, kind: &SceneEventKind) -> Vec<Observer<SceneEvent>> {
        match kind {
            SceneEventKind::Click => self.on_click.snapshot(),
            SceneEventKind::Transform { .. } => self.on_update.snapshot(),
        }
    }
}

/// Entry point for building and editing the scene
///
/// Paths are accepted with or without the leading separator.
#[derive(Debug, Clone)]
pub struct Scene {
    server: Server,
}

impl Scene {
    pub(crate) fn new(server: Server) -> Self {
        Self { server }
    }

    /// Add (or upgrade in place) the node at `path`
    ///
    /// Missing ancestors are created as axis-less frames. Every node carries
    /// a pose; missing pose properties default to the origin and identity.
    ///
    /// # Errors
    /// - [`crate::ServerError::InvalidPath`] for malformed paths
    /// - [`crate::ServerError::Tree`] for the root path
    /// - [`crate::ServerError::ServerGone`] after the server stopped
    pub fn add_node(&self, path: &str, spec: NodeSpec) -> Result<NodeHandle> {
        let path = PathKey::parse(path)?;
        let spec = spec.with_default_pose();

        let outcome = self.server.inner().mutate(|state| {
            let outcome = state.nodes.add(&path, spec)?;
            let mutations = outcome.mutations.clone();
            Ok((outcome, mutations))
        })?;

        match outcome.status {
            AddStatus::Created => tracing::debug!(
                path = %outcome.path,
                auto_created = outcome.auto_created.len(),
                "node added"
            ),
            AddStatus::Upgraded | AddStatus::Replaced => {
                tracing::debug!(path = %outcome.path, status = ?outcome.status, "node updated in place");
            }
        }
        Ok(NodeHandle::new(self.server.downgrade(), outcome.path, outcome.id))
    }

    /// Coordinate frame
    ///
    /// # Errors
    /// See [`Self::add_node`].
    pub fn add_frame(&self, path: &str, show_axes: bool) -> Result<NodeHandle> {
        self.add_node(
            path,
            NodeSpec::new(NodeKind::Frame).with_prop(SHOW_AXES, Value::Bool(show_axes)),
        )
    }

    /// Axis-aligned box
    ///
    /// # Errors
    /// See [`Self::add_node`].
    pub fn add_box(&self, path: &str, dimensions: [f64; 3], color: [u8; 3]) -> Result<NodeHandle> {
        self.add_node(
            path,
            NodeSpec::new(NodeKind::Box)
                .with_prop("dimensions", Value::from(dimensions.to_vec()))
                .with_prop("color", Value::from(color.to_vec())),
        )
    }

    /// Sphere
    ///
    /// # Errors
    /// See [`Self::add_node`].
    pub fn add_icosphere(&self, path: &str, radius: f64, color: [u8; 3]) -> Result<NodeHandle> {
        self.add_node(
            path,
            NodeSpec::new(NodeKind::Icosphere)
                .with_prop("radius", Value::from(radius))
                .with_prop("color", Value::from(color.to_vec())),
        )
    }

    /// Text label
    ///
    /// # Errors
    /// See [`Self::add_node`].
    pub fn add_label(&self, path: &str, text: impl Into<String>) -> Result<NodeHandle> {
        self.add_node(
            path,
            NodeSpec::new(NodeKind::Label).with_prop("text", Value::String(text.into())),
        )
    }

    /// Ground grid
    ///
    /// # Errors
    /// See [`Self::add_node`].
    pub fn add_grid(&self, path: &str, width: f64, height: f64) -> Result<NodeHandle> {
        self.add_node(
            path,
            NodeSpec::new(NodeKind::Grid)
                .with_prop("width", Value::from(width))
                .with_prop("height", Value::from(height)),
        )
    }

    /// Point cloud
    ///
    /// # Errors
    /// See [`Self::add_node`].
    pub fn add_point_cloud(&self, path: &str, points: &[[f32; 3]], point_size: f64) -> Result<NodeHandle> {
        let points: Vec<Value> = points.iter().map(|p| Value::from(p.to_vec())).collect();
        self.add_node(
            path,
            NodeSpec::new(NodeKind::PointCloud)
                .with_prop("points", Value::Array(points))
                .with_prop("point_size", Value::from(point_size)),
        )
    }

    /// Draggable gizmo; viewers move it with transform events
    ///
    /// # Errors
    /// See [`Self::add_node`].
    pub fn add_transform_controls(&self, path: &str, scale: f64) -> Result<NodeHandle> {
        self.add_node(
            path,
            NodeSpec::new(NodeKind::TransformControls).with_prop("scale", Value::from(scale)),
        )
    }

    /// Live handle for `path`, or `None` if nothing lives there
    ///
    /// Paths inside a removed subtree are absent.
    ///
    /// # Errors
    /// Returns [`crate::ServerError::InvalidPath`] for malformed paths.
    pub fn get_by_path(&self, path: &str) -> Result<Option<NodeHandle>> {
        let path = PathKey::parse(path)?;
        let id = self
            .server
            .inner()
            .read(|state| state.nodes.get(&path).map(|record| record.id))?;
        Ok(id.map(|id| NodeHandle::new(self.server.downgrade(), path, id)))
    }

    /// Remove whatever lives at `path`, with its subtree
    ///
    /// Returns `false` if nothing was there.
    ///
    /// # Errors
    /// Returns [`crate::ServerError::InvalidPath`] for malformed paths.
    pub fn remove_by_path(&self, path: &str) -> Result<bool> {
        let path = PathKey::parse(path)?;
        self.server.inner().mutate(|state| {
            let outcome = state.nodes.remove_by_path(&path);
            for record in &outcome.removed {
                state.node_observers.remove(&record.id);
            }
            if !outcome.is_noop() {
                tracing::debug!(path = %path, removed = outcome.removed.len(), "subtree removed");
            }
            Ok((!outcome.is_noop(), outcome.mutations))
        })
    }

    /// Immediate children of `path`
    ///
    /// # Errors
    /// Returns [`crate::ServerError::InvalidPath`] for malformed paths.
    pub fn children_of(&self, path: &str) -> Result<Vec<PathKey>> {
        let path = PathKey::parse(path)?;
        self.server.inner().read(|state| state.nodes.children_of(&path))
    }

    /// Number of live nodes
    ///
    /// # Errors
    /// Returns [`crate::ServerError::ServerGone`] after the server stopped.
    pub fn node_count(&self) -> Result<usize> {
        self.server.inner().read(|state| state.nodes.len())
    }
}
