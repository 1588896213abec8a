//! Node and widget type tags

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type tag of a scene node
///
/// The server treats every kind the same way structurally; the tag only tells
/// the viewer how to render the node's properties.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Coordinate frame, also the kind of auto-created ancestors
    #[default]
    Frame,
    Icosphere,
    Box,
    Label,
    PointCloud,
    Grid,
    Mesh,
    CameraFrustum,
    LineSegments,
    /// Gizmo the viewer can drag; sends transform events back
    TransformControls,
    Spline,
    BatchedAxes,
    /// Anything the viewer knows about that the server does not
    Custom(String),
}

impl NodeKind {
    /// Whether viewers may move this node through transform events
    #[inline]
    #[must_use]
    pub fn accepts_transform(&self) -> bool {
        matches!(self, Self::TransformControls)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(name) => write!(f, "custom:{name}"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Type tag of a control-panel widget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    Button,
    ButtonGroup,
    Checkbox,
    Text,
    Number,
    Slider,
    Dropdown,
    Markdown,
    Rgb,
    Rgba,
    Vector2,
    Vector3,
    ProgressBar,
    Folder,
    TabGroup,
    Tab,
    Modal,
}

impl WidgetKind {
    /// Containers group other widgets and cascade their removal
    #[inline]
    #[must_use]
    pub fn is_container(self) -> bool {
        matches!(self, Self::Folder | Self::TabGroup | Self::Tab | Self::Modal)
    }

    /// Whether the widget carries a value at all
    #[inline]
    #[must_use]
    pub fn holds_value(self) -> bool {
        !self.is_container() && !matches!(self, Self::Button | Self::Markdown)
    }

    /// Whether a viewer may change the value
    #[inline]
    #[must_use]
    pub fn is_viewer_editable(self) -> bool {
        self.holds_value() && self != Self::ProgressBar
    }

    /// Whether a viewer may activate (click) the widget
    #[inline]
    #[must_use]
    pub fn is_activatable(self) -> bool {
        matches!(self, Self::Button | Self::ButtonGroup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widget_kind_capabilities() {
        assert!(WidgetKind::Folder.is_container());
        assert!(!WidgetKind::Folder.holds_value());
        assert!(!WidgetKind::Button.holds_value());
        assert!(WidgetKind::Button.is_activatable());
        assert!(WidgetKind::ButtonGroup.holds_value());
        assert!(WidgetKind::ProgressBar.holds_value());
        assert!(!WidgetKind::ProgressBar.is_viewer_editable());
        assert!(WidgetKind::Number.is_viewer_editable());
    }

    #[test]
    fn node_kind_serde() {
        assert_eq!(
            serde_json::to_string(&NodeKind::CameraFrustum).unwrap(),
            "\"camera_frustum\""
        );
        let custom: NodeKind = serde_json::from_str(r#"{"custom":"gaussian_splats"}"#).unwrap();
        assert_eq!(custom, NodeKind::Custom("gaussian_splats".into()));
        assert!(NodeKind::TransformControls.accepts_transform());
        assert!(!NodeKind::Frame.accepts_transform());
    }
}
