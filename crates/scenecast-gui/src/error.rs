//! Error types for the control panel

use scenecast_protocol::{WidgetId, WidgetKind};

/// Widget registry errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GuiError {
    /// The widget was removed (directly or with its container)
    #[error("widget {0} has been removed")]
    Removed(WidgetId),

    /// Container id does not name a live widget
    #[error("unknown container: {0}")]
    UnknownContainer(WidgetId),

    /// Widget cannot be placed in this container
    #[error("{child:?} cannot be placed inside {container:?}")]
    InvalidContainer {
        container: WidgetKind,
        child: WidgetKind,
    },

    /// Widget kind cannot sit at the top level
    #[error("{0:?} must be placed inside a container")]
    NeedsContainer(WidgetKind),

    /// Value does not fit the widget kind
    #[error("invalid value for {kind:?}: {reason}")]
    InvalidValue { kind: WidgetKind, reason: String },

    /// Inbound event for a disabled widget
    #[error("widget {0} is disabled")]
    Disabled(WidgetId),

    /// Inbound event the widget kind does not accept
    #[error("{kind:?} does not accept {input}")]
    Unsupported { kind: WidgetKind, input: &'static str },
}

impl GuiError {
    pub(crate) fn invalid(kind: WidgetKind, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            kind,
            reason: reason.into(),
        }
    }
}
