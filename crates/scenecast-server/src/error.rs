//! Error types for the scenecast server
//!
//! Mirrors the failure taxonomy hosts care about:
//! - Invalid identifiers (malformed paths, the root)
//! - Mutations through handles whose record was removed
//! - Handles outliving their server
//! - Configuration and transport failures

use scenecast_gui::GuiError;
use scenecast_protocol::PathError;
use scenecast_tree::TreeError;
use std::path::PathBuf;

/// Result alias used across the server crate
pub type Result<T> = std::result::Result<T, ServerError>;

/// Main server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Malformed path handed to a scene call
    #[error("invalid path: {0}")]
    InvalidPath(#[from] PathError),

    /// Scene tree rejected the operation
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Widget registry rejected the operation
    #[error(transparent)]
    Gui(#[from] GuiError),

    /// The owning server was stopped or dropped
    #[error("server is no longer running")]
    ServerGone,

    /// Configuration could not be loaded or is invalid
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Transport could not be set up
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl ServerError {
    /// Check if the caller passed a malformed or unaddressable identifier
    #[inline]
    #[must_use]
    pub fn is_invalid_identifier(&self) -> bool {
        matches!(
            self,
            Self::InvalidPath(_)
                | Self::Tree(TreeError::InvalidPath(_) | TreeError::RootNotAddressable)
        )
    }

    /// Check if the error comes from mutating a removed node or widget
    #[inline]
    #[must_use]
    pub fn is_removed_handle(&self) -> bool {
        matches!(
            self,
            Self::Tree(TreeError::Removed { .. }) | Self::Gui(GuiError::Removed(_))
        )
    }

    /// Check if the owning server is gone
    #[inline]
    #[must_use]
    pub fn is_server_gone(&self) -> bool {
        matches!(self, Self::ServerGone)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that was being read
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Config text is not valid TOML for [`crate::ServerConfig`]
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config parsed but a value is out of range
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Listener could not be bound
    #[error("failed to bind {addr}: {reason}")]
    Bind {
        /// Requested address
        addr: String,
        /// What the runtime reported
        reason: String,
    },

    /// Outbound frame could not be encoded
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),

    /// Inbound frame is not a valid client message
    #[error("failed to decode frame: {0}")]
    Decode(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenecast_protocol::{PathKey, WidgetId};

    #[test]
    fn classification() {
        let invalid: ServerError = PathKey::parse("a//b").unwrap_err().into();
        assert!(invalid.is_invalid_identifier());
        assert!(!invalid.is_removed_handle());

        let root: ServerError = TreeError::RootNotAddressable.into();
        assert!(root.is_invalid_identifier());

        let removed: ServerError = GuiError::Removed(WidgetId::new()).into();
        assert!(removed.is_removed_handle());

        let node_removed: ServerError = TreeError::Removed {
            path: PathKey::parse("/a").unwrap(),
        }
        .into();
        assert!(node_removed.is_removed_handle());

        assert!(ServerError::ServerGone.is_server_gone());
    }
}
