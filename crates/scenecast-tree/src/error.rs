//! Error types for the scene tree

use scenecast_protocol::{PathError, PathKey};

/// Scene tree errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// Malformed path
    #[error("invalid path: {0}")]
    InvalidPath(#[from] PathError),

    /// The root is implicit and cannot be added or mutated
    #[error("the root path is not addressable")]
    RootNotAddressable,

    /// The handle's record was removed (directly or with an ancestor)
    #[error("node {path} has been removed")]
    Removed { path: PathKey },

    /// Internal bookkeeping disagrees with the record set
    #[error("scene tree invariant violated: {0}")]
    Invariant(String),
}
