//! scenecast scene tree
//!
//! Canonical, network-agnostic model of the 3D scene hierarchy.
//!
//! # Core Concepts
//!
//! - [`NodeRegistry`]: Path → record mapping with a parent → children index
//! - [`NodeRecord`]: One node; `auto_created` marks synthesized ancestors
//! - [`NodeSpec`]: What the host asks for when adding a node
//!
//! Every mutating registry call returns the protocol messages describing it,
//! so the owner can apply and broadcast inside one critical section.
//!
//! # Example
//!
//! ```rust,ignore
//! use scenecast_tree::{NodeRegistry, NodeSpec};
//! use scenecast_protocol::{NodeKind, PathKey};
//!
//! let mut tree = NodeRegistry::new();
//! let outcome = tree.add(&PathKey::parse("world/robot")?, NodeSpec::new(NodeKind::Frame))?;
//! assert_eq!(outcome.auto_created.len(), 1); // "/world"
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod node;
mod registry;

pub use error::TreeError;
pub use node::{NodeRecord, NodeSpec, POSITION, SHOW_AXES, WXYZ};
pub use registry::{AddOutcome, AddStatus, NodeRegistry, RemoveOutcome};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
