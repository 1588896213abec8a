//! scenecast wire protocol
//!
//! Shared vocabulary for the scene tree, the control panel and connected
//! viewers.
//!
//! # Core Concepts
//!
//! - [`PathKey`]: Normalized slash-delimited node identifier
//! - [`NodeId`], [`WidgetId`], [`SessionId`]: Record and session identities
//! - [`ServerMessage`] / [`Envelope`]: Sequenced server → viewer commands
//! - [`ClientMessage`]: Viewer → server interaction events
//! - [`Snapshot`]: Full state for a newly connected viewer

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod id;
mod kind;
mod message;
mod path;

pub use id::{NodeId, SessionId, WidgetId};
pub use kind::{NodeKind, WidgetKind};
pub use message::{
    ClientMessage, Envelope, NodeInput, NodeState, Origin, Props, ServerMessage, Snapshot,
    WidgetInput, WidgetState,
};
pub use path::{PathError, PathKey, SEPARATOR};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
