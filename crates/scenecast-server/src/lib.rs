//! scenecast server
//!
//! Server-authoritative scene tree and control panel, mirrored live to any
//! number of viewers.
//!
//! # Core Concepts
//!
//! - [`Server`]: Owns canonical state behind one lock; cheap to clone
//! - [`Scene`] / [`Gui`]: Host-side builder APIs returning handles
//! - [`NodeHandle`] / [`WidgetHandle`]: Identity-checked mutation surfaces
//! - [`ViewerSession`]: One viewer's outbound queue and inbound path
//! - [`transport`]: Websocket adapter exposing sessions over `/ws`
//!
//! # Example
//!
//! ```rust,ignore
//! use scenecast_server::{Server, ServerConfig};
//!
//! let server = Server::new(ServerConfig::default())?;
//! server.scene().add_frame("/world/robot", true)?;
//! let count = server.gui().add_number("Count", 42.0)?;
//!
//! let mut viewer = server.connect()?;
//! count.set_value(7.0)?; // queued to `viewer` after its snapshot
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod broadcast;
mod config;
mod error;
mod gui;
mod handle;
mod scene;
mod server;
mod session;
pub mod transport;

pub use broadcast::MutationLog;
pub use config::ServerConfig;
pub use error::{ConfigError, Result, ServerError, TransportError};
pub use gui::{Gui, ScopeGuard};
pub use handle::{ModalHandle, NodeHandle, TabGroupHandle, WidgetHandle};
pub use scene::{Scene, SceneEvent, SceneEventKind, POSITION, WXYZ};
pub use server::Server;
pub use session::{InboundPort, ViewerSession};

pub use scenecast_gui::{DispatchReport, GuiEvent, GuiEventKind, WidgetSpec};
pub use scenecast_protocol::{
    ClientMessage, Envelope, NodeId, NodeInput, NodeKind, Origin, PathKey, ServerMessage, SessionId,
    Snapshot, WidgetId, WidgetInput, WidgetKind,
};
pub use scenecast_tree::NodeSpec;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
