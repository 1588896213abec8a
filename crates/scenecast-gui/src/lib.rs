//! scenecast control panel
//!
//! Canonical widget state: declaration-ordered widgets grouped into
//! containers (folders, tab groups, tabs, modals), each with a value,
//! flags and host observers.
//!
//! # Core Concepts
//!
//! - [`WidgetRegistry`]: Id → record mapping plus container membership
//! - [`WidgetSpec`]: What the host asks for when declaring a widget
//! - [`ObserverList`] / [`dispatch`]: Ordered callbacks, isolated failures
//!
//! Observers never run under the registry owner's lock: mutating calls hand
//! back the callbacks to invoke and the caller dispatches them afterwards.

#![allow(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod observer;
mod registry;
mod widget;

pub use error::GuiError;
pub use observer::{dispatch, DispatchReport, Observer, ObserverList};
pub use registry::{AppliedInput, GuiEvent, GuiEventKind, RemovedWidgets, WidgetRegistry};
pub use widget::{WidgetRecord, WidgetSpec, MAX, MIN, OPTIONS};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
