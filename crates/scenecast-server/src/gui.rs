//! Control panel API

use crate::error::Result;
use crate::handle::{add_widget, ModalHandle, TabGroupHandle, WidgetHandle};
use crate::server::Server;
use parking_lot::Mutex;
use scenecast_gui::{GuiError, WidgetSpec, MAX, MIN, OPTIONS};
use scenecast_protocol::{WidgetId, WidgetKind};
use serde_json::Value;

/// Entry point for declaring widgets
///
/// Widgets appear in declaration order within their container. While a
/// [`ScopeGuard`] from [`Gui::scope`] is alive, widgets declared through this
/// `Gui` without an explicit container land in the scoped one. Scopes are not
/// shared with other `Gui` values from the same server.
#[derive(Debug)]
pub struct Gui {
    server: Server,
    scopes: Mutex<Vec<WidgetId>>,
}

/// Restores the previous container scope on drop
#[derive(Debug)]
#[must_use = "the scope ends when the guard is dropped"]
pub struct ScopeGuard<'a> {
    gui: &'a Gui,
    depth: usize,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.gui.scopes.lock().truncate(self.depth);
    }
}

fn options_value(options: &[&str]) -> Value {
    Value::Array(options.iter().map(|o| Value::String((*o).to_string())).collect())
}

impl Gui {
    pub(crate) fn new(server: Server) -> Self {
        Self {
            server,
            scopes: Mutex::new(Vec::new()),
        }
    }

    /// Declare a widget from a full spec
    ///
    /// # Errors
    /// - [`crate::ServerError::Gui`] for bad containers or values
    /// - [`crate::ServerError::ServerGone`] after the server stopped
    pub fn add(&self, mut spec: WidgetSpec) -> Result<WidgetHandle> {
        if spec.container.is_none() {
            spec.container = self.current_scope();
        }
        add_widget(&self.server.downgrade(), spec)
    }

    /// Container new widgets currently land in
    #[must_use]
    pub fn current_scope(&self) -> Option<WidgetId> {
        self.scopes.lock().last().copied()
    }

    /// Declare widgets inside `container` until the guard drops
    ///
    /// # Errors
    /// Returns [`crate::ServerError::Gui`] if `container` is not a folder,
    /// tab or modal, or a removed-handle error.
    pub fn scope(&self, container: &WidgetHandle) -> Result<ScopeGuard<'_>> {
        if container.is_removed() {
            return Err(GuiError::Removed(container.id()).into());
        }
        if !matches!(
            container.kind(),
            WidgetKind::Folder | WidgetKind::Tab | WidgetKind::Modal
        ) {
            return Err(GuiError::InvalidContainer {
                container: container.kind(),
                child: WidgetKind::Folder,
            }
            .into());
        }
        let mut scopes = self.scopes.lock();
        let depth = scopes.len();
        scopes.push(container.id());
        Ok(ScopeGuard { gui: self, depth })
    }

    /// Live handle for `id`, or `None` if it was removed or never existed
    ///
    /// # Errors
    /// Returns [`crate::ServerError::ServerGone`] after the server stopped.
    pub fn get(&self, id: WidgetId) -> Result<Option<WidgetHandle>> {
        let kind = self
            .server
            .inner()
            .read(|state| state.widgets.get(id).map(|record| record.kind))?;
        Ok(kind.map(|kind| WidgetHandle::new(self.server.downgrade(), id, kind)))
    }

    /// Widgets directly inside `container` (`None` for the top level), in order
    ///
    /// # Errors
    /// Returns [`crate::ServerError::ServerGone`] after the server stopped.
    pub fn members_of(&self, container: Option<WidgetId>) -> Result<Vec<WidgetId>> {
        self.server.inner().read(|state| state.widgets.members_of(container))
    }

    /// Number of live widgets
    ///
    /// # Errors
    /// Returns [`crate::ServerError::ServerGone`] after the server stopped.
    pub fn widget_count(&self) -> Result<usize> {
        self.server.inner().read(|state| state.widgets.len())
    }

    /// Momentary button; observe with [`WidgetHandle::on_click`]
    ///
    /// # Errors
    /// See [`Self::add`].
    pub fn add_button(&self, label: impl Into<String>) -> Result<WidgetHandle> {
        self.add(WidgetSpec::new(WidgetKind::Button, label))
    }

    /// Row of buttons; activation carries the clicked option
    ///
    /// # Errors
    /// See [`Self::add`].
    pub fn add_button_group(&self, label: impl Into<String>, options: &[&str]) -> Result<WidgetHandle> {
        self.add(WidgetSpec::new(WidgetKind::ButtonGroup, label).with_prop(OPTIONS, options_value(options)))
    }

    /// Boolean toggle
    ///
    /// # Errors
    /// See [`Self::add`].
    pub fn add_checkbox(&self, label: impl Into<String>, initial: bool) -> Result<WidgetHandle> {
        self.add(WidgetSpec::new(WidgetKind::Checkbox, label).with_value(initial))
    }

    /// Free text input
    ///
    /// # Errors
    /// See [`Self::add`].
    pub fn add_text(&self, label: impl Into<String>, initial: impl Into<String>) -> Result<WidgetHandle> {
        self.add(WidgetSpec::new(WidgetKind::Text, label).with_value(initial.into()))
    }

    /// Unbounded number input
    ///
    /// # Errors
    /// See [`Self::add`].
    pub fn add_number(&self, label: impl Into<String>, initial: f64) -> Result<WidgetHandle> {
        self.add(WidgetSpec::new(WidgetKind::Number, label).with_value(initial))
    }

    /// Bounded slider; out-of-range values are clamped
    ///
    /// # Errors
    /// See [`Self::add`].
    pub fn add_slider(
        &self,
        label: impl Into<String>,
        min: f64,
        max: f64,
        step: f64,
        initial: f64,
    ) -> Result<WidgetHandle> {
        self.add(
            WidgetSpec::new(WidgetKind::Slider, label)
                .with_prop(MIN, min)
                .with_prop(MAX, max)
                .with_prop("step", step)
                .with_value(initial),
        )
    }

    /// Single choice from `options`; defaults to the first option
    ///
    /// # Errors
    /// See [`Self::add`]; `initial` must be one of `options`.
    pub fn add_dropdown(
        &self,
        label: impl Into<String>,
        options: &[&str],
        initial: Option<&str>,
    ) -> Result<WidgetHandle> {
        let initial = initial
            .or_else(|| options.first().copied())
            .map_or(Value::Null, |o| Value::String(o.to_string()));
        self.add(
            WidgetSpec::new(WidgetKind::Dropdown, label)
                .with_prop(OPTIONS, options_value(options))
                .with_value(initial),
        )
    }

    /// Rendered markdown block
    ///
    /// # Errors
    /// See [`Self::add`].
    pub fn add_markdown(&self, content: impl Into<String>) -> Result<WidgetHandle> {
        self.add(WidgetSpec::new(WidgetKind::Markdown, "").with_prop("content", content.into()))
    }

    /// RGB color picker
    ///
    /// # Errors
    /// See [`Self::add`].
    pub fn add_rgb(&self, label: impl Into<String>, initial: [u8; 3]) -> Result<WidgetHandle> {
        self.add(WidgetSpec::new(WidgetKind::Rgb, label).with_value(initial.to_vec()))
    }

    /// RGBA color picker
    ///
    /// # Errors
    /// See [`Self::add`].
    pub fn add_rgba(&self, label: impl Into<String>, initial: [u8; 4]) -> Result<WidgetHandle> {
        self.add(WidgetSpec::new(WidgetKind::Rgba, label).with_value(initial.to_vec()))
    }

    /// Two-component vector input
    ///
    /// # Errors
    /// See [`Self::add`].
    pub fn add_vector2(&self, label: impl Into<String>, initial: [f64; 2]) -> Result<WidgetHandle> {
        self.add(WidgetSpec::new(WidgetKind::Vector2, label).with_value(initial.to_vec()))
    }

    /// Three-component vector input
    ///
    /// # Errors
    /// See [`Self::add`].
    pub fn add_vector3(&self, label: impl Into<String>, initial: [f64; 3]) -> Result<WidgetHandle> {
        self.add(WidgetSpec::new(WidgetKind::Vector3, label).with_value(initial.to_vec()))
    }

    /// Read-only progress bar, 0 to 100
    ///
    /// # Errors
    /// See [`Self::add`].
    pub fn add_progress_bar(&self, value: f64) -> Result<WidgetHandle> {
        self.add(WidgetSpec::new(WidgetKind::ProgressBar, "").with_value(value))
    }

    /// Collapsible folder
    ///
    /// # Errors
    /// See [`Self::add`].
    pub fn add_folder(&self, label: impl Into<String>) -> Result<WidgetHandle> {
        self.add(WidgetSpec::new(WidgetKind::Folder, label))
    }

    /// Tab group; add tabs with [`TabGroupHandle::add_tab`]
    ///
    /// # Errors
    /// See [`Self::add`].
    pub fn add_tab_group(&self) -> Result<TabGroupHandle> {
        self.add(WidgetSpec::new(WidgetKind::TabGroup, "")).map(TabGroupHandle)
    }

    /// Modal dialog; dismiss with [`ModalHandle::close`]
    ///
    /// Modals always sit at the top level, regardless of the current scope.
    ///
    /// # Errors
    /// See [`Self::add`].
    pub fn add_modal(&self, title: impl Into<String>) -> Result<ModalHandle> {
        add_widget(&self.server.downgrade(), WidgetSpec::new(WidgetKind::Modal, title)).map(ModalHandle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn labels(server: &Server) -> Vec<String> {
        server
            .snapshot()
            .unwrap()
            .widgets
            .into_iter()
            .map(|w| w.label)
            .collect()
    }

    #[test]
    fn scopes_nest_and_restore() {
        let server = Server::default();
        let gui = server.gui();
        let outer = gui.add_folder("Outer").unwrap();
        {
            let _outer = gui.scope(&outer).unwrap();
            gui.add_button("In Outer").unwrap();
            let inner = gui.add_folder("Inner").unwrap();
            {
                let _inner = gui.scope(&inner).unwrap();
                gui.add_button("In Inner").unwrap();
            }
            assert_eq!(gui.current_scope(), Some(outer.id()));
            gui.add_button("Back In Outer").unwrap();
        }
        assert_eq!(gui.current_scope(), None);
        gui.add_button("Top").unwrap();

        assert_eq!(
            labels(&server),
            vec!["Outer", "In Outer", "Inner", "In Inner", "Back In Outer", "Top"]
        );
    }

    #[test]
    fn scope_belongs_to_one_gui_value() {
        let server = Server::default();
        let scoped = server.gui();
        let folder = scoped.add_folder("Folder").unwrap();
        let _scope = scoped.scope(&folder).unwrap();

        let other = server.gui();
        assert_eq!(other.current_scope(), None);
        let top = other.add_button("Top").unwrap();
        let inside = scoped.add_button("Inside").unwrap();

        assert_eq!(scoped.members_of(None).unwrap(), vec![folder.id(), top.id()]);
        assert_eq!(scoped.members_of(Some(folder.id())).unwrap(), vec![inside.id()]);
    }

    #[test]
    fn dropdown_defaults_to_first_option() {
        let server = Server::default();
        let gui = server.gui();
        let dropdown = gui.add_dropdown("Shape", &["circle", "square"], None).unwrap();
        assert_eq!(dropdown.value().unwrap(), json!("circle"));
        assert!(gui.add_dropdown("Bad", &["a"], Some("b")).is_err());
    }

    #[test]
    fn slider_clamps_host_values() {
        let server = Server::default();
        let slider = server.gui().add_slider("Opacity", 0.0, 1.0, 0.1, 0.5).unwrap();
        slider.set_value(3.0).unwrap();
        assert_eq!(slider.value().unwrap(), json!(1.0));
    }

    #[test]
    fn tab_group_and_modal() {
        let server = Server::default();
        let gui = server.gui();
        let tabs = gui.add_tab_group().unwrap();
        let alpha = tabs.add_tab("Alpha").unwrap();
        let button = {
            let _scope = gui.scope(&alpha).unwrap();
            gui.add_button("Alpha Btn").unwrap()
        };
        assert!(gui.scope(&tabs).is_err());

        let modal = gui.add_modal("Confirm").unwrap();
        {
            let _scope = gui.scope(&modal).unwrap();
            gui.add_markdown("Are you sure?").unwrap();
        }
        assert_eq!(gui.widget_count().unwrap(), 5);

        modal.close().unwrap();
        assert_eq!(gui.widget_count().unwrap(), 3);

        tabs.remove().unwrap();
        assert!(button.is_removed());
        assert!(gui.get(button.id()).unwrap().is_none());
    }

    #[test]
    fn scope_rejects_removed_container() {
        let server = Server::default();
        let gui = server.gui();
        let folder = gui.add_folder("Gone").unwrap();
        folder.remove().unwrap();
        assert!(gui.scope(&folder).unwrap_err().is_removed_handle());
    }
}
