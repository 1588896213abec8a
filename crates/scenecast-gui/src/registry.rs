//! Widget registry
//!
//! Provides [`WidgetRegistry`], the canonical id → record mapping of the
//! control panel, grouped by container and ordered by declaration.

use crate::error::GuiError;
use crate::observer::{Observer, ObserverList};
use crate::widget::{normalize_value, WidgetRecord, WidgetSpec};
use scenecast_protocol::{Origin, ServerMessage, WidgetId, WidgetInput, WidgetKind, WidgetState};
use serde_json::Value;
use std::collections::HashMap;

/// Which observer list an event goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuiEventKind {
    /// The value changed
    Update,
    /// The widget was activated
    Click,
}

/// Event handed to widget observers
#[derive(Debug, Clone, PartialEq)]
pub struct GuiEvent {
    /// Widget the event is about
    pub widget: WidgetId,
    /// Update or click
    pub kind: GuiEventKind,
    /// Who caused it
    pub origin: Origin,
    /// Canonical value after the event was applied
    pub value: Value,
}

#[derive(Debug, Default)]
struct WidgetObservers {
    on_update: ObserverList<GuiEvent>,
    on_click: ObserverList<GuiEvent>,
}

/// Result of [`WidgetRegistry::apply_input`]
#[derive(Clone)]
pub struct AppliedInput {
    /// Event to hand to observers
    pub event: GuiEvent,
    /// Value change to broadcast, if the input changed canonical state
    pub mutation: Option<ServerMessage>,
    /// The stored value differs from the one submitted (clamped), so the
    /// originating viewer must receive the mutation too
    pub normalized: bool,
    /// Observers to run once the state lock is released
    pub observers: Vec<Observer<GuiEvent>>,
}

impl std::fmt::Debug for AppliedInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppliedInput")
            .field("event", &self.event)
            .field("mutation", &self.mutation)
            .field("normalized", &self.normalized)
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Result of [`WidgetRegistry::remove`]
#[derive(Debug, Clone, Default)]
pub struct RemovedWidgets {
    /// Removed records, the target last
    pub removed: Vec<WidgetRecord>,
    /// One `remove_widget` per record, innermost first
    pub mutations: Vec<ServerMessage>,
}

impl RemovedWidgets {
    /// `true` when the call removed nothing
    #[inline]
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty()
    }
}

/// Canonical control panel
#[derive(Debug, Default)]
pub struct WidgetRegistry {
    records: HashMap<WidgetId, WidgetRecord>,
    /// Members of each container (`None` = top level), sorted by order
    members: HashMap<Option<WidgetId>, Vec<WidgetId>>,
    observers: HashMap<WidgetId, WidgetObservers>,
    next_order: f64,
}

impl WidgetRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live widgets
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Declare a widget
    ///
    /// # Errors
    /// - [`GuiError::UnknownContainer`] if the container is not live
    /// - [`GuiError::InvalidContainer`] if the container cannot hold this kind
    /// - [`GuiError::InvalidValue`] if the initial value does not fit or the
    ///   explicit order is not finite
    pub fn add(&mut self, spec: WidgetSpec) -> Result<(WidgetId, ServerMessage), GuiError> {
        self.check_placement(spec.container, spec.kind)?;
        if spec.order.is_some_and(|order| !order.is_finite()) {
            return Err(GuiError::invalid(spec.kind, "order must be finite"));
        }
        let value = normalize_value(spec.kind, &spec.props, spec.value)?;

        let order = spec.order.unwrap_or(self.next_order);
        self.next_order = self.next_order.max(order) + 1.0;

        let record = WidgetRecord {
            id: WidgetId::new(),
            kind: spec.kind,
            label: spec.label,
            container: spec.container,
            order,
            value,
            props: spec.props,
            visible: spec.visible,
            disabled: spec.disabled,
            removed: false,
        };
        let id = record.id;
        let message = ServerMessage::UpsertWidget(record.to_state());

        let siblings = self.members.entry(record.container).or_default();
        let position = siblings
            .iter()
            .position(|other| self.records.get(other).is_some_and(|r| r.order > order))
            .unwrap_or(siblings.len());
        siblings.insert(position, id);
        self.records.insert(id, record);

        Ok((id, message))
    }

    fn check_placement(&self, container: Option<WidgetId>, kind: WidgetKind) -> Result<(), GuiError> {
        let Some(container_id) = container else {
            return if kind == WidgetKind::Tab {
                Err(GuiError::NeedsContainer(kind))
            } else {
                Ok(())
            };
        };
        let parent = self
            .records
            .get(&container_id)
            .ok_or(GuiError::UnknownContainer(container_id))?;

        let allowed = match parent.kind {
            WidgetKind::TabGroup => kind == WidgetKind::Tab,
            WidgetKind::Folder | WidgetKind::Tab | WidgetKind::Modal => kind != WidgetKind::Tab,
            _ => false,
        };
        if allowed {
            Ok(())
        } else {
            Err(GuiError::InvalidContainer {
                container: parent.kind,
                child: kind,
            })
        }
    }

    /// Remove a widget; containers take their members with them
    ///
    /// Removing an unknown or already-removed id is a no-op.
    pub fn remove(&mut self, id: WidgetId) -> RemovedWidgets {
        let Some(container) = self.records.get(&id).map(|r| r.container) else {
            return RemovedWidgets::default();
        };

        let mut out = RemovedWidgets::default();
        self.remove_recursive(id, &mut out);

        if let Some(siblings) = self.members.get_mut(&container) {
            siblings.retain(|other| *other != id);
            if siblings.is_empty() {
                self.members.remove(&container);
            }
        }
        out
    }

    fn remove_recursive(&mut self, id: WidgetId, out: &mut RemovedWidgets) {
        if let Some(members) = self.members.remove(&Some(id)) {
            for member in members {
                self.remove_recursive(member, out);
            }
        }
        self.observers.remove(&id);
        if let Some(mut record) = self.records.remove(&id) {
            record.removed = true;
            out.removed.push(record);
            out.mutations.push(ServerMessage::RemoveWidget { id });
        }
    }

    /// Live record
    #[inline]
    #[must_use]
    pub fn get(&self, id: WidgetId) -> Option<&WidgetRecord> {
        self.records.get(&id)
    }

    /// Live record or [`GuiError::Removed`]
    ///
    /// # Errors
    /// Returns [`GuiError::Removed`] if the widget is gone.
    pub fn resolve(&self, id: WidgetId) -> Result<&WidgetRecord, GuiError> {
        self.records.get(&id).ok_or(GuiError::Removed(id))
    }

    fn resolve_mut(&mut self, id: WidgetId) -> Result<&mut WidgetRecord, GuiError> {
        self.records.get_mut(&id).ok_or(GuiError::Removed(id))
    }

    /// Set the canonical value
    ///
    /// Host writes and viewer writes share this path; only the origin
    /// differs, and it does not change what is stored or broadcast.
    ///
    /// # Errors
    /// Returns [`GuiError::Removed`] or [`GuiError::InvalidValue`].
    pub fn set_value(&mut self, id: WidgetId, value: Value) -> Result<ServerMessage, GuiError> {
        let record = self.resolve_mut(id)?;
        let value = normalize_value(record.kind, &record.props, value)?;
        record.value = value.clone();
        Ok(ServerMessage::UpdateWidgetValue { id, value })
    }

    /// Show or hide
    ///
    /// # Errors
    /// Returns [`GuiError::Removed`] if the widget is gone.
    pub fn set_visible(&mut self, id: WidgetId, visible: bool) -> Result<ServerMessage, GuiError> {
        let record = self.resolve_mut(id)?;
        record.visible = visible;
        Ok(flags_message(record))
    }

    /// Enable or disable
    ///
    /// # Errors
    /// Returns [`GuiError::Removed`] if the widget is gone.
    pub fn set_disabled(&mut self, id: WidgetId, disabled: bool) -> Result<ServerMessage, GuiError> {
        let record = self.resolve_mut(id)?;
        record.disabled = disabled;
        Ok(flags_message(record))
    }

    /// Change a kind-specific property (label-like settings, options, bounds)
    ///
    /// The current value is re-checked against the new props; if it no longer
    /// fits, the change is rejected.
    ///
    /// # Errors
    /// Returns [`GuiError::Removed`] or [`GuiError::InvalidValue`].
    pub fn set_prop(&mut self, id: WidgetId, key: &str, value: Value) -> Result<ServerMessage, GuiError> {
        let record = self.resolve_mut(id)?;
        let mut props = record.props.clone();
        props.insert(key.to_string(), value);
        let current = normalize_value(record.kind, &props, record.value.clone())?;
        record.props = props;
        record.value = current;
        Ok(ServerMessage::UpsertWidget(record.to_state()))
    }

    /// Register an observer
    ///
    /// # Errors
    /// Returns [`GuiError::Removed`] if the widget is gone.
    pub fn observe<F>(&mut self, id: WidgetId, kind: GuiEventKind, callback: F) -> Result<(), GuiError>
    where
        F: Fn(&GuiEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.resolve(id)?;
        let observers = self.observers.entry(id).or_default();
        match kind {
            GuiEventKind::Update => observers.on_update.push(callback),
            GuiEventKind::Click => observers.on_click.push(callback),
        }
        Ok(())
    }

    /// Number of observers registered for one event kind
    #[must_use]
    pub fn observer_count(&self, id: WidgetId, kind: GuiEventKind) -> usize {
        self.observers.get(&id).map_or(0, |o| match kind {
            GuiEventKind::Update => o.on_update.len(),
            GuiEventKind::Click => o.on_click.len(),
        })
    }

    /// Fold a viewer interaction into canonical state
    ///
    /// The value is applied before this returns; the observers to notify are
    /// handed back so they can run outside the caller's critical section.
    ///
    /// # Errors
    /// - [`GuiError::Removed`] for unknown widgets
    /// - [`GuiError::Disabled`] while the widget is disabled
    /// - [`GuiError::Unsupported`] if the kind does not take this input
    /// - [`GuiError::InvalidValue`] if the value does not fit
    pub fn apply_input(
        &mut self,
        id: WidgetId,
        input: WidgetInput,
        origin: Origin,
    ) -> Result<AppliedInput, GuiError> {
        let record = self.resolve(id)?;
        if record.disabled {
            return Err(GuiError::Disabled(id));
        }
        let kind = record.kind;

        let (event_kind, submitted) = match input {
            WidgetInput::Value { value } => {
                if !kind.is_viewer_editable() {
                    return Err(GuiError::Unsupported { kind, input: "value" });
                }
                (GuiEventKind::Update, Some(value))
            }
            WidgetInput::Activate { value } => {
                if !kind.is_activatable() {
                    return Err(GuiError::Unsupported { kind, input: "activation" });
                }
                match (kind, value) {
                    (WidgetKind::ButtonGroup, Some(option)) => (GuiEventKind::Click, Some(option)),
                    (WidgetKind::ButtonGroup, None) => {
                        return Err(GuiError::invalid(kind, "activation must name an option"));
                    }
                    _ => (GuiEventKind::Click, None),
                }
            }
        };

        let mutation = match &submitted {
            Some(value) => Some(self.set_value(id, value.clone())?),
            None => None,
        };
        let value = self.resolve(id)?.value.clone();
        let normalized = submitted.is_some_and(|submitted| submitted != value);
        let observers = self
            .observers
            .get(&id)
            .map(|o| match event_kind {
                GuiEventKind::Update => o.on_update.snapshot(),
                GuiEventKind::Click => o.on_click.snapshot(),
            })
            .unwrap_or_default();

        Ok(AppliedInput {
            event: GuiEvent {
                widget: id,
                kind: event_kind,
                origin,
                value,
            },
            mutation,
            normalized,
            observers,
        })
    }

    /// Members of a container in display order
    #[must_use]
    pub fn members_of(&self, container: Option<WidgetId>) -> Vec<WidgetId> {
        self.members.get(&container).cloned().unwrap_or_default()
    }

    /// Wire states of every live widget: containers before their members,
    /// members in display order
    #[must_use]
    pub fn snapshot(&self) -> Vec<WidgetState> {
        let mut out = Vec::with_capacity(self.records.len());
        self.collect_ordered(None, &mut out);
        out
    }

    fn collect_ordered(&self, container: Option<WidgetId>, out: &mut Vec<WidgetState>) {
        let Some(members) = self.members.get(&container) else {
            return;
        };
        for id in members {
            if let Some(record) = self.records.get(id) {
                out.push(record.to_state());
                if record.kind.is_container() {
                    self.collect_ordered(Some(*id), out);
                }
            }
        }
    }
}

fn flags_message(record: &WidgetRecord) -> ServerMessage {
    ServerMessage::UpdateWidgetFlags {
        id: record.id,
        visible: record.visible,
        disabled: record.disabled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::dispatch;
    use crate::widget::{MAX, MIN, OPTIONS};
    use parking_lot::Mutex;
    use scenecast_protocol::SessionId;
    use serde_json::json;
    use std::sync::Arc;

    fn add(reg: &mut WidgetRegistry, spec: WidgetSpec) -> WidgetId {
        reg.add(spec).unwrap().0
    }

    fn labels(reg: &WidgetRegistry) -> Vec<String> {
        reg.snapshot().into_iter().map(|w| w.label).collect()
    }

    #[test]
    fn declaration_order_preserved() {
        let mut reg = WidgetRegistry::new();
        for name in ["First", "Second", "Third"] {
            add(&mut reg, WidgetSpec::new(WidgetKind::Button, name));
        }
        assert_eq!(labels(&reg), vec!["First", "Second", "Third"]);
    }

    #[test]
    fn explicit_order_slots_between() {
        let mut reg = WidgetRegistry::new();
        add(&mut reg, WidgetSpec::new(WidgetKind::Button, "a"));
        add(&mut reg, WidgetSpec::new(WidgetKind::Button, "c"));
        add(&mut reg, WidgetSpec::new(WidgetKind::Button, "b").with_order(0.5));
        assert_eq!(labels(&reg), vec!["a", "b", "c"]);

        // Declaration order continues after the largest key seen.
        add(&mut reg, WidgetSpec::new(WidgetKind::Button, "d"));
        assert_eq!(labels(&reg), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn snapshot_lists_containers_before_members() {
        let mut reg = WidgetRegistry::new();
        let folder = add(&mut reg, WidgetSpec::new(WidgetKind::Folder, "Settings"));
        add(&mut reg, WidgetSpec::new(WidgetKind::Button, "Top"));
        add(
            &mut reg,
            WidgetSpec::new(WidgetKind::Checkbox, "Dark Mode")
                .with_value(false)
                .in_container(Some(folder)),
        );
        assert_eq!(labels(&reg), vec!["Settings", "Dark Mode", "Top"]);
    }

    #[test]
    fn container_remove_cascades_innermost_first() {
        let mut reg = WidgetRegistry::new();
        let group = add(&mut reg, WidgetSpec::new(WidgetKind::TabGroup, ""));
        let tab = add(&mut reg, WidgetSpec::new(WidgetKind::Tab, "Alpha").in_container(Some(group)));
        let button = add(&mut reg, WidgetSpec::new(WidgetKind::Button, "Alpha Btn").in_container(Some(tab)));
        let other = add(&mut reg, WidgetSpec::new(WidgetKind::Button, "Outside"));

        let out = reg.remove(group);

        assert_eq!(out.removed.len(), 3);
        assert_eq!(
            out.mutations,
            vec![
                ServerMessage::RemoveWidget { id: button },
                ServerMessage::RemoveWidget { id: tab },
                ServerMessage::RemoveWidget { id: group },
            ]
        );
        assert!(reg.get(button).is_none());
        assert!(reg.get(other).is_some());
        assert_eq!(reg.members_of(None), vec![other]);
    }

    #[test]
    fn remove_twice_is_noop() {
        let mut reg = WidgetRegistry::new();
        let id = add(&mut reg, WidgetSpec::new(WidgetKind::Button, "Temp"));
        assert!(!reg.remove(id).is_noop());
        assert!(reg.remove(id).is_noop());
    }

    #[test]
    fn placement_rules() {
        let mut reg = WidgetRegistry::new();
        let group = add(&mut reg, WidgetSpec::new(WidgetKind::TabGroup, ""));
        let button = add(&mut reg, WidgetSpec::new(WidgetKind::Button, "b"));

        assert!(matches!(
            reg.add(WidgetSpec::new(WidgetKind::Button, "x").in_container(Some(group))),
            Err(GuiError::InvalidContainer { .. })
        ));
        assert_eq!(
            reg.add(WidgetSpec::new(WidgetKind::Tab, "t")),
            Err(GuiError::NeedsContainer(WidgetKind::Tab))
        );
        assert!(matches!(
            reg.add(WidgetSpec::new(WidgetKind::Button, "x").in_container(Some(button))),
            Err(GuiError::InvalidContainer { .. })
        ));
        let ghost = WidgetId::new();
        assert_eq!(
            reg.add(WidgetSpec::new(WidgetKind::Button, "x").in_container(Some(ghost))),
            Err(GuiError::UnknownContainer(ghost))
        );
    }

    #[test]
    fn setters_reject_removed() {
        let mut reg = WidgetRegistry::new();
        let id = add(&mut reg, WidgetSpec::new(WidgetKind::Text, "Name").with_value("x"));
        reg.remove(id);
        assert_eq!(reg.set_value(id, json!("y")), Err(GuiError::Removed(id)));
        assert_eq!(reg.set_visible(id, false), Err(GuiError::Removed(id)));
        assert_eq!(reg.set_disabled(id, true), Err(GuiError::Removed(id)));
    }

    #[test]
    fn flags_broadcast_together() {
        let mut reg = WidgetRegistry::new();
        let id = add(&mut reg, WidgetSpec::new(WidgetKind::Button, "Hideable"));
        let msg = reg.set_visible(id, false).unwrap();
        assert_eq!(
            msg,
            ServerMessage::UpdateWidgetFlags {
                id,
                visible: false,
                disabled: false
            }
        );
    }

    #[test]
    fn input_applies_value_before_observers_see_it() {
        let mut reg = WidgetRegistry::new();
        let id = add(&mut reg, WidgetSpec::new(WidgetKind::Number, "Count").with_value(42));
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in 0..2 {
            let seen = Arc::clone(&seen);
            reg.observe(id, GuiEventKind::Update, move |event| {
                seen.lock().push((tag, event.value.clone()));
                Ok(())
            })
            .unwrap();
        }

        let session = SessionId::new();
        let applied = reg
            .apply_input(id, WidgetInput::Value { value: json!(99) }, Origin::Viewer(session))
            .unwrap();

        assert_eq!(reg.get(id).unwrap().value, json!(99));
        assert_eq!(
            applied.mutation,
            Some(ServerMessage::UpdateWidgetValue { id, value: json!(99) })
        );
        let report = dispatch(&applied.observers, &applied.event);
        assert_eq!(report.invoked, 2);
        assert_eq!(*seen.lock(), vec![(0, json!(99)), (1, json!(99))]);
        assert_eq!(applied.event.origin.session(), Some(session));
        assert!(!applied.normalized);
    }

    #[test]
    fn clamped_input_is_flagged_normalized() {
        let mut reg = WidgetRegistry::new();
        let id = add(
            &mut reg,
            WidgetSpec::new(WidgetKind::Slider, "Gain")
                .with_prop(MIN, 0.0)
                .with_prop(MAX, 1.0)
                .with_value(0.5),
        );

        let applied = reg
            .apply_input(id, WidgetInput::Value { value: json!(3.0) }, Origin::Viewer(SessionId::new()))
            .unwrap();

        assert!(applied.normalized);
        assert_eq!(reg.get(id).unwrap().value, json!(1.0));
        assert_eq!(applied.event.value, json!(1.0));
        assert_eq!(
            applied.mutation,
            Some(ServerMessage::UpdateWidgetValue { id, value: json!(1.0) })
        );
    }

    #[test]
    fn non_finite_order_rejected() {
        let mut reg = WidgetRegistry::new();
        for order in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let result = reg.add(WidgetSpec::new(WidgetKind::Button, "b").with_order(order));
            assert!(matches!(result, Err(GuiError::InvalidValue { .. })));
        }
        assert!(reg.is_empty());

        add(&mut reg, WidgetSpec::new(WidgetKind::Button, "First"));
        add(&mut reg, WidgetSpec::new(WidgetKind::Button, "Second"));
        assert_eq!(labels(&reg), vec!["First", "Second"]);
    }

    #[test]
    fn disabled_widget_ignores_input() {
        let mut reg = WidgetRegistry::new();
        let id = add(&mut reg, WidgetSpec::new(WidgetKind::Button, "No Click").with_disabled(true));
        let result = reg.apply_input(id, WidgetInput::Activate { value: None }, Origin::Host);
        assert_eq!(result.unwrap_err(), GuiError::Disabled(id));
    }

    #[test]
    fn button_activation_selects_click_observers() {
        let mut reg = WidgetRegistry::new();
        let id = add(&mut reg, WidgetSpec::new(WidgetKind::Button, "Click Me"));
        reg.observe(id, GuiEventKind::Click, |_| Ok(())).unwrap();
        reg.observe(id, GuiEventKind::Update, |_| Ok(())).unwrap();

        let applied = reg
            .apply_input(id, WidgetInput::Activate { value: None }, Origin::Host)
            .unwrap();

        assert_eq!(applied.event.kind, GuiEventKind::Click);
        assert!(applied.mutation.is_none());
        assert_eq!(applied.observers.len(), 1);
    }

    #[test]
    fn button_group_activation_sets_value() {
        let mut reg = WidgetRegistry::new();
        let id = add(
            &mut reg,
            WidgetSpec::new(WidgetKind::ButtonGroup, "Action").with_prop(OPTIONS, json!(["Save", "Load"])),
        );

        let applied = reg
            .apply_input(id, WidgetInput::Activate { value: Some(json!("Load")) }, Origin::Host)
            .unwrap();

        assert_eq!(applied.event.value, json!("Load"));
        assert!(applied.mutation.is_some());
        assert!(reg
            .apply_input(id, WidgetInput::Activate { value: Some(json!("Nope")) }, Origin::Host)
            .is_err());
    }

    #[test]
    fn value_input_rejected_for_buttons_and_progress() {
        let mut reg = WidgetRegistry::new();
        let button = add(&mut reg, WidgetSpec::new(WidgetKind::Button, "b"));
        let bar = add(&mut reg, WidgetSpec::new(WidgetKind::ProgressBar, "").with_value(10));
        for id in [button, bar] {
            assert!(matches!(
                reg.apply_input(id, WidgetInput::Value { value: json!(1) }, Origin::Host),
                Err(GuiError::Unsupported { .. })
            ));
        }
    }

    #[test]
    fn set_prop_revalidates_value() {
        let mut reg = WidgetRegistry::new();
        let id = add(
            &mut reg,
            WidgetSpec::new(WidgetKind::Dropdown, "Shape")
                .with_prop(OPTIONS, json!(["circle", "square"]))
                .with_value("square"),
        );
        assert!(reg.set_prop(id, OPTIONS, json!(["circle"])).is_err());
        assert!(reg.set_prop(id, OPTIONS, json!(["square", "triangle"])).is_ok());
    }

    #[test]
    fn observers_dropped_with_widget() {
        let mut reg = WidgetRegistry::new();
        let id = add(&mut reg, WidgetSpec::new(WidgetKind::Button, "b"));
        reg.observe(id, GuiEventKind::Click, |_| Ok(())).unwrap();
        reg.remove(id);
        assert_eq!(reg.observer_count(id, GuiEventKind::Click), 0);
        assert!(reg.observe(id, GuiEventKind::Click, |_| Ok(())).is_err());
    }
}
