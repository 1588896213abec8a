//! Widget records and value rules

use crate::error::GuiError;
use scenecast_protocol::{Props, WidgetId, WidgetKind, WidgetState};
use serde_json::Value;

/// Property holding selectable options (dropdowns, button groups)
pub const OPTIONS: &str = "options";
/// Lower bound for numeric widgets
pub const MIN: &str = "min";
/// Upper bound for numeric widgets
pub const MAX: &str = "max";

/// What the host asked for when adding a widget
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetSpec {
    /// Widget type
    pub kind: WidgetKind,
    /// Text shown next to (or on) the widget
    pub label: String,
    /// Initial value, `Null` for kinds without one
    pub value: Value,
    /// Kind-specific settings such as options or bounds
    pub props: Props,
    /// Enclosing container, `None` for the top level
    pub container: Option<WidgetId>,
    /// Explicit ordering key; declaration order when `None`
    pub order: Option<f64>,
    /// Initial visibility
    pub visible: bool,
    /// Initial disabled flag
    pub disabled: bool,
}

impl WidgetSpec {
    /// Visible, enabled widget with no value
    #[must_use]
    pub fn new(kind: WidgetKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            value: Value::Null,
            props: Props::new(),
            container: None,
            order: None,
            visible: true,
            disabled: false,
        }
    }

    /// Set the initial value
    #[must_use]
    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = value.into();
        self
    }

    /// Set one property
    #[must_use]
    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    /// Place inside a container
    #[must_use]
    pub fn in_container(mut self, container: Option<WidgetId>) -> Self {
        self.container = container;
        self
    }

    /// Override declaration order
    #[must_use]
    pub fn with_order(mut self, order: f64) -> Self {
        self.order = Some(order);
        self
    }

    /// Start disabled
    #[must_use]
    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Start hidden or shown
    #[must_use]
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }
}

/// Canonical record of one widget
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetRecord {
    /// Record identity
    pub id: WidgetId,
    /// Widget type
    pub kind: WidgetKind,
    /// Display label
    pub label: String,
    /// Enclosing container
    pub container: Option<WidgetId>,
    /// Ordering key within the container
    pub order: f64,
    /// Canonical value
    pub value: Value,
    /// Kind-specific settings
    pub props: Props,
    /// Visibility flag
    pub visible: bool,
    /// Disabled flag; viewer events are ignored while set
    pub disabled: bool,
    /// Set only on records handed back by a removal
    pub removed: bool,
}

impl WidgetRecord {
    /// Wire form for upserts and snapshots
    #[must_use]
    pub fn to_state(&self) -> WidgetState {
        WidgetState {
            id: self.id,
            kind: self.kind,
            label: self.label.clone(),
            container: self.container,
            order: self.order,
            value: self.value.clone(),
            props: self.props.clone(),
            visible: self.visible,
            disabled: self.disabled,
        }
    }
}

/// Check `value` against the widget kind and its props
///
/// Returns the value to store, which differs from the input only when a
/// numeric value had to be clamped into `[min, max]`.
pub(crate) fn normalize_value(kind: WidgetKind, props: &Props, value: Value) -> Result<Value, GuiError> {
    if !kind.holds_value() {
        return if value.is_null() {
            Ok(value)
        } else {
            Err(GuiError::invalid(kind, "kind carries no value"))
        };
    }

    match kind {
        WidgetKind::Checkbox => match value {
            Value::Bool(_) => Ok(value),
            _ => Err(GuiError::invalid(kind, "expected a boolean")),
        },
        WidgetKind::Text => match value {
            Value::String(_) => Ok(value),
            _ => Err(GuiError::invalid(kind, "expected a string")),
        },
        WidgetKind::Number | WidgetKind::Slider | WidgetKind::ProgressBar => {
            clamp_number(kind, props, value)
        }
        WidgetKind::Dropdown => check_option(kind, props, value, false),
        WidgetKind::ButtonGroup => check_option(kind, props, value, true),
        WidgetKind::Rgb => check_color(kind, value, 3),
        WidgetKind::Rgba => check_color(kind, value, 4),
        WidgetKind::Vector2 => check_vector(kind, value, 2),
        WidgetKind::Vector3 => check_vector(kind, value, 3),
        _ => Ok(value),
    }
}

fn clamp_number(kind: WidgetKind, props: &Props, value: Value) -> Result<Value, GuiError> {
    let Some(number) = value.as_f64() else {
        return Err(GuiError::invalid(kind, "expected a number"));
    };
    let (default_min, default_max) = if kind == WidgetKind::ProgressBar {
        (Some(0.0), Some(100.0))
    } else {
        (None, None)
    };
    let min = props.get(MIN).and_then(Value::as_f64).or(default_min);
    let max = props.get(MAX).and_then(Value::as_f64).or(default_max);

    let mut clamped = number;
    if let Some(min) = min {
        clamped = clamped.max(min);
    }
    if let Some(max) = max {
        clamped = clamped.min(max);
    }

    if (clamped - number).abs() > f64::EPSILON {
        Ok(Value::from(clamped))
    } else {
        Ok(value)
    }
}

fn check_option(kind: WidgetKind, props: &Props, value: Value, allow_null: bool) -> Result<Value, GuiError> {
    if allow_null && value.is_null() {
        return Ok(value);
    }
    let listed = props
        .get(OPTIONS)
        .and_then(Value::as_array)
        .is_some_and(|options| options.contains(&value));
    if listed {
        Ok(value)
    } else {
        Err(GuiError::invalid(kind, format!("{value} is not one of the options")))
    }
}

fn check_color(kind: WidgetKind, value: Value, channels: usize) -> Result<Value, GuiError> {
    let valid = value.as_array().is_some_and(|parts| {
        parts.len() == channels
            && parts
                .iter()
                .all(|c| c.as_u64().is_some_and(|c| c <= 255))
    });
    if valid {
        Ok(value)
    } else {
        Err(GuiError::invalid(kind, format!("expected {channels} channels in 0..=255")))
    }
}

fn check_vector(kind: WidgetKind, value: Value, len: usize) -> Result<Value, GuiError> {
    let valid = value
        .as_array()
        .is_some_and(|parts| parts.len() == len && parts.iter().all(Value::is_number));
    if valid {
        Ok(value)
    } else {
        Err(GuiError::invalid(kind, format!("expected {len} numbers")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bounded(min: f64, max: f64) -> Props {
        let mut props = Props::new();
        props.insert(MIN.into(), json!(min));
        props.insert(MAX.into(), json!(max));
        props
    }

    #[test]
    fn number_in_range_is_kept_verbatim() {
        let value = normalize_value(WidgetKind::Number, &bounded(0.0, 100.0), json!(42)).unwrap();
        assert_eq!(value, json!(42));
    }

    #[test]
    fn number_out_of_range_is_clamped() {
        let value = normalize_value(WidgetKind::Slider, &bounded(0.0, 1.0), json!(3.5)).unwrap();
        assert_eq!(value, json!(1.0));
    }

    #[test]
    fn progress_bar_has_implicit_bounds() {
        let value = normalize_value(WidgetKind::ProgressBar, &Props::new(), json!(150)).unwrap();
        assert_eq!(value, json!(100.0));
    }

    #[test]
    fn dropdown_requires_listed_option() {
        let mut props = Props::new();
        props.insert(OPTIONS.into(), json!(["red", "green"]));
        assert!(normalize_value(WidgetKind::Dropdown, &props, json!("green")).is_ok());
        assert!(normalize_value(WidgetKind::Dropdown, &props, json!("blue")).is_err());
        assert!(normalize_value(WidgetKind::Dropdown, &props, Value::Null).is_err());
        assert!(normalize_value(WidgetKind::ButtonGroup, &props, Value::Null).is_ok());
    }

    #[test]
    fn type_mismatches_rejected() {
        assert!(normalize_value(WidgetKind::Checkbox, &Props::new(), json!("yes")).is_err());
        assert!(normalize_value(WidgetKind::Text, &Props::new(), json!(1)).is_err());
        assert!(normalize_value(WidgetKind::Rgb, &Props::new(), json!([0, 255, 300])).is_err());
        assert!(normalize_value(WidgetKind::Rgba, &Props::new(), json!([0, 0, 0, 0])).is_ok());
        assert!(normalize_value(WidgetKind::Vector3, &Props::new(), json!([1.0, 2.0])).is_err());
        assert!(normalize_value(WidgetKind::Button, &Props::new(), json!(true)).is_err());
        assert!(normalize_value(WidgetKind::Folder, &Props::new(), Value::Null).is_ok());
    }
}
