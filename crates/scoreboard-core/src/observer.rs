//! Display observers bound to settings keys.
//!
//! Each observer mirrors one widget of the control panel. The kind is fixed
//! when the observer is bound; notifications go through
//! [`Observer::apply_value`] and the write path reads
//! [`Observer::current_value`].

use std::fmt;

use serde_json::Value;

use crate::model::{display_value, is_truthy};

/// Colour shown while a colour setting is cleared.
pub const CLEARED_COLOR: &str = "#666666";

/// Value a toggle writes when switched on.
pub const TOGGLE_ON: &str = "On";

#[derive(Debug, Clone, PartialEq)]
pub enum Observer {
    Toggle(ToggleObserver),
    Select(SelectObserver),
    Text(TextObserver),
    Color(ColorObserver),
    Button(ButtonObserver),
}

impl Observer {
    pub fn toggle() -> Self {
        Observer::Toggle(ToggleObserver::default())
    }

    pub fn select<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Observer::Select(SelectObserver::new(options))
    }

    pub fn text() -> Self {
        Observer::Text(TextObserver::default())
    }

    /// Text field that writes `null` instead of an empty string.
    pub fn text_null_when_empty() -> Self {
        Observer::Text(TextObserver {
            null_when_empty: true,
            ..TextObserver::default()
        })
    }

    pub fn color() -> Self {
        Observer::Color(ColorObserver::default())
    }

    pub fn button(value: impl Into<Value>) -> Self {
        Observer::Button(ButtonObserver::new(value))
    }

    /// Update the displayed state from a store notification.
    pub fn apply_value(&mut self, value: &Value) {
        match self {
            Observer::Toggle(o) => o.apply_value(value),
            Observer::Select(o) => o.apply_value(value),
            Observer::Text(o) => o.apply_value(value),
            Observer::Color(o) => o.apply_value(value),
            Observer::Button(o) => o.apply_value(value),
        }
    }

    /// The value this widget would write back to the store.
    pub fn current_value(&self) -> Value {
        match self {
            Observer::Toggle(o) => o.value.clone(),
            Observer::Select(o) => o.current_value(),
            Observer::Text(o) => o.current_value(),
            Observer::Color(o) => o.current_value(),
            Observer::Button(o) => o.value.clone(),
        }
    }

    /// Whether the widget shows the cleared state.
    pub fn is_cleared(&self) -> bool {
        match self {
            Observer::Toggle(o) => !o.is_active(),
            Observer::Select(o) => o.selected.is_none(),
            Observer::Text(o) => o.text.is_none(),
            Observer::Color(o) => o.color.is_none(),
            Observer::Button(o) => !o.current,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Observer::Toggle(_) => "toggle",
            Observer::Select(_) => "select",
            Observer::Text(_) => "text",
            Observer::Color(_) => "color",
            Observer::Button(_) => "button",
        }
    }
}

impl fmt::Display for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Observer::Toggle(o) => write!(f, "[{}]", if o.is_active() { "x" } else { " " }),
            Observer::Select(o) => write!(f, "<{}>", o.selected().unwrap_or("-")),
            Observer::Text(o) => match o.text() {
                Some(text) => write!(f, "{:?}", text),
                None => f.write_str("(cleared)"),
            },
            Observer::Color(o) => {
                f.write_str(o.display())?;
                if o.color.is_none() {
                    f.write_str(" (cleared)")?;
                }
                Ok(())
            }
            Observer::Button(o) => {
                let label = display_value(&o.value).unwrap_or_default();
                if o.current {
                    write!(f, "*{}*", label)
                } else {
                    f.write_str(&label)
                }
            }
        }
    }
}

/// On/off switch. Active for any non-null, non-empty value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToggleObserver {
    value: Value,
}

impl ToggleObserver {
    fn apply_value(&mut self, value: &Value) {
        self.value = value.clone();
    }

    pub fn is_active(&self) -> bool {
        is_truthy(&self.value)
    }

    /// Value written when the switch is pressed: `On` flips to `null`,
    /// anything else flips to `On`.
    pub fn flipped(&self) -> Value {
        if self.value.as_str() == Some(TOGGLE_ON) {
            Value::Null
        } else {
            Value::from(TOGGLE_ON)
        }
    }
}

/// Drop-down with a fixed option list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectObserver {
    options: Vec<String>,
    selected: Option<String>,
}

impl SelectObserver {
    pub fn new<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            options: options.into_iter().map(Into::into).collect(),
            selected: None,
        }
    }

    // unknown values (null included) keep the previous selection
    fn apply_value(&mut self, value: &Value) {
        if let Some(v) = display_value(value) {
            self.select(&v);
        }
    }

    /// Select an option by value. Returns false for unknown options.
    pub fn select(&mut self, option: &str) -> bool {
        if self.options.iter().any(|o| o == option) {
            self.selected = Some(option.to_string());
            true
        } else {
            false
        }
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    fn current_value(&self) -> Value {
        self.selected.clone().map_or(Value::Null, Value::from)
    }
}

/// Free text input. `None` is the cleared state, distinct from `""`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextObserver {
    text: Option<String>,
    null_when_empty: bool,
}

impl TextObserver {
    fn apply_value(&mut self, value: &Value) {
        self.text = display_value(value);
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Local edit, not yet written.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
    }

    fn current_value(&self) -> Value {
        match &self.text {
            None => Value::Null,
            Some(t) if t.is_empty() && self.null_when_empty => Value::Null,
            Some(t) => Value::from(t.as_str()),
        }
    }
}

/// Colour picker. Null and `""` both show the placeholder colour.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorObserver {
    color: Option<String>,
}

impl ColorObserver {
    fn apply_value(&mut self, value: &Value) {
        self.color = display_value(value).filter(|c| !c.is_empty());
    }

    /// Colour to paint: the stored colour or the placeholder.
    pub fn display(&self) -> &str {
        self.color.as_deref().unwrap_or(CLEARED_COLOR)
    }

    /// Local pick, un-clears the widget.
    pub fn set_color(&mut self, color: impl Into<String>) {
        let color: String = color.into();
        self.color = Some(color).filter(|c| !c.is_empty());
    }

    pub fn clear(&mut self) {
        self.color = None;
    }

    fn current_value(&self) -> Value {
        self.color.clone().map_or(Value::Null, Value::from)
    }
}

/// Button writing a fixed value, highlighted while that value is current.
#[derive(Debug, Clone, PartialEq)]
pub struct ButtonObserver {
    value: Value,
    current: bool,
}

impl ButtonObserver {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            current: false,
        }
    }

    fn apply_value(&mut self, value: &Value) {
        self.current = *value == self.value;
    }

    pub fn is_current(&self) -> bool {
        self.current
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_toggle() {
        let mut toggle = Observer::toggle();
        assert!(toggle.is_cleared());

        toggle.apply_value(&json!("On"));
        assert!(!toggle.is_cleared());
        assert_eq!(toggle.current_value(), json!("On"));

        toggle.apply_value(&json!(""));
        assert!(toggle.is_cleared());

        let Observer::Toggle(inner) = &toggle else { unreachable!() };
        assert_eq!(inner.flipped(), json!("On"));
    }

    #[test]
    fn test_toggle_flips_on_to_null() {
        let mut toggle = ToggleObserver::default();
        toggle.apply_value(&json!("On"));
        assert_eq!(toggle.flipped(), Value::Null);
    }

    #[test]
    fn test_select_ignores_unknown_values() {
        let mut select = Observer::select(["PanelRoster", "PanelPenalty"]);
        select.apply_value(&json!("PanelRoster"));
        assert_eq!(select.current_value(), json!("PanelRoster"));

        select.apply_value(&json!("Nope"));
        assert_eq!(select.current_value(), json!("PanelRoster"));

        select.apply_value(&Value::Null);
        assert_eq!(select.current_value(), json!("PanelRoster"));
    }

    #[test]
    fn test_text_null_is_not_empty() {
        let mut text = Observer::text();
        text.apply_value(&Value::Null);
        assert!(text.is_cleared());
        assert_eq!(text.current_value(), Value::Null);

        text.apply_value(&json!(""));
        assert!(!text.is_cleared());
        assert_eq!(text.current_value(), json!(""));
    }

    #[test]
    fn test_text_null_when_empty() {
        let mut text = Observer::text_null_when_empty();
        text.apply_value(&json!(""));
        assert_eq!(text.current_value(), Value::Null);

        text.apply_value(&json!("Home"));
        assert_eq!(text.current_value(), json!("Home"));
    }

    #[test]
    fn test_color_placeholder() {
        let mut color = ColorObserver::default();
        color.apply_value(&json!(""));
        assert_eq!(color.display(), CLEARED_COLOR);

        color.apply_value(&json!("#ff0000"));
        assert_eq!(color.display(), "#ff0000");
        assert_eq!(color.current_value(), json!("#ff0000"));

        color.apply_value(&Value::Null);
        assert_eq!(color.display(), CLEARED_COLOR);
        assert_eq!(color.current_value(), Value::Null);

        color.set_color("#00ff00");
        assert_eq!(color.current_value(), json!("#00ff00"));
    }

    #[test]
    fn test_button_current() {
        let mut button = Observer::button("PanelRoster");
        button.apply_value(&json!("PanelRoster"));
        assert!(!button.is_cleared());
        button.apply_value(&json!("PanelPenalty"));
        assert!(button.is_cleared());
        assert_eq!(button.current_value(), json!("PanelRoster"));
    }

    #[test]
    fn test_display() {
        let mut color = Observer::color();
        assert_eq!(color.to_string(), "#666666 (cleared)");
        color.apply_value(&json!("#123456"));
        assert_eq!(color.to_string(), "#123456");
    }
}
