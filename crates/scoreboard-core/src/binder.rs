//! Wiring between store subscriptions and the consumers of their values.
//!
//! Two policies live here:
//! - skater keys under `ScoreBoard.Team` are decomposed by a [`KeyParser`]
//!   and turned into collection upserts/deletes
//! - settings keys drive the observers registered in a [`ControlPanel`]
//!
//! Both consumers sit behind `Rc<RefCell<_>>`. A notification that arrives
//! while the consumer is already borrowed (a trigger re-entering the store)
//! is logged and dropped.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::collection::ReactiveCollection;
use crate::error::KeyPathError;
use crate::keypath::KeyParser;
use crate::model::{Matcher, Record};
use crate::observer::Observer;
use crate::store::{KeyPathStore, SubscriptionId};

/// Skater fields forwarded into the collection.
pub const SKATER_FIELDS: [&str; 4] = ["Id", "Name", "Number", "Flags"];

/// Routes `ScoreBoard.Team(t).Skater(s).<field>` notifications into a
/// skater collection keyed by `Skater`.
#[derive(Debug, Clone)]
pub struct SkaterBinder {
    parser: KeyParser,
}

impl Default for SkaterBinder {
    fn default() -> Self {
        Self::new()
    }
}

impl SkaterBinder {
    pub fn new() -> Self {
        Self {
            parser: KeyParser::new("ScoreBoard", &["Team", "Skater"]),
        }
    }

    /// Subscribe to the team family and feed `skaters` from it.
    pub fn bind(
        self,
        store: &mut KeyPathStore,
        skaters: Rc<RefCell<ReactiveCollection>>,
    ) -> Result<SubscriptionId, KeyPathError> {
        let family = self.parser.family();
        store.register([family], move |key, value| {
            self.dispatch(&skaters, key, value);
        })
    }

    fn dispatch(&self, skaters: &RefCell<ReactiveCollection>, key: &str, value: &Value) {
        // team-level keys and anything else not shaped like a skater field
        let Some(parsed) = self.parser.parse(key) else {
            return;
        };
        let field = parsed.field.as_str();
        if !SKATER_FIELDS.contains(&field) {
            trace!("Ignoring skater field {}", key);
            return;
        }

        let Ok(mut skaters) = skaters.try_borrow_mut() else {
            warn!("Skater collection busy, dropping notification for {}", key);
            return;
        };

        let team = parsed.id(0).unwrap_or_default();
        let by_skater = Matcher::field("Skater", parsed.entity_id());

        if field == "Id" && value.is_null() {
            let removed = skaters.delete(&by_skater);
            debug!("Skater {} removed ({} record(s))", parsed.entity_id(), removed);
            return;
        }

        let mut fields = Record::new();
        fields.insert(field, value.clone());
        fields.insert("Team", Value::from(team));
        if let Err(e) = skaters.upsert(fields, &by_skater) {
            warn!("Failed to upsert skater from {}: {}", key, e);
        }
    }
}

/// Settings key -> observers registry.
#[derive(Debug, Clone, Default)]
pub struct ControlPanel {
    bindings: BTreeMap<String, Vec<Observer>>,
}

impl ControlPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an observer to `key`. A key may drive several observers
    /// (e.g. one button per selectable value).
    pub fn bind(&mut self, key: impl Into<String>, observer: Observer) {
        self.bindings.entry(key.into()).or_default().push(observer);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn observers(&self, key: &str) -> &[Observer] {
        self.bindings.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Observer])> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Push a store value to every observer of `key`.
    pub fn apply(&mut self, key: &str, value: &Value) {
        if let Some(observers) = self.bindings.get_mut(key) {
            for observer in observers.iter_mut() {
                observer.apply_value(value);
            }
        }
    }

    /// Local text edit. Returns false if `key` has no text observer.
    pub fn set_text(&mut self, key: &str, text: &str) -> bool {
        match self.input_mut(key) {
            Some(Observer::Text(t)) => {
                t.set_text(text);
                true
            }
            _ => false,
        }
    }

    /// Local drop-down choice. Returns false for unknown keys or options.
    pub fn choose(&mut self, key: &str, option: &str) -> bool {
        match self.input_mut(key) {
            Some(Observer::Select(s)) => s.select(option),
            _ => false,
        }
    }

    /// Local colour pick; `None` clears the colour.
    pub fn pick_color(&mut self, key: &str, color: Option<&str>) -> bool {
        match self.input_mut(key) {
            Some(Observer::Color(c)) => {
                match color {
                    Some(color) => c.set_color(color),
                    None => c.clear(),
                }
                true
            }
            _ => false,
        }
    }

    /// Local edit of whichever input is bound to `key`: text is replaced,
    /// a select picks the option, a colour is picked (empty clears it).
    pub fn edit(&mut self, key: &str, value: &str) -> bool {
        match self.input_mut(key) {
            Some(Observer::Text(t)) => {
                t.set_text(value);
                true
            }
            Some(Observer::Select(s)) => s.select(value),
            Some(Observer::Color(c)) => {
                c.set_color(value);
                true
            }
            _ => false,
        }
    }

    /// Write the input observer's current value for `key` back to the
    /// authority.
    pub fn commit(&self, store: &mut KeyPathStore, key: &str) -> bool {
        let Some(observer) = self.input(key) else {
            warn!("No input bound to {}", key);
            return false;
        };
        store.set(key, observer.current_value());
        true
    }

    /// Press the switch or button bound to `key`.
    ///
    /// A toggle writes its flipped value. For buttons, `value` picks the
    /// button to press; without one the first button is used.
    pub fn press(&self, store: &mut KeyPathStore, key: &str, value: Option<&str>) -> bool {
        let observers = self.observers(key);

        if let Some(Observer::Toggle(toggle)) = observers.iter().find(|o| matches!(o, Observer::Toggle(_))) {
            store.set(key, toggle.flipped());
            return true;
        }

        let button = observers.iter().find_map(|o| match o {
            Observer::Button(b) if value.map_or(true, |v| b.value().as_str() == Some(v)) => Some(b),
            _ => None,
        });
        match button {
            Some(button) => {
                store.set(key, button.value().clone());
                true
            }
            None => {
                warn!("No switch or button bound to {}", key);
                false
            }
        }
    }

    // text, select and colour observers are inputs; toggles and buttons are pressed
    fn input(&self, key: &str) -> Option<&Observer> {
        self.observers(key).iter().find(|o| is_input(o))
    }

    fn input_mut(&mut self, key: &str) -> Option<&mut Observer> {
        self.bindings.get_mut(key)?.iter_mut().find(|o| is_input(o))
    }
}

fn is_input(observer: &Observer) -> bool {
    matches!(observer, Observer::Text(_) | Observer::Select(_) | Observer::Color(_))
}

/// Subscribes every key of a [`ControlPanel`] and applies values directly to
/// its observers.
pub struct SettingsBinder;

impl SettingsBinder {
    pub fn bind(
        store: &mut KeyPathStore,
        panel: Rc<RefCell<ControlPanel>>,
    ) -> Result<SubscriptionId, KeyPathError> {
        let keys: Vec<String> = panel.borrow().keys().map(String::from).collect();
        debug!("Binding {} settings key(s)", keys.len());

        store.register(keys, move |key, value| match panel.try_borrow_mut() {
            Ok(mut panel) => panel.apply(key, value),
            Err(_) => warn!("Control panel busy, dropping notification for {}", key),
        })
    }
}
