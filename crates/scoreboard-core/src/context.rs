//! Per-session synchronization context.
//!
//! One [`SyncContext`] is built at startup and handed to the binders, the
//! session driver and the UI. It owns the store mirror, the skater collection
//! and the control panel.

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use tracing::info;

use crate::binder::{ControlPanel, SettingsBinder, SkaterBinder};
use crate::collection::ReactiveCollection;
use crate::error::KeyPathError;
use crate::model::Record;
use crate::store::{KeyPathStore, SubscriptionId, Transport};

/// Fields a skater needs before it shows up in the roster.
pub const SKATER_REQUIRED: [&str; 3] = ["Name", "Team", "Id"];

pub fn skater_collection() -> ReactiveCollection {
    ReactiveCollection::new("Skater").with_required_fields(&SKATER_REQUIRED)
}

pub fn team_name_key(team: &str) -> String {
    format!("ScoreBoard.Team({}).Name", team)
}

pub fn team_alternate_name_key(team: &str) -> String {
    format!("ScoreBoard.Team({}).AlternateName(overlay)", team)
}

pub struct SyncContext {
    store: KeyPathStore,
    skaters: Rc<RefCell<ReactiveCollection>>,
    panel: Rc<RefCell<ControlPanel>>,
}

impl SyncContext {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            store: KeyPathStore::new(transport),
            skaters: Rc::new(RefCell::new(skater_collection())),
            panel: Rc::new(RefCell::new(ControlPanel::new())),
        }
    }

    pub fn store(&self) -> &KeyPathStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut KeyPathStore {
        &mut self.store
    }

    /// Shared handle to the skater collection, e.g. for adding triggers.
    pub fn skaters(&self) -> Rc<RefCell<ReactiveCollection>> {
        self.skaters.clone()
    }

    pub fn panel(&self) -> Rc<RefCell<ControlPanel>> {
        self.panel.clone()
    }

    /// Feed the skater collection from the team family.
    pub fn bind_skaters(&mut self) -> Result<SubscriptionId, KeyPathError> {
        SkaterBinder::new().bind(&mut self.store, self.skaters.clone())
    }

    /// Subscribe every key bound in the control panel.
    pub fn bind_settings(&mut self) -> Result<SubscriptionId, KeyPathError> {
        SettingsBinder::bind(&mut self.store, self.panel.clone())
    }

    /// Connect and restore subscriptions.
    pub fn start(&mut self) {
        info!(
            "Starting with {} subscription(s)",
            self.store.subscription_count()
        );
        self.store.connect();
    }

    /// Name to show for `team`: its overlay alternate name if set, otherwise
    /// its regular name.
    pub fn team_display_name(&self, team: &str) -> Option<String> {
        [team_alternate_name_key(team), team_name_key(team)]
            .iter()
            .filter_map(|key| self.store.get_str(key))
            .find(|name| !name.is_empty())
            .map(String::from)
    }

    /// Complete skaters sorted by name.
    pub fn roster(&self) -> Vec<Record> {
        let skaters = self.skaters.borrow();
        let mut roster: Vec<Record> = skaters
            .records()
            .filter(|r| SKATER_REQUIRED.iter().all(|f| r.has_value(f)))
            .cloned()
            .collect();
        roster.sort_by(|a, b| a.get_str("Name").cmp(&b.get_str("Name")));
        roster
    }

    /// Visible skater by id.
    pub fn skater(&self, id: &str) -> Option<Record> {
        self.skaters.borrow().get(id).cloned()
    }

    /// Read access to the panel for rendering.
    pub fn panel_ref(&self) -> Ref<'_, ControlPanel> {
        self.panel.borrow()
    }

    /// Press a switch or button (see [`ControlPanel::press`]).
    pub fn press(&mut self, key: &str, value: Option<&str>) -> bool {
        self.panel.borrow().press(&mut self.store, key, value)
    }

    /// Write back the input bound to `key`.
    pub fn commit(&mut self, key: &str) -> bool {
        self.panel.borrow().commit(&mut self.store, key)
    }
}
