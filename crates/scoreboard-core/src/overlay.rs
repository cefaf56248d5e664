//! Interactive overlay admin.
//!
//! Settings keys of the broadcast overlay, the observers that display them,
//! and the operator actions: picking a skater for the lower third and
//! saving/restoring lower-third presets ("keepers").

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::binder::ControlPanel;
use crate::context::{team_alternate_name_key, SyncContext};
use crate::observer::Observer;

const SETTING_PREFIX: &str = "ScoreBoard.Settings.Setting(Overlay.Interactive.";

pub const CLOCK: &str = "ScoreBoard.Settings.Setting(Overlay.Interactive.Clock)";
pub const SCORE: &str = "ScoreBoard.Settings.Setting(Overlay.Interactive.Score)";
pub const SHOW_JAMMERS: &str = "ScoreBoard.Settings.Setting(Overlay.Interactive.ShowJammers)";
pub const BACKGROUND_COLOR: &str = "ScoreBoard.Settings.Setting(Overlay.Interactive.BackgroundColor)";
pub const PANEL: &str = "ScoreBoard.Settings.Setting(Overlay.Interactive.Panel)";
pub const LOWER_THIRD_LINE1: &str = "ScoreBoard.Settings.Setting(Overlay.Interactive.LowerThird.Line1)";
pub const LOWER_THIRD_LINE2: &str = "ScoreBoard.Settings.Setting(Overlay.Interactive.LowerThird.Line2)";
pub const LOWER_THIRD_STYLE: &str = "ScoreBoard.Settings.Setting(Overlay.Interactive.LowerThird.Style)";

pub const TEAMS: [&str; 2] = ["1", "2"];

/// Panels the overlay can slide in. The empty value hides the panel.
pub const PANELS: [&str; 6] = [
    "RosterTeam1",
    "RosterTeam2",
    "PenaltyTeam1",
    "PenaltyTeam2",
    "LowerThird",
    "",
];

pub const BACKGROUNDS: [&str; 4] = ["", "bg-black", "bg-blue", "bg-green"];

pub const LOWER_THIRD_STYLES: [&str; 3] = ["ColourDefault", "ColourTeam1", "ColourTeam2"];

/// Full key of an overlay setting given its short name.
pub fn setting_key(name: &str) -> String {
    format!("{}{})", SETTING_PREFIX, name)
}

/// Short name of an overlay setting key (`Clock`, `LowerThird.Line1`, ...).
pub fn setting_name(key: &str) -> Option<&str> {
    key.strip_prefix(SETTING_PREFIX)?.strip_suffix(')')
}

pub fn team_color_key(team: &str, which: &str) -> String {
    format!("ScoreBoard.Team({}).Color({})", team, which)
}

/// Register every overlay admin control on `panel`.
pub fn bind_controls(panel: &mut ControlPanel) {
    for key in [CLOCK, SCORE, SHOW_JAMMERS] {
        panel.bind(key, Observer::toggle());
    }
    panel.bind(BACKGROUND_COLOR, Observer::select(BACKGROUNDS));
    for value in PANELS {
        panel.bind(PANEL, Observer::button(value));
    }

    panel.bind(LOWER_THIRD_LINE1, Observer::text());
    panel.bind(LOWER_THIRD_LINE2, Observer::text());
    panel.bind(LOWER_THIRD_STYLE, Observer::select(LOWER_THIRD_STYLES));

    for team in TEAMS {
        panel.bind(
            team_alternate_name_key(team),
            Observer::text_null_when_empty(),
        );
        for which in ["overlay_fg", "overlay_bg"] {
            panel.bind(team_color_key(team, which), Observer::color());
        }
    }
}

/// Content of the lower-third banner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowerThird {
    pub line1: String,
    pub line2: String,
    pub style: String,
}

impl LowerThird {
    /// The banner as currently known from the mirror.
    pub fn current(ctx: &SyncContext) -> Self {
        let read = |key: &str| ctx.store().get_str(key).unwrap_or_default().to_string();
        Self {
            line1: read(LOWER_THIRD_LINE1),
            line2: read(LOWER_THIRD_LINE2),
            style: read(LOWER_THIRD_STYLE),
        }
    }

    /// Write the banner through the panel inputs.
    pub fn apply(&self, ctx: &mut SyncContext) {
        {
            let panel = ctx.panel();
            let mut panel = panel.borrow_mut();
            panel.choose(LOWER_THIRD_STYLE, &self.style);
            panel.set_text(LOWER_THIRD_LINE1, &self.line1);
            panel.set_text(LOWER_THIRD_LINE2, &self.line2);
        }
        // the style is written as given, even if the select doesn't know it
        ctx.store_mut()
            .set(LOWER_THIRD_STYLE, Value::from(self.style.as_str()));
        ctx.commit(LOWER_THIRD_LINE1);
        ctx.commit(LOWER_THIRD_LINE2);
    }

    pub fn label(&self) -> String {
        format!("{}/{} ({})", self.line1, self.line2, self.style)
    }
}

/// Put a skater on the lower third: their name, their team's display name
/// and the team colour style. Returns `None` for unknown skaters.
pub fn select_skater(ctx: &mut SyncContext, skater: &str) -> Option<LowerThird> {
    let record = ctx.skater(skater)?;
    let team = record.get_str("Team")?.to_string();

    let lower_third = LowerThird {
        line1: record.get_str("Name").unwrap_or_default().to_string(),
        line2: ctx.team_display_name(&team).unwrap_or_default(),
        style: format!("ColourTeam{}", team),
    };
    info!("Lower third: {}", lower_third.label());
    lower_third.apply(ctx);
    Some(lower_third)
}

/// A saved lower-third preset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keeper {
    pub id: Uuid,
    #[serde(flatten)]
    pub lower_third: LowerThird,
}

/// In-memory list of lower-third presets, in the order they were saved.
#[derive(Debug, Clone, Default)]
pub struct Keepers {
    entries: Vec<Keeper>,
}

impl Keepers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save the current lower third.
    pub fn add(&mut self, ctx: &SyncContext) -> &Keeper {
        let keeper = Keeper {
            id: Uuid::new_v4(),
            lower_third: LowerThird::current(ctx),
        };
        debug!("Keeping {} as {}", keeper.lower_third.label(), keeper.id);
        let index = self.entries.len();
        self.entries.push(keeper);
        &self.entries[index]
    }

    /// Put a saved preset back on air.
    pub fn apply(&self, ctx: &mut SyncContext, id: &Uuid) -> bool {
        match self.get(id) {
            Some(keeper) => {
                keeper.lower_third.apply(ctx);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<&Keeper> {
        self.entries.iter().find(|k| &k.id == id)
    }

    pub fn remove(&mut self, id: &Uuid) -> Option<Keeper> {
        let index = self.entries.iter().position(|k| &k.id == id)?;
        Some(self.entries.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Keeper> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
