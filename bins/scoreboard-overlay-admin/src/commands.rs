//! Operator commands read from stdin.

use anyhow::{anyhow, bail, Context};
use serde_json::Value;
use uuid::Uuid;

use scoreboard_core::overlay::{self, Keepers};
use scoreboard_core::SyncContext;

pub const HELP: &str = "\
Commands:
  set <setting> <value>    edit a control and send it (Line1, Panel, ScoreBoard.Team(1).Color(overlay_fg), ...)
  clear <setting>          send null for a setting
  press <setting> [value]  press a toggle, or the button with that value
  skater <id>              put a skater on the lower third
  keep                     save the current lower third
  keeper <id>              put a saved lower third back on air
  skaters                  list the roster
  show                     show every control
  help";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Set { key: String, value: String },
    Clear { key: String },
    Press { key: String, value: Option<String> },
    Skater(String),
    Keep,
    Keeper(Uuid),
    Skaters,
    Show,
    Help,
}

/// Expand short setting names; full key-paths pass through.
fn resolve_key(name: &str) -> String {
    if name.starts_with("ScoreBoard.") {
        name.to_string()
    } else {
        overlay::setting_key(name)
    }
}

impl Command {
    pub fn parse(line: &str) -> anyhow::Result<Self> {
        let line = line.trim();
        let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        let command = match verb {
            "set" => {
                let (key, value) = rest
                    .split_once(char::is_whitespace)
                    .map(|(k, v)| (k, v.trim()))
                    .unwrap_or((rest, ""));
                if key.is_empty() {
                    bail!("usage: set <setting> <value>");
                }
                Command::Set {
                    key: resolve_key(key),
                    value: value.to_string(),
                }
            }
            "clear" => Command::Clear {
                key: resolve_key(required(rest, "clear <setting>")?),
            },
            "press" | "toggle" => {
                let mut words = rest.split_whitespace();
                let key = words.next().ok_or_else(|| anyhow!("usage: press <setting> [value]"))?;
                Command::Press {
                    key: resolve_key(key),
                    value: words.next().map(String::from),
                }
            }
            "skater" => Command::Skater(required(rest, "skater <id>")?.to_string()),
            "keep" => Command::Keep,
            "keeper" => {
                let id = required(rest, "keeper <id>")?;
                Command::Keeper(Uuid::parse_str(id).with_context(|| format!("invalid keeper id `{}`", id))?)
            }
            "skaters" | "roster" => Command::Skaters,
            "show" => Command::Show,
            "help" | "?" => Command::Help,
            other => bail!("unknown command `{}` (try `help`)", other),
        };
        Ok(command)
    }

    /// Run the command. Returns the text to print.
    pub fn execute(self, ctx: &mut SyncContext, keepers: &mut Keepers) -> String {
        match self {
            Command::Set { key, value } => {
                let edited = ctx.panel().borrow_mut().edit(&key, &value);
                if edited {
                    ctx.commit(&key);
                } else {
                    ctx.store_mut().set(&key, value.as_str());
                }
                format!("{} <- {:?}", key, value)
            }
            Command::Clear { key } => {
                ctx.store_mut().set(&key, Value::Null);
                format!("{} <- null", key)
            }
            Command::Press { key, value } => {
                if ctx.press(&key, value.as_deref()) {
                    format!("pressed {}", key)
                } else {
                    format!("nothing to press at {}", key)
                }
            }
            Command::Skater(id) => match overlay::select_skater(ctx, &id) {
                Some(lower_third) => format!("lower third: {}", lower_third.label()),
                None => format!("no skater {}", id),
            },
            Command::Keep => {
                let keeper = keepers.add(ctx);
                format!("{}  {}", keeper.id, keeper.lower_third.label())
            }
            Command::Keeper(id) => {
                if keepers.apply(ctx, &id) {
                    format!("applied {}", id)
                } else {
                    format!("no keeper {}", id)
                }
            }
            Command::Skaters => ctx
                .roster()
                .iter()
                .map(|r| {
                    format!(
                        "{:>6}  {:<5} {} (team {})",
                        r.get_str("Skater").unwrap_or_default(),
                        r.get_str("Number").unwrap_or_default(),
                        r.get_str("Name").unwrap_or_default(),
                        r.get_str("Team").unwrap_or_default(),
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Command::Show => {
                let panel = ctx.panel_ref();
                let mut lines = Vec::new();
                for (key, observers) in panel.iter() {
                    let name = overlay::setting_name(key).unwrap_or(key);
                    let shown: Vec<String> = observers.iter().map(ToString::to_string).collect();
                    lines.push(format!("{:<45} {}", name, shown.join(" ")));
                }
                if !keepers.is_empty() {
                    lines.push("keepers:".to_string());
                    lines.extend(
                        keepers
                            .iter()
                            .map(|k| format!("  {}  {}", k.id, k.lower_third.label())),
                    );
                }
                lines.join("\n")
            }
            Command::Help => HELP.to_string(),
        }
    }
}

fn required<'a>(rest: &'a str, usage: &str) -> anyhow::Result<&'a str> {
    if rest.is_empty() {
        bail!("usage: {}", usage);
    }
    Ok(rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoreboard_core::overlay::{bind_controls, CLOCK, LOWER_THIRD_LINE1, PANEL};
    use scoreboard_core::{MemoryTransport, Request};
    use serde_json::json;

    fn context() -> (SyncContext, MemoryTransport) {
        let transport = MemoryTransport::new();
        let mut ctx = SyncContext::new(Box::new(transport.clone()));
        bind_controls(&mut ctx.panel().borrow_mut());
        ctx.bind_settings().unwrap();
        ctx.bind_skaters().unwrap();
        (ctx, transport)
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            Command::parse("set LowerThird.Line1 Jam Ref").unwrap(),
            Command::Set {
                key: LOWER_THIRD_LINE1.into(),
                value: "Jam Ref".into()
            }
        );
        assert_eq!(
            Command::parse("press Panel RosterTeam1").unwrap(),
            Command::Press {
                key: PANEL.into(),
                value: Some("RosterTeam1".into())
            }
        );
        assert_eq!(
            Command::parse("clear ScoreBoard.Team(1).AlternateName(overlay)").unwrap(),
            Command::Clear {
                key: "ScoreBoard.Team(1).AlternateName(overlay)".into()
            }
        );
        assert!(Command::parse("keeper nope").is_err());
        assert!(Command::parse("skater").is_err());
        assert!(Command::parse("fly").is_err());
    }

    #[test]
    fn test_execute_set_and_toggle() {
        let (mut ctx, transport) = context();
        let mut keepers = Keepers::new();

        Command::parse("set LowerThird.Line1 Hello")
            .unwrap()
            .execute(&mut ctx, &mut keepers);
        Command::parse("toggle Clock")
            .unwrap()
            .execute(&mut ctx, &mut keepers);

        assert_eq!(
            transport.take(),
            vec![
                Request::Set {
                    key: LOWER_THIRD_LINE1.into(),
                    value: json!("Hello")
                },
                Request::Set {
                    key: CLOCK.into(),
                    value: json!("On")
                },
            ]
        );
    }

    #[test]
    fn test_execute_skaters() {
        let (mut ctx, _) = context();
        let mut keepers = Keepers::new();
        for (field, value) in [("Name", "Amy"), ("Number", "7"), ("Id", "s1")] {
            ctx.store_mut()
                .apply(&format!("ScoreBoard.Team(2).Skater(s1).{}", field), json!(value));
        }

        let out = Command::Skaters.execute(&mut ctx, &mut keepers);
        assert!(out.contains("Amy"));
        assert!(out.contains("(team 2)"));
    }
}
