use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Context;
use scoreboard_client::ClientConfig;
use scoreboard_core::overlay::{self, Keepers};
use scoreboard_core::{EventKind, TriggerOptions};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::Command;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,scoreboard_client=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Configuration: optional JSON file as first argument, env overrides
    let config = match std::env::args().nth(1) {
        Some(path) => ClientConfig::load(&path).with_context(|| format!("loading {}", path))?,
        None => ClientConfig::default(),
    }
    .with_env();

    tracing::info!("Overlay admin connecting to {}", config.url);

    let (mut ctx, session) = scoreboard_client::session(config);
    overlay::bind_controls(&mut ctx.panel().borrow_mut());
    ctx.bind_settings()?;
    ctx.bind_skaters()?;

    {
        let skaters = ctx.skaters();
        let mut skaters = skaters.borrow_mut();
        skaters.add_trigger(EventKind::Update, "*", TriggerOptions::default(), |event| {
            let r = &event.record;
            if event.complete {
                tracing::info!(
                    "Skater {} #{} {} (team {})",
                    r.get_str("Skater").unwrap_or_default(),
                    r.get_str("Number").unwrap_or_default(),
                    r.get_str("Name").unwrap_or_default(),
                    r.get_str("Team").unwrap_or_default(),
                );
            }
        });
        skaters.add_trigger(EventKind::Delete, "*", TriggerOptions::default(), |event| {
            tracing::info!(
                "Skater {} removed",
                event.record.get_str("Skater").unwrap_or_default()
            );
        });
    }

    ctx.start();
    let ctx = Rc::new(RefCell::new(ctx));
    let mut keepers = Keepers::new();

    let run = session.run(ctx.clone());
    tokio::pin!(run);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", commands::HELP);

    loop {
        tokio::select! {
            result = &mut run => {
                result?;
                break;
            }

            line = lines.next_line() => {
                let Some(line) = line? else {
                    tracing::info!("stdin closed");
                    break;
                };
                if !line.trim().is_empty() {
                    match Command::parse(&line) {
                        Ok(command) => {
                            let output = command.execute(&mut ctx.borrow_mut(), &mut keepers);
                            println!("{}", output);
                        }
                        Err(e) => println!("{}", e),
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
