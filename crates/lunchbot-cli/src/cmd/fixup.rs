use std::path::Path;

use anyhow::Result;
use clap::Args;
use lunchbot_core::PersonId;
use lunchbot_core::config::LunchConfig;
use lunchbot_core::dates::lunch_key;
use lunchbot_core::workflow::{FixupOutcome, fixup};
use serde::Serialize;

use crate::cmd::{lunch_date, open_store};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct FixupArgs {
    /// Everyone currently signed up for the lunch.
    #[arg(required = true)]
    pub people: Vec<String>,

    /// Lunch day (`YYYY-MM-DD` or `dd.mm.yyyy`); defaults to the open lunch.
    #[arg(long)]
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
struct FixupOutput {
    date: String,
    #[serde(flatten)]
    outcome: FixupOutcome,
}

fn join(ids: &[PersonId]) -> String {
    if ids.is_empty() {
        return "-".to_string();
    }
    ids.iter().map(PersonId::as_str).collect::<Vec<_>>().join(",")
}

/// Repair a lunch from the full sign-up list after reactions went missing.
pub fn run_fixup(args: &FixupArgs, output: OutputMode, config: &LunchConfig, project_root: &Path) -> Result<()> {
    let mut store = open_store(config, project_root);
    let date = lunch_date(args.date.as_deref(), &store, config)?;
    let people: Vec<PersonId> = args.people.iter().map(|p| PersonId::new(p.as_str())).collect();
    let outcome = fixup(&mut store, date, &people, config)?;

    let out = FixupOutput {
        date: lunch_key(date),
        outcome,
    };
    render_mode(
        output,
        &out,
        |o, w| match &o.outcome {
            FixupOutcome::Rebuilt { pending } => writeln!(w, "fixup {} rebuilt pending={pending}", o.date),
            FixupOutcome::Placed { placed, stale } => {
                writeln!(w, "fixup {} placed={} stale={}", o.date, join(placed), join(stale))
            }
        },
        |o, w| {
            pretty_section(w, &format!("Fixup {}", o.date))?;
            match &o.outcome {
                FixupOutcome::Rebuilt { pending } => pretty_kv(w, "Signed up", pending.to_string()),
                FixupOutcome::Placed { placed, stale } => {
                    pretty_kv(w, "Placed", join(placed))?;
                    pretty_kv(w, "No longer signed up", join(stale))
                }
            }
        },
    )
}
