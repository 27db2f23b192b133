use std::path::Path;

use anyhow::Result;
use clap::Args;
use lunchbot_core::config::LunchConfig;
use lunchbot_core::dates::lunch_key;
use lunchbot_core::{Grouping, LunchError, LunchStore};
use serde::Serialize;

use crate::cmd::{lunch_date, open_store};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use crate::render;

#[derive(Args, Debug, Default)]
pub struct ShowArgs {
    /// Lunch day (`YYYY-MM-DD` or `dd.mm.yyyy`); defaults to the open lunch.
    #[arg(long)]
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
struct ShowOutput {
    date: String,
    finalized: bool,
    pending: Vec<String>,
    groups: Grouping,
}

pub fn run_show(args: &ShowArgs, output: OutputMode, config: &LunchConfig, project_root: &Path) -> Result<()> {
    let store = open_store(config, project_root);
    let date = lunch_date(args.date.as_deref(), &store, config)?;
    let grouping = store
        .load_grouping(date)?
        .ok_or_else(|| LunchError::LunchNotFound(lunch_key(date)))?;

    let out = ShowOutput {
        date: lunch_key(date),
        finalized: grouping.is_finalized(),
        pending: grouping
            .pending_pool()
            .iter()
            .map(|a| a.id.to_string())
            .collect(),
        groups: grouping,
    };
    render_mode(
        output,
        &out,
        |o, w| {
            let state = if o.finalized { "organized" } else { "pending" };
            writeln!(w, "lunch {} {state} people={}", o.date, o.groups.attendees().count())?;
            if o.finalized {
                for (id, members) in o.groups.groups() {
                    let names: Vec<&str> = members.iter().map(|a| a.id.as_str()).collect();
                    writeln!(w, "group {id} {}", names.join(" "))?;
                }
            } else {
                for person in &o.pending {
                    writeln!(w, "pending {person}")?;
                }
            }
            Ok(())
        },
        |o, w| {
            pretty_section(w, &format!("Lunch {}", o.date))?;
            if o.finalized {
                writeln!(w, "{}\n", render::groups_message(date, &o.groups))?;
            } else {
                pretty_kv(w, "Signed up", o.pending.join(", "))?;
            }
            pretty_kv(w, "People", o.groups.attendees().count().to_string())?;
            pretty_kv(w, "Organized", o.finalized.to_string())
        },
    )
}
