use std::path::Path;

use anyhow::Result;
use clap::Args;
use lunchbot_core::config::LunchConfig;
use lunchbot_core::dates::lunch_key;
use lunchbot_core::{Grouping, LunchError, LunchStore};
use serde::Serialize;

use crate::cmd::{lunch_date, open_store};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug, Default)]
pub struct ScoreArgs {
    /// Lunch day (`YYYY-MM-DD` or `dd.mm.yyyy`); defaults to the open lunch.
    #[arg(long)]
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
struct GroupScore {
    group: u32,
    size: usize,
    score: f64,
}

#[derive(Debug, Serialize)]
struct ScoreOutput {
    date: String,
    score: f64,
    groups: Vec<GroupScore>,
}

/// Score a stored lunch against the current ledger: the sum over members of
/// the mean weeks since they last met the rest of their group.
pub fn run_score(args: &ScoreArgs, output: OutputMode, config: &LunchConfig, project_root: &Path) -> Result<()> {
    let store = open_store(config, project_root);
    let date = lunch_date(args.date.as_deref(), &store, config)?;
    let grouping = store
        .load_grouping(date)?
        .ok_or_else(|| LunchError::LunchNotFound(lunch_key(date)))?;
    let ledger = store.load_ledger(date)?;

    let groups: Vec<GroupScore> = grouping
        .groups()
        .map(|(id, members)| {
            let single: Grouping = std::iter::once((id, members.to_vec())).collect();
            GroupScore {
                group: id,
                size: members.len(),
                score: ledger.score(date, &single),
            }
        })
        .collect();
    let out = ScoreOutput {
        date: lunch_key(date),
        score: ledger.score(date, &grouping),
        groups,
    };
    render_mode(
        output,
        &out,
        |o, w| {
            writeln!(w, "score {} {:.3}", o.date, o.score)?;
            for g in &o.groups {
                writeln!(w, "group {} size={} score={:.3}", g.group, g.size, g.score)?;
            }
            Ok(())
        },
        |o, w| {
            pretty_section(w, &format!("Score {}", o.date))?;
            for g in &o.groups {
                pretty_kv(w, &format!("Group {}", g.group), format!("{:.3} ({} people)", g.score, g.size))?;
            }
            pretty_kv(w, "Total", format!("{:.3}", o.score))
        },
    )
}
