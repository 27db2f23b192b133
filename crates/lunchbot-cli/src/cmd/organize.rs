use std::path::Path;

use anyhow::Result;
use clap::Args;
use lunchbot_core::Grouping;
use lunchbot_core::config::LunchConfig;
use lunchbot_core::dates::lunch_key;
use lunchbot_core::workflow::organize;
use serde::Serialize;
use tracing::info;

use crate::cmd::{lunch_date, open_store};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use crate::render;

#[derive(Args, Debug, Default)]
pub struct OrganizeArgs {
    /// Lunch day (`YYYY-MM-DD` or `dd.mm.yyyy`); defaults to the open lunch.
    #[arg(long)]
    pub date: Option<String>,

    /// Greedy passes; overrides `sample_count` from the config.
    #[arg(long)]
    pub samples: Option<usize>,
}

#[derive(Debug, Serialize)]
struct OrganizeOutput {
    date: String,
    score: f64,
    groups: Grouping,
    message: String,
}

pub fn run_organize(args: &OrganizeArgs, output: OutputMode, config: &LunchConfig, project_root: &Path) -> Result<()> {
    let mut store = open_store(config, project_root);
    let date = lunch_date(args.date.as_deref(), &store, config)?;
    let config = LunchConfig {
        sample_count: args.samples.unwrap_or(config.sample_count),
        ..config.clone()
    };
    let solution = organize(&mut store, date, &config)?;
    info!(date = %lunch_key(date), score = solution.score, "organized");

    let out = OrganizeOutput {
        date: lunch_key(date),
        score: solution.score,
        message: render::groups_message(date, &solution.assignment),
        groups: solution.assignment,
    };
    render_mode(
        output,
        &out,
        |o, w| {
            writeln!(w, "organized {} groups={} score={:.3}", o.date, o.groups.group_count(), o.score)?;
            for (id, members) in o.groups.groups() {
                let names: Vec<&str> = members.iter().map(|a| a.id.as_str()).collect();
                writeln!(w, "group {id} {}", names.join(" "))?;
            }
            Ok(())
        },
        |o, w| {
            pretty_section(w, &format!("Lunch {}", o.date))?;
            writeln!(w, "{}\n", o.message)?;
            pretty_kv(w, "Groups", o.groups.group_count().to_string())?;
            pretty_kv(w, "Score", format!("{:.3}", o.score))
        },
    )
}
