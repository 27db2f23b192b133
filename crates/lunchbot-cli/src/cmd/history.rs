use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use lunchbot_core::config::LunchConfig;
use lunchbot_core::dates::{lunch_key, parse_lunch_date};
use lunchbot_core::workflow::insert_history;
use lunchbot_core::{LunchStore, PersonId};
use serde::Serialize;

use crate::cmd::open_store;
use crate::output::{OutputMode, pretty_kv, render_mode};

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Day the groups met (`dd.mm.yyyy` or `YYYY-MM-DD`).
    pub date: String,

    /// Groups as a JSON list of lists, e.g. `[["ann","bob"],["cat","dan"]]`.
    pub groups: String,
}

#[derive(Debug, Serialize)]
struct HistoryOutput {
    date: String,
    groups: usize,
    people: usize,
    pairs: usize,
}

/// Record groups that met before the bot kept track.
pub fn run_history(args: &HistoryArgs, output: OutputMode, config: &LunchConfig, project_root: &Path) -> Result<()> {
    let date = parse_lunch_date(&args.date)?;
    let groups: Vec<Vec<PersonId>> =
        serde_json::from_str(&args.groups).context("groups must be a JSON list of lists of ids")?;

    let mut store = open_store(config, project_root);
    insert_history(&mut store, date, &groups)?;
    let ledger = store.load_ledger(date)?;

    let out = HistoryOutput {
        date: lunch_key(date),
        groups: groups.len(),
        people: groups.iter().map(Vec::len).sum(),
        pairs: ledger.len(),
    };
    render_mode(
        output,
        &out,
        |o, w| writeln!(w, "history {} groups={} people={} pairs={}", o.date, o.groups, o.people, o.pairs),
        |o, w| {
            pretty_kv(w, "Date", &o.date)?;
            pretty_kv(w, "Groups", o.groups.to_string())?;
            pretty_kv(w, "People", o.people.to_string())?;
            pretty_kv(w, "Ledger", format!("{} pairs", o.pairs))
        },
    )
}
