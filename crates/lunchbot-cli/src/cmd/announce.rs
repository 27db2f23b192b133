use std::path::Path;

use anyhow::Result;
use clap::Args;
use lunchbot_core::LunchStore;
use lunchbot_core::config::LunchConfig;
use lunchbot_core::dates::lunch_key;
use lunchbot_core::workflow::announce;
use serde::Serialize;

use crate::cmd::{lunch_date, open_store};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use crate::render;

#[derive(Args, Debug, Default)]
pub struct AnnounceArgs {
    /// Lunch day (`YYYY-MM-DD` or `dd.mm.yyyy`); defaults to the next lunch.
    #[arg(long)]
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
struct AnnounceOutput {
    date: String,
    created: bool,
    topic: String,
    message: String,
}

pub fn run_announce(args: &AnnounceArgs, output: OutputMode, config: &LunchConfig, project_root: &Path) -> Result<()> {
    let mut store = open_store(config, project_root);
    let date = lunch_date(args.date.as_deref(), &store, config)?;
    let created = store.load_grouping(date)?.is_none();
    announce(&mut store, date)?;

    let out = AnnounceOutput {
        date: lunch_key(date),
        created,
        topic: render::topic(date),
        message: render::announcement(date, &config.signup_emoji),
    };
    render_mode(
        output,
        &out,
        |o, w| {
            let state = if o.created { "announced" } else { "already announced" };
            writeln!(w, "{state} {}", o.date)
        },
        |o, w| {
            pretty_section(w, &o.topic)?;
            writeln!(w, "{}\n", o.message)?;
            pretty_kv(w, "Lunch", &o.date)?;
            pretty_kv(w, "Created", o.created.to_string())
        },
    )
}
