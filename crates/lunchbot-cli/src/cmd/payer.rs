use std::path::Path;

use anyhow::Result;
use clap::Args;
use lunchbot_core::config::LunchConfig;
use lunchbot_core::{LunchStore, PersonId};
use serde::Serialize;

use crate::cmd::open_store;
use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct PayerArgs {
    /// Person whose payer flag changes.
    pub person: String,

    /// Clear the flag instead of setting it.
    #[arg(long)]
    pub off: bool,
}

#[derive(Debug, Serialize)]
struct PayerOutput {
    person: PersonId,
    has_payer: bool,
}

pub fn run_payer(args: &PayerArgs, output: OutputMode, config: &LunchConfig, project_root: &Path) -> Result<()> {
    let mut store = open_store(config, project_root);
    let person = PersonId::new(args.person.as_str());
    store.ensure_person(&person)?;
    store.set_payer(&person, !args.off)?;

    let out = PayerOutput {
        person,
        has_payer: !args.off,
    };
    render(output, &out, |o, w| writeln!(w, "set {} payer to {}", o.person, o.has_payer))
}
