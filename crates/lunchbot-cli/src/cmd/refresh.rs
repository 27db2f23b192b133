use std::path::Path;

use anyhow::Result;
use clap::Args;
use lunchbot_core::{LunchStore, PairingLedger};
use lunchbot_core::config::LunchConfig;
use lunchbot_core::workflow::refresh_ledger;
use serde::Serialize;

use crate::cmd::open_store;
use crate::output::{OutputMode, render};

#[derive(Args, Debug, Default)]
pub struct RefreshArgs {}

#[derive(Debug, Serialize)]
struct RefreshOutput {
    updated: bool,
    latest: Option<String>,
    pairs: usize,
}

/// Fold the latest organized lunch into the pairing ledger if it is missing.
pub fn run_refresh(_args: &RefreshArgs, output: OutputMode, config: &LunchConfig, project_root: &Path) -> Result<()> {
    let mut store = open_store(config, project_root);
    let updated = refresh_ledger(&mut store)?;
    let ledger = store.stored_ledger()?;

    let out = RefreshOutput {
        updated,
        latest: ledger
            .as_ref()
            .and_then(PairingLedger::latest_date)
            .map(|d| d.to_rfc3339()),
        pairs: ledger.as_ref().map_or(0, PairingLedger::len),
    };
    render(output, &out, |o, w| {
        writeln!(
            w,
            "refresh updated={} latest={} pairs={}",
            o.updated,
            o.latest.as_deref().unwrap_or("none"),
            o.pairs
        )
    })
}
