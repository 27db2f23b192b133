use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use lunchbot_core::config::LunchConfig;
use lunchbot_core::{LunchStore, PairingLedger};
use serde::Serialize;

use crate::cmd::open_store;
use crate::output::{OutputMode, pretty_kv, render_mode};

#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Ledger file (`ledger.json` from another data directory).
    pub file: PathBuf,

    /// Show the merged result without saving it.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
struct MergeOutput {
    pairs_before: usize,
    pairs_incoming: usize,
    pairs_after: usize,
    floor_date: String,
    saved: bool,
}

/// Fold another ledger into the store's, keeping the later date per pair.
pub fn run_merge(args: &MergeArgs, output: OutputMode, config: &LunchConfig, project_root: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let incoming: PairingLedger = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse ledger {}", args.file.display()))?;

    let mut store = open_store(config, project_root);
    let current = store.stored_ledger()?;
    let merged = current.as_ref().map_or_else(|| incoming.clone(), |c| c.merge(&incoming));
    if !args.dry_run {
        store.save_ledger(&merged)?;
    }

    let out = MergeOutput {
        pairs_before: current.as_ref().map_or(0, PairingLedger::len),
        pairs_incoming: incoming.len(),
        pairs_after: merged.len(),
        floor_date: merged.floor_date().to_rfc3339(),
        saved: !args.dry_run,
    };
    render_mode(
        output,
        &out,
        |o, w| {
            writeln!(
                w,
                "merged before={} incoming={} after={} saved={}",
                o.pairs_before, o.pairs_incoming, o.pairs_after, o.saved
            )
        },
        |o, w| {
            pretty_kv(w, "Before", format!("{} pairs", o.pairs_before))?;
            pretty_kv(w, "Incoming", format!("{} pairs", o.pairs_incoming))?;
            pretty_kv(w, "After", format!("{} pairs", o.pairs_after))?;
            pretty_kv(w, "Floor", &o.floor_date)?;
            pretty_kv(w, "Saved", o.saved.to_string())
        },
    )
}
