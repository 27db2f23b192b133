
use anyhow::Result;
use clap::Args;
use lunchbot_core::dates::{lunch_key, parse_lunch_date};
use lunchbot_core::deterministic_seed;
use serde::Serialize;

use crate::output::{OutputMode, pretty_kv, render_mode};

#[derive(Args, Debug)]
pub struct SeedArgs {
    /// Lunch day (`YYYY-MM-DD`, `dd.mm.yyyy` or RFC 3339).
    pub date: String,
}

#[derive(Debug, Serialize)]
struct SeedOutput {
    date: String,
    seed: u32,
}

/// Print the RNG seed a lunch date produces, for reproducing a grouping.
pub fn run_seed(args: &SeedArgs, output: OutputMode) -> Result<()> {
    let date = parse_lunch_date(&args.date)?;
    let out = SeedOutput {
        date: lunch_key(date),
        seed: deterministic_seed(date),
    };
    render_mode(
        output,
        &out,
        |o, w| writeln!(w, "{}", o.seed),
        |o, w| {
            pretty_kv(w, "Lunch", &o.date)?;
            pretty_kv(w, "Seed", o.seed.to_string())
        },
    )
}
