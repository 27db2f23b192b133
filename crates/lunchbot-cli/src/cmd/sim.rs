//! `lb sim`: deterministic lunch simulation commands.
//!
//! `lb sim run`: execute a campaign across many seeds.
//! `lb sim replay`: replay a single seed round by round.

use std::process;

use anyhow::Result;
use clap::{Args, Subcommand};
use lunchbot_core::dates::lunch_key;
use lunchbot_sim::campaign::{CampaignConfig, collect_violations, format_violation, replay_seed, run_campaign};
use serde::Serialize;

use crate::output::{OutputMode, pretty_kv, pretty_section};

/// Top-level arguments for `lb sim`.
#[derive(Args, Debug)]
pub struct SimArgs {
    #[command(subcommand)]
    pub command: SimCommand,
}

/// Simulation subcommands.
#[derive(Subcommand, Debug)]
pub enum SimCommand {
    /// Run a campaign across multiple seeds.
    #[command(
        about = "Run a simulation campaign across multiple seeds",
        long_about = "Simulate weeks of lunches with random attendance and late sign-ups for\n\
                      every seed in a range. Each round is checked for membership, leader,\n\
                      balance and ledger invariants. Reports the first failing seed for replay.",
        after_help = "EXAMPLES:\n    # Run 100 seeds with defaults\n    lb sim run --seeds 100\n\n\
                      # Bigger office, more weeks\n    lb sim run --seeds 50 --people 80 --rounds 52\n\n\
                      # Machine-readable output\n    lb sim run --seeds 100 --json"
    )]
    Run(SimRunArgs),

    /// Replay a single seed round by round.
    #[command(
        about = "Replay a single seed with per-round detail",
        long_about = "Replay one seed and print every round: attendance, late sign-ups, score\n\
                      and invariant violations. Use after a campaign failure to debug.",
        after_help = "EXAMPLES:\n    # Replay seed 42\n    lb sim replay --seed 42\n\n\
                      # Replay with custom parameters\n    lb sim replay --seed 42 --people 80 --rounds 52\n\n\
                      # Machine-readable output\n    lb sim replay --seed 42 --json"
    )]
    Replay(SimReplayArgs),
}

/// Simulation parameters shared by `run` and `replay`.
#[derive(Args, Debug, Clone)]
pub struct SimParams {
    /// Number of people in the office.
    #[arg(long, default_value = "30")]
    pub people: usize,

    /// Number of weekly lunches per seed.
    #[arg(long, default_value = "20")]
    pub rounds: u32,

    /// Chance (percent) a person signs up on time.
    #[arg(long, default_value = "60")]
    pub attendance: u8,

    /// Chance (percent) an absent person signs up after organizing.
    #[arg(long, default_value = "5")]
    pub late: u8,

    /// Target group size.
    #[arg(long, default_value = "6")]
    pub group_size: usize,

    /// Greedy passes per lunch.
    #[arg(long, default_value = "20")]
    pub samples: usize,

    /// Chance (percent) a person holds a payer.
    #[arg(long, default_value = "25")]
    pub payers: u8,
}

/// Arguments for `lb sim run`.
#[derive(Args, Debug)]
pub struct SimRunArgs {
    /// Number of seeds to run.
    #[arg(long, default_value = "100")]
    pub seeds: u64,

    /// Starting seed value.
    #[arg(long, default_value = "0")]
    pub seed_start: u64,

    #[command(flatten)]
    pub params: SimParams,
}

/// Arguments for `lb sim replay`.
#[derive(Args, Debug)]
pub struct SimReplayArgs {
    /// Seed to replay.
    #[arg(long)]
    pub seed: u64,

    #[command(flatten)]
    pub params: SimParams,
}

/// JSON output for `lb sim run`.
#[derive(Debug, Serialize)]
struct RunOutput {
    seeds_run: usize,
    seeds_passed: usize,
    seeds_failed: usize,
    first_failure: Option<u64>,
    payer_shortfall_rounds: usize,
    all_passed: bool,
    failures: Vec<FailureOutput>,
}

#[derive(Debug, Serialize)]
struct FailureOutput {
    seed: u64,
    violations: Vec<String>,
}

/// JSON output for `lb sim replay`.
#[derive(Debug, Serialize)]
struct ReplayOutput {
    seed: u64,
    rounds: Vec<RoundOutput>,
    ledger_pairs: usize,
    oracle_passed: bool,
    violations: Vec<String>,
    fingerprint: u64,
}

#[derive(Debug, Serialize)]
struct RoundOutput {
    date: String,
    attendees: usize,
    late: usize,
    groups: usize,
    score: f64,
    payer_shortfall: usize,
    passed: bool,
}

fn build_campaign_config(seed_start: u64, seeds: u64, params: &SimParams) -> CampaignConfig {
    CampaignConfig {
        seed_range: seed_start..seed_start.saturating_add(seeds),
        people: params.people,
        rounds: params.rounds,
        attendance_percent: params.attendance,
        late_percent: params.late,
        group_size: params.group_size,
        samples: params.samples,
        payer_percent: params.payers,
    }
}

/// Execute `lb sim run`.
pub fn run_sim_run(args: &SimRunArgs, output: OutputMode) -> Result<()> {
    let config = build_campaign_config(args.seed_start, args.seeds, &args.params);
    let report = run_campaign(&config)?;

    let out = RunOutput {
        seeds_run: report.seeds_run,
        seeds_passed: report.seeds_passed,
        seeds_failed: report.failures.len(),
        first_failure: report.first_failure,
        payer_shortfall_rounds: report.payer_shortfall_rounds,
        all_passed: report.all_passed(),
        failures: report
            .failures
            .iter()
            .map(|f| FailureOutput {
                seed: f.seed,
                violations: f.violations.clone(),
            })
            .collect(),
    };

    let p = &args.params;
    match output {
        OutputMode::Json => {
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputMode::Text => {
            println!(
                "campaign seeds_run={} people={} rounds={} group_size={}",
                out.seeds_run, p.people, p.rounds, p.group_size
            );
            println!(
                "results passed={} failed={} payer_shortfall_rounds={} all_passed={}",
                out.seeds_passed, out.seeds_failed, out.payer_shortfall_rounds, out.all_passed
            );
            if !out.all_passed {
                for failure in out.failures.iter().take(5) {
                    println!("failure seed={} violations={}", failure.seed, failure.violations.len());
                }
                if out.failures.len() > 5 {
                    println!("failures_truncated count={}", out.failures.len() - 5);
                }
                println!(
                    "hint replay_seed={} people={} rounds={}",
                    out.first_failure.unwrap_or(0),
                    p.people,
                    p.rounds
                );
            }
        }
        OutputMode::Pretty => {
            let stdout = std::io::stdout();
            let mut w = stdout.lock();
            pretty_section(&mut w, "Simulation Campaign")?;
            pretty_kv(&mut w, "Seeds", out.seeds_run.to_string())?;
            pretty_kv(&mut w, "People", p.people.to_string())?;
            pretty_kv(&mut w, "Rounds", p.rounds.to_string())?;
            pretty_kv(&mut w, "Attendance", format!("{}% (+{}% late)", p.attendance, p.late))?;
            pretty_kv(
                &mut w,
                "Results",
                format!("{} passed / {} failed", out.seeds_passed, out.seeds_failed),
            )?;
            pretty_kv(&mut w, "No payer", format!("{} rounds", out.payer_shortfall_rounds))?;

            if out.all_passed {
                pretty_kv(&mut w, "Status", "all seeds passed")?;
            } else {
                pretty_kv(
                    &mut w,
                    "Status",
                    format!(
                        "{} failures (first at seed {})",
                        out.seeds_failed,
                        out.first_failure.unwrap_or(0)
                    ),
                )?;
                println!();
                pretty_section(&mut w, "Failure Samples")?;
                for failure in out.failures.iter().take(5) {
                    println!("seed {:<8} violations={}", failure.seed, failure.violations.len());
                    for violation in &failure.violations {
                        println!("  - {violation}");
                    }
                }
                println!();
                pretty_kv(
                    &mut w,
                    "Replay",
                    format!(
                        "lb sim replay --seed {} --people {} --rounds {}",
                        out.first_failure.unwrap_or(0),
                        p.people,
                        p.rounds
                    ),
                )?;
            }
        }
    }

    // Exit code 1 on any failure for CI integration
    if !report.all_passed() {
        process::exit(1);
    }
    Ok(())
}

/// Execute `lb sim replay`.
pub fn run_sim_replay(args: &SimReplayArgs, output: OutputMode) -> Result<()> {
    let config = build_campaign_config(args.seed, 1, &args.params);
    let result = replay_seed(args.seed, &config)?;
    let violations: Vec<String> = collect_violations(&result).iter().map(format_violation).collect();

    let out = ReplayOutput {
        seed: args.seed,
        rounds: result
            .rounds
            .iter()
            .map(|round| RoundOutput {
                date: lunch_key(round.date),
                attendees: round.attendees.len(),
                late: round.late,
                groups: round.grouping.group_count(),
                score: round.score,
                payer_shortfall: round.payer_shortfall,
                passed: round.oracle.passed,
            })
            .collect(),
        ledger_pairs: result.ledger_pairs,
        oracle_passed: result.passed(),
        violations,
        fingerprint: result.fingerprint,
    };

    match output {
        OutputMode::Json => {
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputMode::Text => {
            println!(
                "replay seed={} people={} rounds={} group_size={}",
                out.seed, args.params.people, args.params.rounds, args.params.group_size
            );
            println!(
                "result oracle_passed={} ledger_pairs={} fingerprint={:016x}",
                out.oracle_passed, out.ledger_pairs, out.fingerprint
            );
            for round in &out.rounds {
                println!(
                    "round date={} attendees={} late={} groups={} score={:.3} no_payer={} passed={}",
                    round.date,
                    round.attendees,
                    round.late,
                    round.groups,
                    round.score,
                    round.payer_shortfall,
                    round.passed
                );
            }
            for violation in &out.violations {
                println!("violation={violation}");
            }
        }
        OutputMode::Pretty => {
            let stdout = std::io::stdout();
            let mut w = stdout.lock();
            pretty_section(&mut w, &format!("Replay Seed {}", out.seed))?;
            pretty_kv(&mut w, "People", args.params.people.to_string())?;
            pretty_kv(&mut w, "Rounds", out.rounds.len().to_string())?;
            pretty_kv(&mut w, "Pairs", out.ledger_pairs.to_string())?;
            pretty_kv(&mut w, "Fingerprint", format!("{:016x}", out.fingerprint))?;
            pretty_kv(&mut w, "Oracle", out.oracle_passed.to_string())?;
            println!();
            pretty_section(&mut w, "Rounds")?;
            for round in &out.rounds {
                println!(
                    "{}  {:>3} people  {:>2} late  {:>2} groups  score {:>8.3}{}",
                    round.date,
                    round.attendees,
                    round.late,
                    round.groups,
                    round.score,
                    if round.passed { "" } else { "  FAILED" }
                );
            }
            if !out.oracle_passed {
                println!();
                pretty_section(&mut w, "Violations")?;
                for violation in &out.violations {
                    println!("  - {violation}");
                }
            }
        }
    }

    if !out.oracle_passed {
        process::exit(1);
    }
    Ok(())
}

/// Dispatch `lb sim` subcommands.
pub fn run_sim(args: &SimArgs, output: OutputMode) -> Result<()> {
    match &args.command {
        SimCommand::Run(run_args) => run_sim_run(run_args, output),
        SimCommand::Replay(replay_args) => run_sim_replay(replay_args, output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SimParams {
        SimParams {
            people: 12,
            rounds: 4,
            attendance: 70,
            late: 10,
            group_size: 4,
            samples: 5,
            payers: 30,
        }
    }

    #[test]
    fn campaign_config_maps_params() {
        let config = build_campaign_config(10, 5, &params());
        assert_eq!(config.seed_range, 10..15);
        assert_eq!(config.people, 12);
        assert_eq!(config.group_size, 4);
        assert_eq!(config.payer_percent, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn seed_range_saturates() {
        let config = build_campaign_config(u64::MAX - 1, 10, &params());
        assert_eq!(config.seed_range, (u64::MAX - 1)..u64::MAX);
    }
}
