//! Campaign runner for deterministic simulation campaigns.
//!
//! Executes many seeds with the same parameters, collecting pass/fail
//! results and identifying the first failing seed for replay.

use std::ops::Range;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::oracle::InvariantViolation;
use crate::{SimulationConfig, SimulationResult, Simulator};

/// Campaign-level configuration: which seeds to run and the simulation
/// parameters shared by all of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignConfig {
    /// Range of seeds to execute, e.g., `0..100`.
    pub seed_range: Range<u64>,
    pub people: usize,
    pub rounds: u32,
    pub attendance_percent: u8,
    pub late_percent: u8,
    pub group_size: usize,
    pub samples: usize,
    pub payer_percent: u8,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        let sim = SimulationConfig::default();
        Self {
            seed_range: 0..100,
            people: sim.people,
            rounds: sim.rounds,
            attendance_percent: sim.attendance_percent,
            late_percent: sim.late_percent,
            group_size: sim.group_size,
            samples: sim.samples,
            payer_percent: sim.payer_percent,
        }
    }
}

impl CampaignConfig {
    /// Build a [`SimulationConfig`] for a specific seed.
    #[must_use]
    pub const fn sim_config_for_seed(&self, seed: u64) -> SimulationConfig {
        SimulationConfig {
            seed,
            people: self.people,
            rounds: self.rounds,
            attendance_percent: self.attendance_percent,
            late_percent: self.late_percent,
            group_size: self.group_size,
            samples: self.samples,
            payer_percent: self.payer_percent,
        }
    }

    /// # Errors
    ///
    /// Returns an error for an empty seed range or invalid simulation
    /// parameters.
    pub fn validate(&self) -> Result<()> {
        if self.seed_range.is_empty() {
            bail!("seed_range must not be empty");
        }
        self.sim_config_for_seed(self.seed_range.start).validate()
    }
}

/// Failure details for a single seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedFailure {
    pub seed: u64,
    pub violations: Vec<String>,
}

/// Aggregate report produced by a campaign run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignReport {
    pub seeds_run: usize,
    pub seeds_passed: usize,
    /// First seed that failed (for prioritized replay).
    pub first_failure: Option<u64>,
    pub failures: Vec<SeedFailure>,
    /// Rounds, across all seeds, with at least one group lacking a payer.
    pub payer_shortfall_rounds: usize,
}

impl CampaignReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run a full campaign across all seeds in the config.
///
/// # Errors
///
/// Returns an error if config validation fails or a simulation hits an
/// internal error.
pub fn run_campaign(config: &CampaignConfig) -> Result<CampaignReport> {
    config.validate()?;

    let mut report = CampaignReport {
        seeds_run: 0,
        seeds_passed: 0,
        first_failure: None,
        failures: Vec::new(),
        payer_shortfall_rounds: 0,
    };

    for seed in config.seed_range.clone() {
        report.seeds_run += 1;
        let result = replay_seed(seed, config)?;
        report.payer_shortfall_rounds += result.shortfall_rounds();

        let violations = collect_violations(&result);
        if violations.is_empty() {
            report.seeds_passed += 1;
            continue;
        }

        warn!(seed, violations = violations.len(), "seed failed");
        report.first_failure.get_or_insert(seed);
        report.failures.push(SeedFailure {
            seed,
            violations: violations.iter().map(format_violation).collect(),
        });
    }

    Ok(report)
}

/// Replay a single seed with every round's details.
///
/// # Errors
///
/// Returns an error when config validation or simulation fails.
pub fn replay_seed(seed: u64, config: &CampaignConfig) -> Result<SimulationResult> {
    let mut simulator = Simulator::new(config.sim_config_for_seed(seed))?;
    simulator.run()
}

/// Every violation in a result, in round order.
#[must_use]
pub fn collect_violations(result: &SimulationResult) -> Vec<InvariantViolation> {
    result
        .rounds
        .iter()
        .flat_map(|round| round.oracle.violations.iter().cloned())
        .collect()
}

/// Format an invariant violation into a human-readable string.
#[must_use]
pub fn format_violation(v: &InvariantViolation) -> String {
    match v {
        InvariantViolation::Membership { missing, unexpected } => {
            format!("Membership: missing={missing:?} unexpected={unexpected:?}")
        }
        InvariantViolation::DuplicateMember { person, seats } => {
            format!("Duplicate: {person} holds {seats} seats")
        }
        InvariantViolation::LeaderCount { group, leaders } => {
            format!("Leaders: group {group} has {leaders} leaders")
        }
        InvariantViolation::SizeSpread { smallest, largest } => {
            format!("Balance: group sizes range from {smallest} to {largest}")
        }
        InvariantViolation::GroupCount { expected, actual } => {
            format!("Balance: expected {expected} groups, got {actual}")
        }
        InvariantViolation::PendingPool { members } => {
            format!("Pending: sign-up pool with {members} members left in an organized lunch")
        }
        InvariantViolation::LedgerStale {
            a,
            b,
            recorded,
            expected,
        } => format!("Ledger: {a}/{b} recorded {recorded}, expected {expected}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lunchbot_core::PersonId;

    fn small() -> CampaignConfig {
        CampaignConfig {
            seed_range: 0..5,
            people: 14,
            rounds: 6,
            samples: 4,
            ..CampaignConfig::default()
        }
    }

    #[test]
    fn small_campaign_passes() {
        let report = run_campaign(&small()).expect("campaign");
        assert_eq!(report.seeds_run, 5);
        assert!(report.all_passed(), "{:?}", report.failures);
        assert_eq!(report.first_failure, None);
    }

    #[test]
    fn no_payers_means_shortfalls_not_failures() {
        let config = CampaignConfig {
            payer_percent: 0,
            ..small()
        };
        let report = run_campaign(&config).expect("campaign");
        assert!(report.all_passed());
        assert!(report.payer_shortfall_rounds > 0);
    }

    #[test]
    fn empty_seed_range_is_rejected() {
        let config = CampaignConfig {
            seed_range: 3..3,
            ..small()
        };
        assert!(run_campaign(&config).is_err());
    }

    #[test]
    fn replay_matches_campaign_seed() {
        let config = small();
        let a = replay_seed(3, &config).expect("replay");
        let b = replay_seed(3, &config).expect("replay");
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(a.seed, 3);
    }

    #[test]
    fn violations_format_readably() {
        let text = format_violation(&InvariantViolation::DuplicateMember {
            person: PersonId::from("ana"),
            seats: 2,
        });
        assert_eq!(text, "Duplicate: ana holds 2 seats");
    }
}
