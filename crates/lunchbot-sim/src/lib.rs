//! lunchbot-sim library.
//!
//! Deterministic weekly-lunch simulation: a fixed roster, random attendance
//! each week, a few late sign-ups after organizing, and the ledger updated
//! after every round. Everything derives from one seed, so a failing seed
//! replays exactly.
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for return types.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

#![forbid(unsafe_code)]

pub mod campaign;
pub mod oracle;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, TimeZone, Utc};
use lunchbot_core::{Grouping, LunchRng, PairingLedger, Person, Solver, deterministic_seed};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::oracle::{GroupingOracle, OracleResult};

/// Parameters for one simulated run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub seed: u64,
    /// Roster size.
    pub people: usize,
    /// Weekly lunches to simulate.
    pub rounds: u32,
    /// Chance (percent) each person attends a given week.
    pub attendance_percent: u8,
    /// Chance (percent) an absent person signs up after organizing.
    pub late_percent: u8,
    pub group_size: usize,
    /// Greedy builds per round.
    pub samples: usize,
    /// Chance (percent) a person holds a payer.
    pub payer_percent: u8,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            people: 30,
            rounds: 20,
            attendance_percent: 60,
            late_percent: 5,
            group_size: 6,
            samples: 20,
            payer_percent: 25,
        }
    }
}

impl SimulationConfig {
    /// # Errors
    ///
    /// Fails on an empty roster, zero rounds, zero group size, or a
    /// percentage above 100.
    pub fn validate(&self) -> Result<()> {
        if self.people == 0 {
            bail!("people must be > 0");
        }
        if self.rounds == 0 {
            bail!("rounds must be > 0");
        }
        if self.group_size == 0 {
            bail!("group_size must be > 0");
        }
        for (name, value) in [
            ("attendance_percent", self.attendance_percent),
            ("late_percent", self.late_percent),
            ("payer_percent", self.payer_percent),
        ] {
            if value > 100 {
                bail!("{name} must be within 0..=100, got {value}");
            }
        }
        Ok(())
    }
}

/// One simulated lunch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundRecord {
    pub date: DateTime<Utc>,
    /// People in the organized grouping, late sign-ups last.
    pub attendees: Vec<Person>,
    pub late: usize,
    pub grouping: Grouping,
    pub score: f64,
    pub payer_shortfall: usize,
    pub oracle: OracleResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub seed: u64,
    pub rounds: Vec<RoundRecord>,
    pub ledger_pairs: usize,
    /// FNV-1a over every round's group membership.
    pub fingerprint: u64,
}

impl SimulationResult {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.rounds.iter().all(|r| r.oracle.passed)
    }

    /// Rounds in which at least one group had no payer.
    #[must_use]
    pub fn shortfall_rounds(&self) -> usize {
        self.rounds.iter().filter(|r| r.payer_shortfall > 0).count()
    }
}

/// Fold a 64-bit campaign seed into the 32-bit solver seed space.
#[must_use]
pub fn fold_seed(seed: u64) -> u32 {
    let [a, b, c, d, e, f, g, h] = seed.to_le_bytes();
    u32::from_le_bytes([a, b, c, d]) ^ u32::from_le_bytes([e, f, g, h])
}

fn first_lunch() -> Result<DateTime<Utc>> {
    Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0)
        .single()
        .context("simulation start date is invalid")
}

fn percent(value: u8) -> f64 {
    f64::from(value) / 100.0
}

pub struct Simulator {
    config: SimulationConfig,
    roster: Vec<Person>,
    ledger: PairingLedger,
    rng: LunchRng,
    start: DateTime<Utc>,
}

impl Simulator {
    /// # Errors
    ///
    /// Fails when the config does not validate.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let start = first_lunch()?;
        let mut rng = LunchRng::new(fold_seed(config.seed));
        let payer_rate = percent(config.payer_percent);
        let roster = (0..config.people)
            .map(|i| Person::new(format!("person{i:03}"), rng.uniform_float() < payer_rate))
            .collect();
        Ok(Self {
            ledger: PairingLedger::new(start - Duration::weeks(3)),
            config,
            roster,
            rng,
            start,
        })
    }

    #[must_use]
    pub fn roster(&self) -> &[Person] {
        &self.roster
    }

    /// Run every round.
    ///
    /// # Errors
    ///
    /// Propagates solver precondition failures, which would be bugs.
    pub fn run(&mut self) -> Result<SimulationResult> {
        let mut rounds = Vec::with_capacity(self.config.rounds as usize);
        for week in 0..self.config.rounds {
            let date = self.start + Duration::weeks(i64::from(week));
            rounds.push(self.run_round(date).with_context(|| format!("round {week} failed"))?);
        }

        let fingerprint = fingerprint(&rounds);
        info!(
            seed = self.config.seed,
            rounds = rounds.len(),
            pairs = self.ledger.len(),
            fingerprint,
            "simulation complete"
        );
        Ok(SimulationResult {
            seed: self.config.seed,
            rounds,
            ledger_pairs: self.ledger.len(),
            fingerprint,
        })
    }

    fn run_round(&mut self, date: DateTime<Utc>) -> Result<RoundRecord> {
        let attendees = self.rng.select(&self.roster, percent(self.config.attendance_percent));
        let absent: Vec<Person> = self
            .roster
            .iter()
            .filter(|p| !attendees.contains(p))
            .cloned()
            .collect();
        let mut late = self.rng.select(&absent, percent(self.config.late_percent));

        let seed = deterministic_seed(date) ^ fold_seed(self.config.seed);
        let mut solver = Solver::new(&self.ledger, self.config.group_size, seed);
        let solution = solver.greedy(&attendees, date, self.config.samples)?;
        let mut oracle = GroupingOracle::check_round(&attendees, self.config.group_size, &solution.assignment);

        // nobody to join when nobody came
        if solution.assignment.is_empty() {
            late.clear();
        }
        let mut grouping = solution.assignment;
        for person in &late {
            let group = solver.greedy_add_one(&grouping, date, person)?;
            grouping.push(group, person.attend());
        }
        let score = solver.score(date, &grouping);

        let mut everyone = attendees;
        everyone.extend(late.iter().cloned());
        debug!(date = %date, attendees = everyone.len(), late = late.len(), score, "round organized");
        oracle = oracle.merge(GroupingOracle::check_membership(&everyone, &grouping));

        self.ledger.update_assignment(&grouping, date);
        oracle = oracle.merge(GroupingOracle::check_ledger(&self.ledger, &grouping, date));

        Ok(RoundRecord {
            date,
            payer_shortfall: GroupingOracle::payer_shortfall(&grouping),
            attendees: everyone,
            late: late.len(),
            grouping,
            score,
            oracle,
        })
    }
}

fn fingerprint(rounds: &[RoundRecord]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;
    let mut hash = OFFSET;
    let mut feed = |bytes: &[u8]| {
        for byte in bytes {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(PRIME);
        }
    };
    for round in rounds {
        for (group, members) in round.grouping.groups() {
            feed(&group.to_le_bytes());
            for member in members {
                feed(member.id.as_str().as_bytes());
                feed(&[u8::from(member.is_leader)]);
            }
        }
    }
    hash
}
