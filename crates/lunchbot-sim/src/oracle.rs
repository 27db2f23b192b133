use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use lunchbot_core::{Grouping, PENDING_GROUP, PairingLedger, Person, PersonId};
use serde::Serialize;

// ── Core result types ─────────────────────────────────────────────────────────

/// Oracle result for one round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OracleResult {
    /// `true` iff no violations were found.
    pub passed: bool,
    pub violations: Vec<InvariantViolation>,
}

impl OracleResult {
    fn pass() -> Self {
        Self {
            passed: true,
            violations: Vec::new(),
        }
    }

    fn from_violations(violations: Vec<InvariantViolation>) -> Self {
        Self {
            passed: violations.is_empty(),
            violations,
        }
    }

    /// Merge another result into this one (failures accumulate).
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        if !other.passed {
            self.passed = false;
            self.violations.extend(other.violations);
        }
        self
    }
}

// ── Invariant violation diagnostics ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvariantViolation {
    /// The grouping does not hold exactly the people who attended.
    Membership {
        missing: Vec<PersonId>,
        unexpected: Vec<PersonId>,
    },

    /// Someone sits in more than one seat.
    DuplicateMember { person: PersonId, seats: usize },

    /// A group without exactly one leader.
    LeaderCount { group: u32, leaders: usize },

    /// Group sizes differ by more than one.
    SizeSpread { smallest: usize, largest: usize },

    /// The number of groups is not `ceil(attendees / group_size)`.
    GroupCount { expected: usize, actual: usize },

    /// An organized grouping still carries the sign-up pool.
    PendingPool { members: usize },

    /// Two people who just ate together are not recorded as having met.
    LedgerStale {
        a: PersonId,
        b: PersonId,
        recorded: DateTime<Utc>,
        expected: DateTime<Utc>,
    },
}

// ── Oracle ────────────────────────────────────────────────────────────────────

/// Checks a round's grouping against its inputs.
///
/// # Invariants checked
///
/// 1. **Membership**: everyone who attended is placed, nobody else is.
/// 2. **Uniqueness**: nobody is placed twice.
/// 3. **Leadership**: every group has exactly one leader.
/// 4. **Balance**: group sizes differ by at most one and the group count
///    matches the configured group size.
/// 5. **Ledger freshness**: after the round, every pair in a group is
///    recorded as having met on the round date.
///
/// Payer coverage is not an invariant. [`GroupingOracle::payer_shortfall`]
/// reports how many groups went without one.
pub struct GroupingOracle;

impl GroupingOracle {
    #[must_use]
    pub fn check_membership(attendees: &[Person], grouping: &Grouping) -> OracleResult {
        let expected: BTreeSet<&PersonId> = attendees.iter().map(|p| &p.id).collect();
        let mut seats: BTreeMap<&PersonId, usize> = BTreeMap::new();
        for attendee in grouping.attendees() {
            *seats.entry(&attendee.id).or_default() += 1;
        }

        let mut violations = Vec::new();
        let missing: Vec<PersonId> = expected
            .iter()
            .filter(|id| !seats.contains_key(*id))
            .map(|id| (*id).clone())
            .collect();
        let unexpected: Vec<PersonId> = seats
            .keys()
            .filter(|id| !expected.contains(*id))
            .map(|id| (*id).clone())
            .collect();
        if !missing.is_empty() || !unexpected.is_empty() {
            violations.push(InvariantViolation::Membership { missing, unexpected });
        }
        for (person, count) in seats {
            if count > 1 {
                violations.push(InvariantViolation::DuplicateMember {
                    person: person.clone(),
                    seats: count,
                });
            }
        }
        OracleResult::from_violations(violations)
    }

    #[must_use]
    pub fn check_leaders(grouping: &Grouping) -> OracleResult {
        let violations = grouping
            .groups()
            .filter_map(|(group, members)| {
                let leaders = members.iter().filter(|a| a.is_leader).count();
                (leaders != 1).then_some(InvariantViolation::LeaderCount { group, leaders })
            })
            .collect();
        OracleResult::from_violations(violations)
    }

    #[must_use]
    pub fn check_balance(attendee_count: usize, group_size: usize, grouping: &Grouping) -> OracleResult {
        let mut violations = Vec::new();
        let expected = attendee_count.div_ceil(group_size.max(1));
        if grouping.group_count() != expected {
            violations.push(InvariantViolation::GroupCount {
                expected,
                actual: grouping.group_count(),
            });
        }
        let sizes = grouping.sizes();
        if let (Some(&smallest), Some(&largest)) = (sizes.iter().min(), sizes.iter().max()) {
            if largest - smallest > 1 {
                violations.push(InvariantViolation::SizeSpread { smallest, largest });
            }
        }
        let pending = grouping.get(PENDING_GROUP).len();
        if grouping.groups().any(|(id, _)| id == PENDING_GROUP) {
            violations.push(InvariantViolation::PendingPool { members: pending });
        }
        OracleResult::from_violations(violations)
    }

    #[must_use]
    pub fn check_ledger(ledger: &PairingLedger, grouping: &Grouping, date: DateTime<Utc>) -> OracleResult {
        let mut violations = Vec::new();
        for (_, members) in grouping.groups() {
            for (i, a) in members.iter().enumerate() {
                for b in &members[i + 1..] {
                    let recorded = ledger.get(&a.id, &b.id).unwrap_or(ledger.floor_date());
                    if recorded != date {
                        violations.push(InvariantViolation::LedgerStale {
                            a: a.id.clone(),
                            b: b.id.clone(),
                            recorded,
                            expected: date,
                        });
                    }
                }
            }
        }
        OracleResult::from_violations(violations)
    }

    /// Every grouping invariant for one organized round.
    #[must_use]
    pub fn check_round(attendees: &[Person], group_size: usize, grouping: &Grouping) -> OracleResult {
        OracleResult::pass()
            .merge(Self::check_membership(attendees, grouping))
            .merge(Self::check_leaders(grouping))
            .merge(Self::check_balance(attendees.len(), group_size, grouping))
    }

    /// Groups without any payer-holder.
    #[must_use]
    pub fn payer_shortfall(grouping: &Grouping) -> usize {
        grouping
            .groups()
            .filter(|(_, members)| !members.iter().any(|a| a.has_payer))
            .count()
    }
}
