//! Greedy randomized group assignment.
//!
//! [`Solver::greedy`] builds many randomized groupings and keeps the best
//! scoring one. Each build seeds one payer-holder per group, then places the
//! remaining people one at a time with [`Solver::greedy_add_one`], which is
//! also the entry point for late sign-ups on an already organized lunch.

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, trace};

use crate::error::{LunchError, Result};
use crate::model::{GroupId, Grouping, Person, Solution};
use crate::ordering::{max_by_key, min_by_key};
use crate::pairing::PairingLedger;
use crate::rng::LunchRng;

/// Group size used when none is configured.
pub const DEFAULT_GROUP_SIZE: usize = 6;

/// Temperature-scaled softmax, suitable as weights for
/// [`LunchRng::sample_pdf`].
#[must_use]
pub fn softmax(values: &[f64], temperature: f64) -> Vec<f64> {
    let exps: Vec<f64> = values.iter().map(|x| (x / temperature).exp()).collect();
    let norm: f64 = exps.iter().sum();
    exps.into_iter().map(|x| x / norm).collect()
}

/// Size every under-filled group should grow to next.
///
/// When all groups are the same size everyone may grow by one; otherwise the
/// smaller groups catch up to the largest first.
fn target_size(sizes: &[usize]) -> Result<usize> {
    let smallest = min_by_key(sizes.iter().copied(), |s| *s as f64)?;
    let largest = max_by_key(sizes.iter().copied(), |s| *s as f64)?;
    Ok(if smallest == largest { largest + 1 } else { largest })
}

/// Randomized greedy solver over a pairing ledger.
#[derive(Debug)]
pub struct Solver<'a> {
    ledger: &'a PairingLedger,
    group_size: usize,
    rng: LunchRng,
}

impl<'a> Solver<'a> {
    /// A zero `group_size` is treated as one.
    #[must_use]
    pub fn new(ledger: &'a PairingLedger, group_size: usize, seed: u32) -> Self {
        Self {
            ledger,
            group_size: group_size.max(1),
            rng: LunchRng::new(seed),
        }
    }

    #[must_use]
    pub const fn group_size(&self) -> usize {
        self.group_size
    }

    #[must_use]
    pub fn score(&self, date: DateTime<Utc>, grouping: &Grouping) -> f64 {
        self.ledger.score(date, grouping)
    }

    /// Best of `samples` randomized builds. Ties keep the earliest build.
    ///
    /// At least one build is always made, so `samples == 0` behaves like `1`.
    ///
    /// # Errors
    ///
    /// Propagates precondition failures from placement.
    #[instrument(skip(self, attendees), fields(attendees = attendees.len()))]
    pub fn greedy(&mut self, attendees: &[Person], date: DateTime<Utc>, samples: usize) -> Result<Solution> {
        let mut best = self.greedy_impl(attendees, date)?;
        let mut best_score = self.score(date, &best);
        debug!(score = best_score, "initial greedy solution");

        for idx in 1..samples {
            let candidate = self.greedy_impl(attendees, date)?;
            let score = self.score(date, &candidate);
            if score > best_score {
                debug!(idx, new_best = score, previous_best = best_score, "greedy solver improved solution");
                best = candidate;
                best_score = score;
            }
        }

        Ok(Solution {
            assignment: best,
            score: best_score,
        })
    }

    /// Group `person` should join: among groups below the target size, the
    /// one whose members they have gone longest without meeting.
    ///
    /// Does not modify `grouping`.
    ///
    /// # Errors
    ///
    /// Returns [`LunchError::EmptyExtremum`] for a grouping without groups.
    pub fn greedy_add_one(&self, grouping: &Grouping, date: DateTime<Utc>, person: &Person) -> Result<GroupId> {
        let target = target_size(&grouping.sizes())?;
        let candidates = grouping
            .groups()
            .filter(|(_, members)| members.len() < target)
            .map(|(id, members)| (id, self.ledger.mean_distance(date, &person.id, members)));
        trace!(person = %person.id, target, "placing attendee");
        let (id, _) = max_by_key(candidates, |(_, distance)| *distance)
            .map_err(|_| LunchError::GroupingBalanced { target })?;
        Ok(id)
    }

    fn greedy_impl(&mut self, attendees: &[Person], date: DateTime<Utc>) -> Result<Grouping> {
        let group_count = attendees.len().div_ceil(self.group_size);
        let mut grouping = Grouping::new();
        let mut remaining = attendees.to_vec();
        self.rng.shuffle(&mut remaining);

        // one payer-holder per group, as far as they go
        let mut next_group: GroupId = 1;
        let mut cursor = 0;
        while (next_group as usize) <= group_count && cursor < remaining.len() {
            if remaining[cursor].has_payer {
                let seed = remaining.remove(cursor);
                grouping.push(next_group, seed.attend());
                next_group += 1;
            } else {
                cursor += 1;
            }
        }
        for id in next_group..=group_count_id(group_count) {
            grouping.open_group(id);
        }
        debug!(group_count, seeded = next_group - 1, "greedy build start");

        while let Some(person) = remaining.pop() {
            let id = self.greedy_add_one(&grouping, date, &person)?;
            grouping.push(id, person.attend());
        }

        for members in grouping.groups_mut() {
            if members.is_empty() {
                continue;
            }
            let leader = self.rng.roll_fair_dice(members.len());
            members[leader].is_leader = true;
        }

        Ok(grouping)
    }
}

fn group_count_id(count: usize) -> GroupId {
    GroupId::try_from(count).unwrap_or(GroupId::MAX)
}
