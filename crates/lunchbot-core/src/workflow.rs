//! Lunch lifecycle over any [`LunchStore`].
//!
//! A lunch starts as a pending pool ([`announce`]), collects sign-ups through
//! reactions ([`apply_reaction`]), is split into groups once ([`organize`]),
//! and afterwards only grows one person at a time ([`late_signup`]). When the
//! lunch has passed, [`refresh_ledger`] folds its groups into the ledger.
//! [`fixup`] repairs a lunch from the full sign-up list when reactions
//! were missed.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::LunchConfig;
use crate::dates::{deadline_after, lunch_key};
use crate::error::{LunchError, Result};
use crate::model::{GroupId, Grouping, PENDING_GROUP, Person, PersonId, Solution};
use crate::rng::deterministic_seed;
use crate::solver::Solver;
use crate::store::LunchStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionOp {
    Add,
    Remove,
}

/// Someone adding or removing an emoji on the announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub person: PersonId,
    pub emoji: String,
    pub op: ReactionOp,
}

/// What a reaction did to the lunch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReactionOutcome {
    /// Not the sign-up emoji, or nothing changed.
    Ignored,
    Joined,
    Left,
    Placed(LateSignup),
}

/// Result of placing one person into an organized lunch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LateSignup {
    pub group: GroupId,
    pub score: f64,
}

fn load_lunch<S: LunchStore>(store: &S, date: DateTime<Utc>) -> Result<Grouping> {
    store
        .load_grouping(date)?
        .ok_or_else(|| LunchError::LunchNotFound(lunch_key(date)))
}

/// Open an empty sign-up pool for `date`. An existing lunch is left as is.
///
/// # Errors
///
/// Propagates store failures.
#[instrument(skip(store), fields(date = %lunch_key(date)))]
pub fn announce<S: LunchStore>(store: &mut S, date: DateTime<Utc>) -> Result<Grouping> {
    if let Some(existing) = store.load_grouping(date)? {
        debug!("lunch already announced");
        return Ok(existing);
    }
    let grouping = Grouping::pending();
    store.save_grouping(date, &grouping)?;
    info!("lunch announced");
    Ok(grouping)
}

/// Split the pending pool of `date` into groups and persist the result.
///
/// Payer flags are re-read from the store so changes made after sign-up
/// count. The solver is seeded from the date, so re-running after a crash
/// reproduces the same grouping.
///
/// # Errors
///
/// [`LunchError::LunchNotFound`] without an announcement,
/// [`LunchError::LunchAlreadyOrganized`] when groups already exist.
#[instrument(skip(store, config), fields(date = %lunch_key(date)))]
pub fn organize<S: LunchStore>(store: &mut S, date: DateTime<Utc>, config: &LunchConfig) -> Result<Solution> {
    let grouping = load_lunch(store, date)?;
    if grouping.is_finalized() {
        return Err(LunchError::LunchAlreadyOrganized(lunch_key(date)));
    }

    let mut attendees = Vec::with_capacity(grouping.pending_pool().len());
    for attendee in grouping.pending_pool() {
        attendees.push(store.ensure_person(&attendee.id)?);
    }
    if attendees.is_empty() {
        warn!("organizing a lunch nobody signed up for");
    }

    let ledger = store.load_ledger(date)?;
    let mut solver = Solver::new(&ledger, config.group_size, deterministic_seed(date));
    let solution = solver.greedy(&attendees, date, config.sample_count)?;
    store.save_grouping(date, &solution.assignment)?;
    info!(
        attendees = attendees.len(),
        groups = solution.assignment.group_count(),
        score = solution.score,
        "lunch organized"
    );
    Ok(solution)
}

/// Place `person` into the already organized lunch of `date`.
///
/// Someone already in the lunch keeps their group.
///
/// # Errors
///
/// [`LunchError::LunchNotFound`] without a lunch, [`LunchError::InvalidInput`]
/// when the lunch has not been organized yet.
#[instrument(skip(store, config), fields(date = %lunch_key(date)))]
pub fn late_signup<S: LunchStore>(
    store: &mut S,
    date: DateTime<Utc>,
    person: &PersonId,
    config: &LunchConfig,
) -> Result<LateSignup> {
    let mut grouping = load_lunch(store, date)?;
    if !grouping.is_finalized() {
        return Err(LunchError::InvalidInput(format!(
            "lunch {} is not organized yet",
            lunch_key(date)
        )));
    }

    let ledger = store.load_ledger(date)?;
    let solver = Solver::new(&ledger, config.group_size, deterministic_seed(date));

    if let Some((group, _)) = grouping
        .groups()
        .find(|(_, members)| members.iter().any(|a| &a.id == person))
    {
        debug!(group, "already placed");
        return Ok(LateSignup {
            group,
            score: solver.score(date, &grouping),
        });
    }

    let newcomer: Person = store.ensure_person(person)?;
    let group = solver.greedy_add_one(&grouping, date, &newcomer)?;
    grouping.push(group, newcomer.attend());
    store.save_grouping(date, &grouping)?;

    let score = solver.score(date, &grouping);
    info!(group, score, "late sign-up placed");
    Ok(LateSignup { group, score })
}

/// Apply a reaction on the announcement of `date`.
///
/// Before organizing, the sign-up emoji adds to or removes from the pending
/// pool. Afterwards an add becomes a [`late_signup`] and a removal is
/// refused. Other emoji are ignored.
///
/// # Errors
///
/// [`LunchError::LunchNotFound`] without a lunch,
/// [`LunchError::LunchAlreadyOrganized`] when leaving an organized lunch.
#[instrument(skip(store, config), fields(date = %lunch_key(date), person = %reaction.person))]
pub fn apply_reaction<S: LunchStore>(
    store: &mut S,
    date: DateTime<Utc>,
    reaction: &Reaction,
    config: &LunchConfig,
) -> Result<ReactionOutcome> {
    if reaction.emoji != config.signup_emoji {
        debug!(emoji = %reaction.emoji, "ignoring unrelated reaction");
        return Ok(ReactionOutcome::Ignored);
    }

    let mut grouping = load_lunch(store, date)?;
    if grouping.is_finalized() {
        return match reaction.op {
            ReactionOp::Add => Ok(ReactionOutcome::Placed(late_signup(store, date, &reaction.person, config)?)),
            ReactionOp::Remove => Err(LunchError::LunchAlreadyOrganized(lunch_key(date))),
        };
    }

    match reaction.op {
        ReactionOp::Add => {
            if grouping.contains(&reaction.person) {
                return Ok(ReactionOutcome::Ignored);
            }
            let person = store.ensure_person(&reaction.person)?;
            grouping.push(PENDING_GROUP, person.attend());
            store.save_grouping(date, &grouping)?;
            info!(pending = grouping.pending_pool().len(), "signed up");
            Ok(ReactionOutcome::Joined)
        }
        ReactionOp::Remove => {
            if grouping.remove_person(&reaction.person).is_none() {
                return Ok(ReactionOutcome::Ignored);
            }
            store.save_grouping(date, &grouping)?;
            info!(pending = grouping.pending_pool().len(), "signed off");
            Ok(ReactionOutcome::Left)
        }
    }
}

/// Record past groups held on `date` without moving newer meetings back.
///
/// Every id must already be known. The floor is recomputed first so history
/// older than the current floor still lands.
///
/// # Errors
///
/// [`LunchError::InvalidInput`] naming the unknown ids, in which case nothing
/// is written. Otherwise propagates store failures.
#[instrument(skip(store, groups), fields(date = %lunch_key(date), groups = groups.len()))]
pub fn insert_history<S: LunchStore>(store: &mut S, date: DateTime<Utc>, groups: &[Vec<PersonId>]) -> Result<()> {
    let known: BTreeSet<PersonId> = store.known_people()?.into_iter().map(|p| p.id).collect();
    let unknown: BTreeSet<&str> = groups
        .iter()
        .flatten()
        .filter(|id| !known.contains(*id))
        .map(PersonId::as_str)
        .collect();
    if !unknown.is_empty() {
        let names: Vec<&str> = unknown.into_iter().collect();
        warn!(unknown = names.len(), "history names unknown people");
        return Err(LunchError::InvalidInput(format!(
            "unknown people {}, nothing recorded",
            names.join(", ")
        )));
    }

    let mut ledger = store.load_ledger(date)?;
    ledger.update_floor_date(date);
    for group in groups {
        ledger.update_group_max(group, date);
    }
    store.save_ledger(&ledger)?;
    info!(pairs = ledger.len(), "history inserted");
    Ok(())
}

/// Fold the most recent organized lunch into the ledger when it is not
/// there yet. Returns whether the ledger changed.
///
/// # Errors
///
/// Propagates store failures.
#[instrument(skip(store))]
pub fn refresh_ledger<S: LunchStore>(store: &mut S) -> Result<bool> {
    let Some(latest) = store.latest_lunch_date()? else {
        debug!("no lunches yet");
        return Ok(false);
    };
    let Some(grouping) = store.load_grouping(latest)? else {
        return Ok(false);
    };
    if !grouping.is_finalized() {
        debug!(date = %lunch_key(latest), "latest lunch is not organized");
        return Ok(false);
    }

    let mut ledger = store.load_ledger(latest)?;
    if ledger.latest_date() == Some(latest) {
        return Ok(false);
    }
    ledger.update_assignment(&grouping, latest);
    store.save_ledger(&ledger)?;
    info!(date = %lunch_key(latest), pairs = ledger.len(), "ledger refreshed");
    Ok(true)
}

/// What [`fixup`] did to a lunch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FixupOutcome {
    /// The lunch was still pending; its pool now holds exactly the list.
    Rebuilt { pending: usize },
    /// The lunch was organized; missing people were placed one by one.
    /// `stale` lists members that are no longer on the list. They stay.
    Placed { placed: Vec<PersonId>, stale: Vec<PersonId> },
}

/// Bring the lunch of `date` in line with `people`, the full current
/// sign-up list, after reactions were lost.
///
/// A pending lunch gets its pool replaced by the list. An organized lunch
/// keeps its groups and every listed person not yet in it becomes a
/// [`late_signup`].
///
/// # Errors
///
/// [`LunchError::LunchNotFound`] without a lunch. Otherwise propagates
/// solver and store failures.
#[instrument(skip(store, people, config), fields(date = %lunch_key(date), people = people.len()))]
pub fn fixup<S: LunchStore>(
    store: &mut S,
    date: DateTime<Utc>,
    people: &[PersonId],
    config: &LunchConfig,
) -> Result<FixupOutcome> {
    let grouping = load_lunch(store, date)?;
    let mut seen = BTreeSet::new();

    if !grouping.is_finalized() {
        let mut rebuilt = Grouping::pending();
        for id in people {
            if seen.insert(id) {
                rebuilt.push(PENDING_GROUP, store.ensure_person(id)?.attend());
            }
        }
        store.save_grouping(date, &rebuilt)?;
        let pending = rebuilt.pending_pool().len();
        info!(pending, "pending pool rebuilt");
        return Ok(FixupOutcome::Rebuilt { pending });
    }

    let mut remaining = grouping.people();
    let mut placed = Vec::new();
    for id in people {
        if !seen.insert(id) || remaining.remove(id) {
            continue;
        }
        late_signup(store, date, id, config)?;
        placed.push(id.clone());
    }
    let stale: Vec<PersonId> = remaining.into_iter().collect();
    if !stale.is_empty() {
        warn!(stale = stale.len(), "organized lunch has members who are no longer signed up");
    }
    info!(placed = placed.len(), "organized lunch fixed up");
    Ok(FixupOutcome::Placed { placed, stale })
}

/// Date of the lunch still taking sign-ups at `now`, if any.
///
/// # Errors
///
/// Propagates store failures.
pub fn open_lunch<S: LunchStore>(store: &S, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    Ok(store
        .latest_lunch_date()?
        .filter(|date| now < deadline_after(*date)))
}
