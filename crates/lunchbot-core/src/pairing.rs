//! Pairwise "most recent lunch" ledger.
//!
//! The ledger remembers, for every unordered pair of participants, the last
//! date they shared a group. Pairs are stored once under their canonical
//! ordering (lexicographically smaller id first); every access normalizes
//! the pair before touching the table. Pairs that never met fall back to the
//! ledger's floor date, which trails the oldest stored date by three weeks so
//! strangers always look "further apart" than anyone with history.
//!
//! # Merge
//!
//! [`PairingLedger::merge`] is a per-pair max: for every pair present in
//! either ledger the later date wins, and the merged floor is the later of
//! the two floors. A pair missing from one side does not contribute the floor
//! date. The operation is commutative, associative and idempotent.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{LunchError, Result};
use crate::model::{Attendee, Grouping, PersonId};

/// Distance, in weeks, between the floor date and the oldest known meeting.
pub const FLOOR_MARGIN_WEEKS: i64 = 3;

/// Whole weeks from `earlier` to `later`, truncated toward zero.
#[must_use]
pub fn weeks_between(later: DateTime<Utc>, earlier: DateTime<Utc>) -> i64 {
    (later - earlier).num_weeks()
}

fn floor_margin() -> Duration {
    Duration::weeks(FLOOR_MARGIN_WEEKS)
}

/// One historical lunch: the date and the groups that sat together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LunchGroups {
    pub date: DateTime<Utc>,
    pub groups: Vec<Vec<PersonId>>,
}

/// Plain nested representation used for persistence.
///
/// `pairs[a][b]` holds the RFC 3339 date `a` and `b` last met, with `a < b`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedLedger {
    #[serde(default)]
    pub pairs: BTreeMap<String, BTreeMap<String, String>>,
    pub floor_date: String,
}

/// Symmetric table of the most recent date each pair of people met.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SerializedLedger", into = "SerializedLedger")]
pub struct PairingLedger {
    table: BTreeMap<PersonId, BTreeMap<PersonId, DateTime<Utc>>>,
    floor_date: DateTime<Utc>,
}

impl PairingLedger {
    /// Empty ledger with the given floor date.
    #[must_use]
    pub fn new(floor_date: DateTime<Utc>) -> Self {
        Self {
            table: BTreeMap::new(),
            floor_date,
        }
    }

    /// Build a ledger by replaying historical lunches oldest first.
    ///
    /// The floor date is `date` minus three weeks.
    #[must_use]
    pub fn from_history(mut lunches: Vec<LunchGroups>, date: DateTime<Utc>) -> Self {
        let mut ledger = Self::new(date - floor_margin());
        lunches.sort_by_key(|lunch| lunch.date);
        for lunch in &lunches {
            for group in &lunch.groups {
                ledger.update_group(group, lunch.date);
            }
        }
        ledger
    }

    #[must_use]
    pub const fn floor_date(&self) -> DateTime<Utc> {
        self.floor_date
    }

    /// Number of stored pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.values().all(BTreeMap::is_empty)
    }

    /// Stored pairs in canonical order.
    pub fn pairs(&self) -> impl Iterator<Item = (&PersonId, &PersonId, DateTime<Utc>)> {
        self.table
            .iter()
            .flat_map(|(a, row)| row.iter().map(move |(b, date)| (a, b, *date)))
    }

    fn canonical<'a>(a: &'a PersonId, b: &'a PersonId) -> (&'a PersonId, &'a PersonId) {
        if a <= b { (a, b) } else { (b, a) }
    }

    fn lookup(&self, a: &PersonId, b: &PersonId) -> Option<DateTime<Utc>> {
        let (first, second) = Self::canonical(a, b);
        self.table.get(first)?.get(second).copied()
    }

    fn check_distinct(a: &PersonId, b: &PersonId) -> Result<()> {
        if a == b {
            return Err(LunchError::SamePerson(a.clone()));
        }
        Ok(())
    }

    /// Stored date for the pair, if any.
    ///
    /// # Errors
    ///
    /// Returns [`LunchError::SamePerson`] when `a == b`.
    pub fn try_get(&self, a: &PersonId, b: &PersonId) -> Result<Option<DateTime<Utc>>> {
        Self::check_distinct(a, b)?;
        Ok(self.lookup(a, b))
    }

    /// Date the pair last met, or the floor date when they never did.
    ///
    /// # Errors
    ///
    /// Returns [`LunchError::SamePerson`] when `a == b`.
    pub fn get(&self, a: &PersonId, b: &PersonId) -> Result<DateTime<Utc>> {
        Ok(self.try_get(a, b)?.unwrap_or(self.floor_date))
    }

    /// Unconditionally record that the pair met on `date`.
    ///
    /// # Errors
    ///
    /// Returns [`LunchError::SamePerson`] when `a == b`.
    pub fn set(&mut self, a: &PersonId, b: &PersonId, date: DateTime<Utc>) -> Result<()> {
        Self::check_distinct(a, b)?;
        let (first, second) = Self::canonical(a, b);
        self.table
            .entry(first.clone())
            .or_default()
            .insert(second.clone(), date);
        Ok(())
    }

    /// Record `date` only if it is later than what [`get`](Self::get) returns.
    ///
    /// # Errors
    ///
    /// Returns [`LunchError::SamePerson`] when `a == b`.
    pub fn set_max(&mut self, a: &PersonId, b: &PersonId, date: DateTime<Utc>) -> Result<()> {
        if self.get(a, b)? < date {
            self.set(a, b, date)?;
        }
        Ok(())
    }

    fn distinct_pairs(members: &[PersonId]) -> impl Iterator<Item = (&PersonId, &PersonId)> {
        members.iter().enumerate().flat_map(move |(i, a)| {
            members[i + 1..]
                .iter()
                .filter(move |b| *b != a)
                .map(move |b| (a, b))
        })
    }

    /// Record that every pair within `members` met on `date`.
    pub fn update_group(&mut self, members: &[PersonId], date: DateTime<Utc>) {
        for (a, b) in Self::distinct_pairs(members) {
            let (first, second) = Self::canonical(a, b);
            self.table
                .entry(first.clone())
                .or_default()
                .insert(second.clone(), date);
        }
    }

    /// Like [`update_group`](Self::update_group) but never moves a pair's
    /// date backwards.
    pub fn update_group_max(&mut self, members: &[PersonId], date: DateTime<Utc>) {
        for (a, b) in Self::distinct_pairs(members) {
            let current = self.lookup(a, b).unwrap_or(self.floor_date);
            if current < date {
                let (first, second) = Self::canonical(a, b);
                self.table
                    .entry(first.clone())
                    .or_default()
                    .insert(second.clone(), date);
            }
        }
    }

    /// Apply a finished grouping held on `date`, then advance the floor.
    pub fn update_assignment(&mut self, grouping: &Grouping, date: DateTime<Utc>) {
        for (_, members) in grouping.groups() {
            let ids: Vec<PersonId> = members.iter().map(|a| a.id.clone()).collect();
            self.update_group(&ids, date);
        }
        self.update_floor_date(date);
    }

    /// Recompute the floor as `min(stored dates, date) - 3 weeks`.
    pub fn update_floor_date(&mut self, date: DateTime<Utc>) {
        let oldest = self
            .pairs()
            .map(|(_, _, d)| d)
            .fold(date, std::cmp::min);
        self.floor_date = oldest - floor_margin();
        debug!(floor_date = %self.floor_date, "ledger floor advanced");
    }

    /// Mean weeks since `person` last met each *other* member of `group`.
    ///
    /// A group with no other members has distance `0`.
    #[must_use]
    pub fn mean_distance(&self, as_of: DateTime<Utc>, person: &PersonId, group: &[Attendee]) -> f64 {
        let (count, total) = group
            .iter()
            .filter(|member| &member.id != person)
            .fold((0_usize, 0_i64), |(count, total), member| {
                let met = self.lookup(person, &member.id).unwrap_or(self.floor_date);
                (count + 1, total + weeks_between(as_of, met))
            });
        if count == 0 {
            return 0.0;
        }
        total as f64 / count as f64
    }

    fn group_distance(&self, as_of: DateTime<Utc>, group: &[Attendee]) -> f64 {
        group
            .iter()
            .map(|member| self.mean_distance(as_of, &member.id, group))
            .sum()
    }

    /// Sum over groups of each member's mean distance to the rest of the group.
    #[must_use]
    pub fn score(&self, as_of: DateTime<Utc>, grouping: &Grouping) -> f64 {
        grouping
            .groups()
            .map(|(_, members)| self.group_distance(as_of, members))
            .sum()
    }

    /// Every identity that appears in at least one stored pair.
    #[must_use]
    pub fn people(&self) -> BTreeSet<PersonId> {
        self.pairs()
            .flat_map(|(a, b, _)| [a.clone(), b.clone()])
            .collect()
    }

    /// Latest stored meeting date, `None` for an empty ledger.
    #[must_use]
    pub fn latest_date(&self) -> Option<DateTime<Utc>> {
        self.pairs().map(|(_, _, d)| d).max()
    }

    /// Per-pair union keeping the later date; the later floor wins.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        merged.floor_date = self.floor_date.max(other.floor_date);
        for (a, b, date) in other.pairs() {
            let slot = merged
                .table
                .entry(a.clone())
                .or_default()
                .entry(b.clone())
                .or_insert(date);
            if *slot < date {
                *slot = date;
            }
        }
        merged
    }

    /// Nested string representation for persistence.
    #[must_use]
    pub fn serialize(&self) -> SerializedLedger {
        let pairs = self
            .table
            .iter()
            .map(|(a, row)| {
                let row = row
                    .iter()
                    .map(|(b, date)| (b.to_string(), format_date(*date)))
                    .collect();
                (a.to_string(), row)
            })
            .collect();
        SerializedLedger {
            pairs,
            floor_date: format_date(self.floor_date),
        }
    }

    /// Parse the nested representation.
    ///
    /// Malformed pair entries are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`LunchError::InvalidDate`] when the floor date is unparsable.
    pub fn deserialize(serialized: &SerializedLedger) -> Result<Self> {
        let Some(floor_date) = parse_date(&serialized.floor_date) else {
            error!(floor_date = %serialized.floor_date, "failed to parse ledger floor date");
            return Err(LunchError::InvalidDate {
                raw: serialized.floor_date.clone(),
            });
        };

        let mut ledger = Self::new(floor_date);
        for (a, row) in &serialized.pairs {
            for (b, raw) in row {
                let Some(date) = parse_date(raw) else {
                    error!(person_a = %a, person_b = %b, raw = %raw, "failed to parse pairing date");
                    continue;
                };
                let (a, b) = (PersonId::from(a.as_str()), PersonId::from(b.as_str()));
                if let Err(err) = ledger.set(&a, &b, date) {
                    error!(error = %err, "skipping malformed pairing");
                }
            }
        }
        Ok(ledger)
    }
}

impl From<PairingLedger> for SerializedLedger {
    fn from(ledger: PairingLedger) -> Self {
        ledger.serialize()
    }
}

impl TryFrom<SerializedLedger> for PairingLedger {
    type Error = LunchError;

    fn try_from(serialized: SerializedLedger) -> Result<Self> {
        Self::deserialize(&serialized)
    }
}

fn format_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse an RFC 3339 timestamp into UTC.
#[must_use]
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Person;
    use chrono::TimeZone;

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).single().expect("valid date")
    }

    fn p(id: &str) -> PersonId {
        PersonId::from(id)
    }

    fn attendees(ids: &[&str]) -> Vec<Attendee> {
        ids.iter().map(|id| Person::new(*id, false).attend()).collect()
    }

    fn two_lunches(date: DateTime<Utc>) -> PairingLedger {
        PairingLedger::from_history(
            vec![
                LunchGroups {
                    date: day(2024, 4, 8),
                    groups: vec![vec![p("person0"), p("person1")], vec![p("person2"), p("person3")]],
                },
                LunchGroups {
                    date: day(2024, 4, 15),
                    groups: vec![vec![p("person0"), p("person2")], vec![p("person1"), p("person3")]],
                },
            ],
            date,
        )
    }

    #[test]
    fn history_replays_in_date_order() {
        let later = day(2024, 4, 15);
        let earlier = day(2024, 4, 8);
        let ledger = PairingLedger::from_history(
            vec![
                LunchGroups {
                    date: later,
                    groups: vec![vec![p("person0"), p("person1")]],
                },
                LunchGroups {
                    date: earlier,
                    groups: vec![vec![p("person0"), p("person1")], vec![p("person2"), p("person3")]],
                },
            ],
            earlier,
        );
        assert_eq!(ledger.get(&p("person0"), &p("person1")).expect("distinct"), later);
        assert_eq!(ledger.get(&p("person2"), &p("person3")).expect("distinct"), earlier);
        assert_eq!(ledger.floor_date(), day(2024, 3, 18));
    }

    #[test]
    fn get_rejects_same_person() {
        let ledger = PairingLedger::new(day(2024, 1, 1));
        assert!(matches!(
            ledger.get(&p("person0"), &p("person0")),
            Err(LunchError::SamePerson(_))
        ));
    }

    #[test]
    fn get_is_symmetric() {
        let date = day(2024, 4, 15);
        let mut ledger = PairingLedger::new(date);
        ledger.set(&p("person1"), &p("person0"), date).expect("distinct");
        ledger.update_floor_date(date);
        assert_eq!(ledger.get(&p("person0"), &p("person1")).expect("distinct"), date);
        assert_eq!(ledger.get(&p("person1"), &p("person0")).expect("distinct"), date);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn unknown_pair_falls_back_to_floor() {
        let date = day(2024, 4, 15);
        let mut ledger = PairingLedger::new(date);
        ledger.set(&p("person0"), &p("person1"), date).expect("distinct");
        ledger.update_floor_date(date);
        assert_eq!(
            ledger.get(&p("person0"), &p("person2")).expect("distinct"),
            day(2024, 3, 25)
        );
    }

    #[test]
    fn set_max_never_moves_backwards() {
        let mut ledger = PairingLedger::new(day(2024, 1, 1));
        ledger.set(&p("a"), &p("b"), day(2024, 4, 15)).expect("distinct");
        ledger.set_max(&p("b"), &p("a"), day(2024, 4, 1)).expect("distinct");
        assert_eq!(ledger.get(&p("a"), &p("b")).expect("distinct"), day(2024, 4, 15));
        ledger.set_max(&p("b"), &p("a"), day(2024, 4, 22)).expect("distinct");
        assert_eq!(ledger.get(&p("a"), &p("b")).expect("distinct"), day(2024, 4, 22));
    }

    #[test]
    fn update_group_max_keeps_newer_history() {
        let mut ledger = two_lunches(day(2024, 4, 15));
        ledger.update_group_max(&[p("person0"), p("person1"), p("person3")], day(2024, 4, 10));
        // person0/person1 met on the 8th; the correction is newer
        assert_eq!(ledger.get(&p("person0"), &p("person1")).expect("distinct"), day(2024, 4, 10));
        // person1/person3 met on the 15th; the correction is older
        assert_eq!(ledger.get(&p("person1"), &p("person3")).expect("distinct"), day(2024, 4, 15));
        // person0/person3 never met; the correction fills the gap
        assert_eq!(ledger.get(&p("person0"), &p("person3")).expect("distinct"), day(2024, 4, 10));
    }

    #[test]
    fn update_assignment_advances_floor() {
        let mut ledger = PairingLedger::new(day(2020, 1, 1));
        let grouping: Grouping = [(1, attendees(&["a", "b"])), (2, attendees(&["c", "d", "e"]))]
            .into_iter()
            .collect();
        ledger.update_assignment(&grouping, day(2024, 4, 17));
        assert_eq!(ledger.len(), 4);
        assert_eq!(ledger.floor_date(), day(2024, 3, 27));
        assert_eq!(ledger.latest_date(), Some(day(2024, 4, 17)));
    }

    #[test]
    fn mean_distance_for_known_people() {
        let as_of = day(2024, 4, 22);
        let ledger = two_lunches(as_of);
        let d = |who: &str, group: &[&str]| ledger.mean_distance(as_of, &p(who), &attendees(group));
        assert!((d("person0", &["person1", "person2"]) - 1.5).abs() < f64::EPSILON);
        assert!((d("person3", &["person1", "person2"]) - 1.5).abs() < f64::EPSILON);
        assert!((d("person0", &["person1", "person3"]) - 2.5).abs() < f64::EPSILON);
        assert!((d("person2", &["person1", "person3"]) - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn mean_distance_for_newcomer_uses_floor() {
        let as_of = day(2024, 4, 22);
        let ledger = two_lunches(as_of);
        let d = ledger.mean_distance(as_of, &p("person4"), &attendees(&["person1", "person2"]));
        assert!((d - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn mean_distance_of_lonely_member_is_zero() {
        let as_of = day(2024, 4, 22);
        let ledger = two_lunches(as_of);
        assert!(ledger.mean_distance(as_of, &p("person0"), &attendees(&["person0"])).abs() < f64::EPSILON);
        assert!(ledger.mean_distance(as_of, &p("person0"), &[]).abs() < f64::EPSILON);
    }

    #[test]
    fn score_sums_member_distances() {
        let as_of = day(2024, 4, 22);
        let ledger = two_lunches(as_of);
        let grouping: Grouping = [(1, attendees(&["person0", "person1"]))].into_iter().collect();
        // each member is two weeks from the other
        assert!((ledger.score(as_of, &grouping) - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn serialize_round_trip() {
        let ledger = two_lunches(day(2024, 4, 15));
        let json = serde_json::to_string(&ledger).expect("serialize");
        let back: PairingLedger = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, ledger);
        assert_eq!(serde_json::to_string(&back).expect("serialize"), json);
    }

    #[test]
    fn bad_floor_date_fails() {
        let serialized = SerializedLedger {
            pairs: BTreeMap::new(),
            floor_date: "ahahaha".to_string(),
        };
        assert!(matches!(
            PairingLedger::deserialize(&serialized),
            Err(LunchError::InvalidDate { .. })
        ));
    }

    #[test]
    fn bad_pair_dates_are_skipped() {
        let mut serialized = two_lunches(day(2024, 4, 15)).serialize();
        serialized
            .pairs
            .entry("person0".to_string())
            .or_default()
            .insert("person9".to_string(), "not a date".to_string());
        serialized
            .pairs
            .entry("person5".to_string())
            .or_default()
            .insert("person5".to_string(), "2024-04-15T00:00:00Z".to_string());
        let ledger = PairingLedger::deserialize(&serialized).expect("floor is valid");
        assert_eq!(ledger, two_lunches(day(2024, 4, 15)));
    }

    #[test]
    fn merge_with_empty_is_identity() {
        let floor = day(2024, 4, 1);
        let mut ledger = PairingLedger::new(floor);
        ledger.set(&p("person0"), &p("person1"), day(2024, 4, 15)).expect("distinct");
        let empty = PairingLedger::new(floor);
        assert_eq!(ledger.merge(&empty), ledger);
        assert_eq!(empty.merge(&ledger), ledger);
    }

    #[test]
    fn merge_keeps_later_dates() {
        let floor = day(2024, 4, 1);
        let d0 = day(2024, 4, 15);
        let d1 = day(2024, 4, 22);

        let mut lhs = PairingLedger::new(floor);
        lhs.set(&p("person0"), &p("person1"), d0).expect("distinct");
        lhs.set(&p("person2"), &p("person3"), d0).expect("distinct");

        let mut rhs = PairingLedger::new(floor);
        rhs.set(&p("person0"), &p("person2"), d1).expect("distinct");
        rhs.set(&p("person2"), &p("person3"), d1).expect("distinct");

        let mut expected = PairingLedger::new(floor);
        expected.set(&p("person0"), &p("person1"), d0).expect("distinct");
        expected.set(&p("person0"), &p("person2"), d1).expect("distinct");
        expected.set(&p("person2"), &p("person3"), d1).expect("distinct");

        assert_eq!(lhs.merge(&rhs), expected);
        assert_eq!(rhs.merge(&lhs), expected);
    }

    #[test]
    fn merge_takes_later_floor() {
        let lhs = PairingLedger::new(day(2024, 1, 1));
        let rhs = PairingLedger::new(day(2024, 2, 1));
        assert_eq!(lhs.merge(&rhs).floor_date(), day(2024, 2, 1));
        assert_eq!(rhs.merge(&lhs).floor_date(), day(2024, 2, 1));
    }

    #[test]
    fn people_lists_every_identity() {
        let ledger = two_lunches(day(2024, 4, 15));
        let people: Vec<String> = ledger.people().iter().map(ToString::to_string).collect();
        assert_eq!(people, ["person0", "person1", "person2", "person3"]);
        assert_eq!(PairingLedger::new(day(2024, 1, 1)).latest_date(), None);
    }
}
