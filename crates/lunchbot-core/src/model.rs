//! Participants, attendees, and groupings.
//!
//! A [`Grouping`] maps group ids to attendee lists. Group id
//! [`PENDING_GROUP`] (`0`) is reserved for the single pool of people who
//! signed up before the lunch was organized; a grouping is *finalized* once
//! that pool is gone and at least one real group exists.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Group id of the not-yet-organized sign-up pool.
pub const PENDING_GROUP: GroupId = 0;

/// Small positive group number inside one grouping.
pub type GroupId = u32;

/// Opaque, stable participant identifier (usually an email address).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(String);

impl PersonId {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PersonId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for PersonId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl AsRef<str> for PersonId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A known participant and their persistent payer flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    #[serde(default)]
    pub has_payer: bool,
}

impl Person {
    #[must_use]
    pub fn new(id: impl Into<PersonId>, has_payer: bool) -> Self {
        Self {
            id: id.into(),
            has_payer,
        }
    }

    /// Participation record for one grouping, not yet leading a group.
    #[must_use]
    pub fn attend(&self) -> Attendee {
        Attendee {
            id: self.id.clone(),
            has_payer: self.has_payer,
            is_leader: false,
        }
    }
}

/// One person's participation in a specific grouping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    pub id: PersonId,
    #[serde(default)]
    pub has_payer: bool,
    #[serde(default)]
    pub is_leader: bool,
}

impl Attendee {
    #[must_use]
    pub fn person(&self) -> Person {
        Person {
            id: self.id.clone(),
            has_payer: self.has_payer,
        }
    }
}

/// Assignment of attendees to numbered groups for one lunch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grouping {
    groups: BTreeMap<GroupId, Vec<Attendee>>,
}

impl Grouping {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A grouping holding only the pending pool, empty.
    #[must_use]
    pub fn pending() -> Self {
        let mut grouping = Self::new();
        grouping.groups.insert(PENDING_GROUP, Vec::new());
        grouping
    }

    /// `true` iff the pending pool is absent and at least one group exists.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        !self.groups.is_empty() && !self.groups.contains_key(&PENDING_GROUP)
    }

    /// Members of the pending pool (empty when there is none).
    #[must_use]
    pub fn pending_pool(&self) -> &[Attendee] {
        self.get(PENDING_GROUP)
    }

    /// Members of one group (empty when the id is unknown).
    #[must_use]
    pub fn get(&self, id: GroupId) -> &[Attendee] {
        self.groups.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Ensure a group exists, possibly empty.
    pub fn open_group(&mut self, id: GroupId) {
        self.groups.entry(id).or_default();
    }

    /// Append an attendee to a group, creating the group when needed.
    pub fn push(&mut self, id: GroupId, attendee: Attendee) {
        self.groups.entry(id).or_default().push(attendee);
    }

    /// Remove a person from whichever group holds them.
    ///
    /// Returns the group they were removed from.
    pub fn remove_person(&mut self, person: &PersonId) -> Option<GroupId> {
        for (id, members) in &mut self.groups {
            if let Some(pos) = members.iter().position(|a| &a.id == person) {
                members.remove(pos);
                return Some(*id);
            }
        }
        None
    }

    #[must_use]
    pub fn contains(&self, person: &PersonId) -> bool {
        self.attendees().any(|a| &a.id == person)
    }

    /// Groups in ascending id order.
    pub fn groups(&self) -> impl Iterator<Item = (GroupId, &[Attendee])> {
        self.groups.iter().map(|(id, members)| (*id, members.as_slice()))
    }

    pub(crate) fn groups_mut(&mut self) -> impl Iterator<Item = &mut Vec<Attendee>> {
        self.groups.values_mut()
    }

    /// Every attendee across all groups.
    pub fn attendees(&self) -> impl Iterator<Item = &Attendee> {
        self.groups.values().flatten()
    }

    /// Set of all identities in the grouping.
    #[must_use]
    pub fn people(&self) -> BTreeSet<PersonId> {
        self.attendees().map(|a| a.id.clone()).collect()
    }

    /// Group sizes in ascending group-id order.
    #[must_use]
    pub fn sizes(&self) -> Vec<usize> {
        self.groups.values().map(Vec::len).collect()
    }

    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl FromIterator<(GroupId, Vec<Attendee>)> for Grouping {
    fn from_iter<T: IntoIterator<Item = (GroupId, Vec<Attendee>)>>(iter: T) -> Self {
        Self {
            groups: iter.into_iter().collect(),
        }
    }
}

/// A scored grouping produced by the solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub assignment: Grouping,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attendee(id: &str) -> Attendee {
        Person::new(id, false).attend()
    }

    #[test]
    fn pending_only_is_not_finalized() {
        let mut grouping = Grouping::pending();
        grouping.push(PENDING_GROUP, attendee("a"));
        assert!(!grouping.is_finalized());
    }

    #[test]
    fn real_groups_are_finalized() {
        let grouping: Grouping = [(1, vec![attendee("a")]), (2, vec![attendee("b")])]
            .into_iter()
            .collect();
        assert!(grouping.is_finalized());
    }

    #[test]
    fn pending_pool_next_to_groups_is_not_finalized() {
        let grouping: Grouping = [(0, vec![attendee("a")]), (1, vec![attendee("b")])]
            .into_iter()
            .collect();
        assert!(!grouping.is_finalized());
    }

    #[test]
    fn empty_grouping_is_not_finalized() {
        assert!(!Grouping::new().is_finalized());
    }

    #[test]
    fn remove_person_reports_group() {
        let mut grouping: Grouping = [(1, vec![attendee("a")]), (2, vec![attendee("b")])]
            .into_iter()
            .collect();
        assert_eq!(grouping.remove_person(&PersonId::from("b")), Some(2));
        assert_eq!(grouping.remove_person(&PersonId::from("b")), None);
        assert_eq!(grouping.sizes(), vec![1, 0]);
    }

    #[test]
    fn grouping_serializes_as_numbered_map() {
        let grouping: Grouping = [(1, vec![attendee("a")])].into_iter().collect();
        let json = serde_json::to_value(&grouping).expect("serialize");
        assert_eq!(json["1"][0]["id"], "a");
        let back: Grouping = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, grouping);
    }
}
