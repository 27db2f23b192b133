//! Chat-facing text for announcements and organized groups.
//!
//! Emoji are drawn from the lunch date's RNG stream, so rendering the same
//! grouping twice gives the same message.

use chrono::{DateTime, Utc};
use lunchbot_core::dates::lunch_key;
use lunchbot_core::{Attendee, Grouping, LunchRng};

const PAYER_EMOJI: &[&str] = &[
    ":money:",
    ":money_with_wings:",
    ":dollar_bills:",
    ":dollars:",
    ":yen_banknotes:",
    ":euro_banknotes:",
    ":pound_notes:",
    ":coin:",
    ":credit_card:",
    ":gem:",
];

const LEADER_EMOJI: &[&str] = &[
    ":pilot:",
    ":woman_pilot:",
    ":salute:",
    ":point:",
    ":brain:",
    ":raising_hand:",
    ":man_raising_hand:",
    ":woman_raising_hand:",
    ":crown:",
    ":person_with_crown:",
    ":medal:",
    ":horn:",
    ":note:",
];

/// Topic name shared by the announcement and the groups message.
pub fn topic(date: DateTime<Utc>) -> String {
    format!("{} Groups", date.format("%d/%m/%Y"))
}

/// Sign-up call for the lunch on `date`.
pub fn announcement(date: DateTime<Utc>, emoji: &str) -> String {
    format!(
        "Hey everyone :wave:\n\n\
         I am organizing the small group lunch for **{}** :yum:\n\
         React with :{emoji}: to sign up. Remove the reaction to sign off.\n\n\
         Groups are created before the lunch. Lunch key: {}",
        date.format("%A, %-d %B"),
        lunch_key(date)
    )
}

fn group_line(id: u32, members: &[Attendee], payer_emoji: &str, leader_emoji: &str) -> String {
    let names: Vec<&str> = members.iter().map(|a| a.id.as_str()).collect();
    let leader = members
        .iter()
        .find(|a| a.is_leader)
        .map_or("nobody", |a| a.id.as_str());
    let payer = members
        .iter()
        .find(|a| a.has_payer)
        .map_or("nobody", |a| a.id.as_str());
    format!(
        "- Group {id}: {} (Leader: {leader} {leader_emoji}, Payer: {payer} {payer_emoji})",
        names.join(", ")
    )
}

/// Organized-groups message for `date`, groups in ascending id order.
pub fn groups_message(date: DateTime<Utc>, grouping: &Grouping) -> String {
    let mut rng = LunchRng::for_date(date);
    let mut payers = PAYER_EMOJI.to_vec();
    let mut leaders = LEADER_EMOJI.to_vec();
    rng.shuffle(&mut payers);
    rng.shuffle(&mut leaders);
    let pairs: Vec<(&str, &str)> = payers.into_iter().zip(leaders).collect();

    let mut lines = vec![format!(":alert: Groups for {} have been organized! :point_down:", topic(date))];
    for (id, members) in grouping.groups() {
        let slot = (id as usize).saturating_sub(1) % pairs.len();
        let (payer_emoji, leader_emoji) = pairs[slot];
        lines.push(group_line(id, members, payer_emoji, leader_emoji));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use lunchbot_core::{Person, PersonId};

    fn wednesday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 17, 0, 0, 0).single().expect("valid date")
    }

    fn organized() -> Grouping {
        let mut grouping = Grouping::new();
        let mut lead = Person::new("ann", false).attend();
        lead.is_leader = true;
        grouping.push(1, lead);
        grouping.push(1, Person::new("bob", true).attend());
        let mut second = Person::new("cat", true).attend();
        second.is_leader = true;
        grouping.push(2, second);
        grouping
    }

    #[test]
    fn announcement_names_the_day_and_emoji() {
        let text = announcement(wednesday(), "hungry");
        assert!(text.contains("Wednesday, 17 April"));
        assert!(text.contains(":hungry:"));
        assert!(text.contains("2024-04-17"));
    }

    #[test]
    fn groups_render_leaders_and_payers() {
        let text = groups_message(wednesday(), &organized());
        assert!(text.contains("17/04/2024 Groups"));
        assert!(text.contains("- Group 1: ann, bob (Leader: ann "));
        assert!(text.contains("Payer: bob "));
        assert!(text.contains("- Group 2: cat (Leader: cat "));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn rendering_is_stable_per_date() {
        let grouping = organized();
        assert_eq!(
            groups_message(wednesday(), &grouping),
            groups_message(wednesday(), &grouping)
        );
    }

    #[test]
    fn missing_payer_is_spelled_out() {
        let mut grouping = Grouping::new();
        grouping.push(1, Person::new(PersonId::new("dan"), false).attend());
        let text = groups_message(wednesday(), &grouping);
        assert!(text.contains("Leader: nobody"));
        assert!(text.contains("Payer: nobody"));
    }
}
