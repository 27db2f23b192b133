//! Control messages and the console command grammar.
//!
//! ```text
//! !setpayer <id> <true|false>
//! !announce
//! !organize
//! !history <dd.mm.yyyy> <json list of groups>
//! !fixup <id>...    the full sign-up list of the open lunch
//! +<id> [emoji]      sign up (reaction added)
//! -<id> [emoji]      sign off (reaction removed)
//! ```

use chrono::{DateTime, Utc};
use lunchbot_core::PersonId;
use lunchbot_core::dates::parse_lunch_date;
use lunchbot_core::workflow::{Reaction, ReactionOp};
use serde::Serialize;

/// Everything the control loop reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    SetPayer { person: PersonId, has_payer: bool },
    Announce,
    Organize,
    HistoryInsert {
        date: DateTime<Utc>,
        groups: Vec<Vec<PersonId>>,
    },
    /// Repair the open lunch from everyone currently signed up.
    Fixup { people: Vec<PersonId> },
    Reaction(Reaction),
    /// The open lunch stopped taking sign-ups.
    LunchExpired,
    Bad { error: String },
    /// Input closed.
    Shutdown,
}

impl ControlMessage {
    fn bad(error: impl Into<String>) -> Self {
        Self::Bad { error: error.into() }
    }

    /// Reactions go to the reaction producer, everything else to the command
    /// producer.
    pub const fn is_reaction(&self) -> bool {
        matches!(self, Self::Reaction(_))
    }
}

/// Decode one line of console input.
///
/// Reactions without an explicit emoji use `signup_emoji`.
pub fn parse(line: &str, signup_emoji: &str) -> ControlMessage {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix('+') {
        return parse_reaction(rest, ReactionOp::Add, signup_emoji);
    }
    if let Some(rest) = line.strip_prefix('-') {
        return parse_reaction(rest, ReactionOp::Remove, signup_emoji);
    }

    let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    match command {
        "!setpayer" => parse_set_payer(rest),
        "!history" => parse_history(rest),
        "!fixup" => parse_fixup(rest),
        "!announce" if rest.is_empty() => ControlMessage::Announce,
        "!organize" if rest.is_empty() => ControlMessage::Organize,
        _ => ControlMessage::bad("did not understand command"),
    }
}

fn parse_reaction(rest: &str, op: ReactionOp, signup_emoji: &str) -> ControlMessage {
    let mut parts = rest.split_whitespace();
    let Some(person) = parts.next() else {
        return ControlMessage::bad("reaction needs a person");
    };
    let emoji = parts.next().map_or(signup_emoji, |e| e.trim_matches(':'));
    if parts.next().is_some() {
        return ControlMessage::bad("reaction takes a person and at most one emoji");
    }
    ControlMessage::Reaction(Reaction {
        person: PersonId::new(person),
        emoji: emoji.to_string(),
        op,
    })
}

fn parse_set_payer(rest: &str) -> ControlMessage {
    let parts: Vec<&str> = rest.split_whitespace().collect();
    match parts.as_slice() {
        [person, flag @ ("true" | "false")] => ControlMessage::SetPayer {
            person: PersonId::new(*person),
            has_payer: *flag == "true",
        },
        _ => ControlMessage::bad("usage: !setpayer <id> <true|false>"),
    }
}

fn parse_history(rest: &str) -> ControlMessage {
    let Some((day, groups)) = rest.split_once(char::is_whitespace) else {
        return ControlMessage::bad("usage: !history <dd.mm.yyyy> <json groups>");
    };
    let date = match parse_lunch_date(day) {
        Ok(date) => date,
        Err(err) => return ControlMessage::bad(err.to_string()),
    };
    match serde_json::from_str::<Vec<Vec<PersonId>>>(groups.trim()) {
        Ok(groups) => ControlMessage::HistoryInsert { date, groups },
        Err(_) => ControlMessage::bad("failed to parse JSON"),
    }
}

fn parse_fixup(rest: &str) -> ControlMessage {
    let people: Vec<PersonId> = rest.split_whitespace().map(PersonId::new).collect();
    if people.is_empty() {
        return ControlMessage::bad("usage: !fixup <id>...");
    }
    ControlMessage::Fixup { people }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_set_payer() {
        assert_eq!(
            parse("!setpayer ann@example.com true", "hungry"),
            ControlMessage::SetPayer {
                person: PersonId::new("ann@example.com"),
                has_payer: true,
            }
        );
        assert_eq!(
            parse("!setpayer bob false", "hungry"),
            ControlMessage::SetPayer {
                person: PersonId::new("bob"),
                has_payer: false,
            }
        );
        assert!(matches!(parse("!setpayer bob maybe", "hungry"), ControlMessage::Bad { .. }));
    }

    #[test]
    fn parses_plain_commands() {
        assert_eq!(parse("!announce", "hungry"), ControlMessage::Announce);
        assert_eq!(parse("  !organize \n", "hungry"), ControlMessage::Organize);
        assert!(matches!(parse("!organize now", "hungry"), ControlMessage::Bad { .. }));
        assert!(matches!(parse("hello", "hungry"), ControlMessage::Bad { .. }));
        assert!(matches!(parse("", "hungry"), ControlMessage::Bad { .. }));
    }

    #[test]
    fn parses_history() {
        let msg = parse(r#"!history 3.4.2024 [["ann","bob"],["cat"]]"#, "hungry");
        let expected_date = Utc.with_ymd_and_hms(2024, 4, 3, 0, 0, 0).single().expect("valid date");
        assert_eq!(
            msg,
            ControlMessage::HistoryInsert {
                date: expected_date,
                groups: vec![
                    vec![PersonId::new("ann"), PersonId::new("bob")],
                    vec![PersonId::new("cat")],
                ],
            }
        );
    }

    #[test]
    fn history_with_broken_json_is_bad() {
        assert_eq!(
            parse("!history 03.04.2024 [[\"ann\"", "hungry"),
            ControlMessage::Bad {
                error: "failed to parse JSON".to_string()
            }
        );
        assert!(matches!(parse("!history 99.99.2024 []", "hungry"), ControlMessage::Bad { .. }));
    }

    #[test]
    fn parses_fixup_list() {
        assert_eq!(
            parse("!fixup ann  bob\tcat", "hungry"),
            ControlMessage::Fixup {
                people: vec![PersonId::new("ann"), PersonId::new("bob"), PersonId::new("cat")],
            }
        );
        assert!(!parse("!fixup ann", "hungry").is_reaction());
        assert_eq!(
            parse("!fixup", "hungry"),
            ControlMessage::Bad {
                error: "usage: !fixup <id>...".to_string()
            }
        );
    }

    #[test]
    fn parses_reactions() {
        let msg = parse("+ann", "hungry");
        assert!(msg.is_reaction());
        assert_eq!(
            msg,
            ControlMessage::Reaction(Reaction {
                person: PersonId::new("ann"),
                emoji: "hungry".to_string(),
                op: ReactionOp::Add,
            })
        );
        assert_eq!(
            parse("-bob :tada:", "hungry"),
            ControlMessage::Reaction(Reaction {
                person: PersonId::new("bob"),
                emoji: "tada".to_string(),
                op: ReactionOp::Remove,
            })
        );
        assert!(matches!(parse("+", "hungry"), ControlMessage::Bad { .. }));
    }

    #[test]
    fn serializes_with_type_tag() {
        let value = serde_json::to_value(ControlMessage::Announce).expect("json");
        assert_eq!(value["type"], "announce");
    }
}
