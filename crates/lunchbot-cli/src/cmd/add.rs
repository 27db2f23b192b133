use std::path::Path;

use anyhow::Result;
use clap::Args;
use lunchbot_core::PersonId;
use lunchbot_core::config::LunchConfig;
use lunchbot_core::dates::lunch_key;
use lunchbot_core::workflow::{Reaction, ReactionOp, ReactionOutcome, apply_reaction};
use serde::Serialize;

use crate::cmd::{lunch_date, open_store};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct AddArgs {
    /// People to sign up (or off, with `--remove`).
    #[arg(required = true)]
    pub people: Vec<String>,

    /// Lunch day (`YYYY-MM-DD` or `dd.mm.yyyy`); defaults to the open lunch.
    #[arg(long)]
    pub date: Option<String>,

    /// Sign the people off instead.
    #[arg(long)]
    pub remove: bool,
}

#[derive(Debug, Serialize)]
struct PersonOutcome {
    person: PersonId,
    #[serde(flatten)]
    outcome: ReactionOutcome,
}

#[derive(Debug, Serialize)]
struct AddOutput {
    date: String,
    results: Vec<PersonOutcome>,
}

fn describe(outcome: &ReactionOutcome) -> String {
    match outcome {
        ReactionOutcome::Ignored => "unchanged".to_string(),
        ReactionOutcome::Joined => "joined".to_string(),
        ReactionOutcome::Left => "left".to_string(),
        ReactionOutcome::Placed(late) => format!("placed group={} score={:.3}", late.group, late.score),
    }
}

/// Sign people up or off the way a reaction on the announcement would.
pub fn run_add(args: &AddArgs, output: OutputMode, config: &LunchConfig, project_root: &Path) -> Result<()> {
    let mut store = open_store(config, project_root);
    let date = lunch_date(args.date.as_deref(), &store, config)?;
    let op = if args.remove { ReactionOp::Remove } else { ReactionOp::Add };

    let mut results = Vec::with_capacity(args.people.len());
    for person in &args.people {
        let reaction = Reaction {
            person: PersonId::new(person.as_str()),
            emoji: config.signup_emoji.clone(),
            op,
        };
        let outcome = apply_reaction(&mut store, date, &reaction, config)?;
        results.push(PersonOutcome {
            person: reaction.person,
            outcome,
        });
    }

    let out = AddOutput {
        date: lunch_key(date),
        results,
    };
    render_mode(
        output,
        &out,
        |o, w| {
            for r in &o.results {
                writeln!(w, "{} {} {}", o.date, r.person, describe(&r.outcome))?;
            }
            Ok(())
        },
        |o, w| {
            pretty_section(w, &format!("Lunch {}", o.date))?;
            for r in &o.results {
                pretty_kv(w, r.person.as_str(), describe(&r.outcome))?;
            }
            Ok(())
        },
    )
}
