//! Long-running control loop.
//!
//! One [`Poller`] multiplexes the sources the bot listens to. The command
//! producer is registered for the whole run. While a lunch takes sign-ups a
//! reaction producer and a deadline [`delay`] sit on top of it; when the
//! deadline fires the reaction producer is retracted and the finished lunch
//! is folded into the pairing ledger.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use lunchbot_core::config::LunchConfig;
use lunchbot_core::dates::{deadline_after, lunch_key, next_lunch_date};
use lunchbot_core::workflow::{self, FixupOutcome, Reaction, ReactionOutcome};
use lunchbot_core::{LunchStore, PersonId};
use lunchbot_poll::{PollItem, Poller, delay};
use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::control::ControlMessage;
use crate::output::{CliError, OutputMode, pretty_section};
use crate::render;

const COMMANDS: &str = "commands";
const REACTIONS: &str = "reactions";

/// Source of "now"; injectable so tests can pin the calendar.
pub type Clock = fn() -> DateTime<Utc>;

/// Where the bot talks back.
pub trait ChatSurface {
    /// Post to the lunch topic everyone reads.
    fn announce(&mut self, topic: &str, text: &str) -> io::Result<()>;
    /// Acknowledge an operator command.
    fn success(&mut self, text: &str) -> io::Result<()>;
    /// Report a failed operator command.
    fn failed(&mut self, text: &str) -> io::Result<()>;
}

#[derive(Debug, Serialize)]
struct ConsoleLine<'a> {
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    topic: Option<&'a str>,
    text: &'a str,
}

/// Chat surface writing to a terminal or pipe.
pub struct ConsoleChat<W> {
    mode: OutputMode,
    out: W,
}

impl<W: Write> ConsoleChat<W> {
    pub const fn new(mode: OutputMode, out: W) -> Self {
        Self { mode, out }
    }

    fn emit(&mut self, kind: &str, topic: Option<&str>, text: &str) -> io::Result<()> {
        match self.mode {
            OutputMode::Json => {
                let line = ConsoleLine { kind, topic, text };
                serde_json::to_writer(&mut self.out, &line)?;
                writeln!(self.out)?;
            }
            OutputMode::Pretty => {
                if let Some(topic) = topic {
                    pretty_section(&mut self.out, topic)?;
                    writeln!(self.out, "{text}\n")?;
                } else {
                    writeln!(self.out, "{kind}: {text}")?;
                }
            }
            OutputMode::Text => match topic {
                Some(topic) => writeln!(self.out, "[{topic}]\n{text}")?,
                None => writeln!(self.out, "{kind}: {text}")?,
            },
        }
        self.out.flush()
    }
}

impl<W: Write> ChatSurface for ConsoleChat<W> {
    fn announce(&mut self, topic: &str, text: &str) -> io::Result<()> {
        self.emit("post", Some(topic), text)
    }

    fn success(&mut self, text: &str) -> io::Result<()> {
        self.emit("ok", None, text)
    }

    fn failed(&mut self, text: &str) -> io::Result<()> {
        self.emit("error", None, text)
    }
}

type SharedReceiver = Arc<Mutex<mpsc::UnboundedReceiver<ControlMessage>>>;

/// Sending half of an [`Inbox`]; routes reactions and commands apart.
#[derive(Debug, Clone)]
pub struct InboxSender {
    commands: mpsc::UnboundedSender<ControlMessage>,
    reactions: mpsc::UnboundedSender<ControlMessage>,
}

impl InboxSender {
    /// # Errors
    ///
    /// Fails once the bot has shut down.
    pub fn send(&self, msg: ControlMessage) -> Result<()> {
        let channel = if msg.is_reaction() { &self.reactions } else { &self.commands };
        channel
            .send(msg)
            .map_err(|_| anyhow::anyhow!("control loop is gone"))
    }
}

/// Receiving half: one queue per producer.
#[derive(Debug)]
pub struct Inbox {
    commands: mpsc::UnboundedReceiver<ControlMessage>,
    reactions: mpsc::UnboundedReceiver<ControlMessage>,
}

impl Inbox {
    pub fn channel() -> (InboxSender, Self) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (reactions_tx, reactions) = mpsc::unbounded_channel();
        (
            InboxSender {
                commands: commands_tx,
                reactions: reactions_tx,
            },
            Self { commands, reactions },
        )
    }
}

/// Producer reading one queue; a closed queue yields `on_close` or never
/// resolves.
fn channel_item(rx: SharedReceiver, on_close: Option<ControlMessage>) -> PollItem<ControlMessage> {
    PollItem::repeat(move || {
        let rx = Arc::clone(&rx);
        let on_close = on_close.clone();
        async move {
            let next = rx.lock().await.recv().await;
            match (next, on_close) {
                (Some(msg), _) | (None, Some(msg)) => msg,
                (None, None) => futures::future::pending().await,
            }
        }
        .boxed()
    })
}

pub struct LunchBot<S, C> {
    store: S,
    chat: C,
    config: LunchConfig,
    clock: Clock,
    open: Option<DateTime<Utc>>,
    poller: Poller<ControlMessage>,
}

impl<S: LunchStore, C: ChatSurface> LunchBot<S, C> {
    /// Pick up a lunch that is still taking sign-ups, if any.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub fn new(store: S, chat: C, config: LunchConfig, clock: Clock) -> Result<Self> {
        let open = workflow::open_lunch(&store, clock())?;
        if let Some(date) = open {
            info!(date = %lunch_key(date), "lunch already open");
        }
        Ok(Self {
            store,
            chat,
            config,
            clock,
            open,
            poller: Poller::new(),
        })
    }

    /// Serve `inbox` until the command queue closes or a shutdown arrives.
    /// Returns the store.
    ///
    /// # Errors
    ///
    /// Fails when the chat surface can no longer be written or the poller
    /// runs empty.
    pub async fn run(mut self, inbox: Inbox) -> Result<S> {
        if self.open.is_none() {
            debug!("house-keeping: possibly refresh ledger");
            self.report(|bot| bot.refresh())?;
        }

        let commands = Arc::new(Mutex::new(inbox.commands));
        let reactions = Arc::new(Mutex::new(inbox.reactions));
        self.poller
            .push(channel_item(commands, Some(ControlMessage::Shutdown)).labeled(COMMANDS));

        debug!("starting control loop");
        loop {
            if self.poller.len() == 1 {
                if let Some(date) = self.open {
                    self.watch_reactions(&reactions, date);
                }
            }
            let msg = self.poller.poll().await?;
            if msg == ControlMessage::Shutdown {
                break;
            }
            self.handle(msg)?;
        }

        // queued reactions still count; in-flight reads hold the queue lock
        drop(self.poller.drain());
        let pending: Vec<ControlMessage> = match reactions.try_lock() {
            Ok(mut rx) => std::iter::from_fn(|| rx.try_recv().ok()).collect(),
            Err(_) => Vec::new(),
        };
        for msg in pending {
            self.handle(msg)?;
        }
        info!("control loop stopped");
        Ok(self.store)
    }

    fn watch_reactions(&mut self, reactions: &SharedReceiver, date: DateTime<Utc>) {
        debug!(date = %lunch_key(date), "adding reaction producer to poller");
        self.poller
            .push(channel_item(Arc::clone(reactions), None).labeled(REACTIONS));
        let wait = (deadline_after(date) - (self.clock)())
            .to_std()
            .unwrap_or_default();
        self.poller.push(delay(wait, ControlMessage::LunchExpired));
    }

    /// Act on one message. Failures of the action go to the chat; only a
    /// broken chat surface is returned.
    ///
    /// # Errors
    ///
    /// Fails when the chat surface cannot be written.
    pub fn handle(&mut self, msg: ControlMessage) -> Result<()> {
        debug!(?msg, "handling control message");
        match msg {
            ControlMessage::SetPayer { person, has_payer } => {
                self.report(|bot| bot.set_payer(&person, has_payer))
            }
            ControlMessage::Announce => self.report(Self::announce),
            ControlMessage::Organize => self.report(Self::organize),
            ControlMessage::HistoryInsert { date, groups } => {
                self.report(|bot| bot.insert_history(date, &groups))
            }
            ControlMessage::Fixup { people } => self.report(|bot| bot.fixup(&people)),
            ControlMessage::Reaction(reaction) => self.report(|bot| bot.react(&reaction)),
            ControlMessage::LunchExpired => self.report(Self::expire),
            ControlMessage::Bad { error } => Ok(self.chat.failed(&error)?),
            ControlMessage::Shutdown => Ok(()),
        }
    }

    fn report(&mut self, action: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        if let Err(err) = action(self) {
            warn!(error = %format!("{err:#}"), "control message failed");
            let cli = CliError::from(&err);
            let text = match cli.error_code {
                Some(code) => format!("{code}: {}", cli.message),
                None => cli.message,
            };
            self.chat.failed(&text)?;
        }
        Ok(())
    }

    fn lunch_date(&self) -> DateTime<Utc> {
        self.open
            .unwrap_or_else(|| next_lunch_date((self.clock)(), self.config.lunch_weekday))
    }

    fn set_payer(&mut self, person: &PersonId, has_payer: bool) -> Result<()> {
        self.store.ensure_person(person)?;
        self.store.set_payer(person, has_payer)?;
        self.chat.success(&format!("set {person} payer to {has_payer}"))?;
        Ok(())
    }

    fn announce(&mut self) -> Result<()> {
        let date = next_lunch_date((self.clock)(), self.config.lunch_weekday);
        if self.store.load_grouping(date)?.is_some() {
            self.open = Some(date);
            bail!("next lunch @ {} already scheduled", lunch_key(date));
        }
        workflow::announce(&mut self.store, date)?;
        self.chat.announce(
            &render::topic(date),
            &render::announcement(date, &self.config.signup_emoji),
        )?;
        self.chat.success(&format!("announced lunch {}", lunch_key(date)))?;
        self.open = Some(date);
        Ok(())
    }

    fn organize(&mut self) -> Result<()> {
        let date = self.lunch_date();
        info!(date = %lunch_key(date), "organizing lunch");
        let solution = workflow::organize(&mut self.store, date, &self.config)?;
        self.chat
            .announce(&render::topic(date), &render::groups_message(date, &solution.assignment))?;
        self.chat.success(&format!(
            "organized lunch {}\nscore = {:.3}",
            lunch_key(date),
            solution.score
        ))?;
        Ok(())
    }

    fn insert_history(&mut self, date: DateTime<Utc>, groups: &[Vec<PersonId>]) -> Result<()> {
        workflow::insert_history(&mut self.store, date, groups)?;
        self.chat.success(&format!(
            "updated history for {}: {} groups",
            lunch_key(date),
            groups.len()
        ))?;
        Ok(())
    }

    fn fixup(&mut self, people: &[PersonId]) -> Result<()> {
        let Some(date) = self.open else {
            bail!("no lunch is open for sign-ups");
        };
        let summary = match workflow::fixup(&mut self.store, date, people, &self.config)? {
            FixupOutcome::Rebuilt { pending } => format!("{pending} signed up"),
            FixupOutcome::Placed { placed, stale } => {
                if !placed.is_empty() {
                    let Some(grouping) = self.store.load_grouping(date)? else {
                        bail!("lunch {} vanished during fixup", lunch_key(date));
                    };
                    self.chat
                        .announce(&render::topic(date), &render::groups_message(date, &grouping))?;
                }
                format!("{} placed, {} no longer signed up", placed.len(), stale.len())
            }
        };
        self.chat
            .success(&format!("fixed up lunch {}: {summary}", lunch_key(date)))?;
        Ok(())
    }

    fn react(&mut self, reaction: &Reaction) -> Result<()> {
        let Some(date) = self.open else {
            bail!("no lunch is open for sign-ups");
        };
        match workflow::apply_reaction(&mut self.store, date, reaction, &self.config)? {
            ReactionOutcome::Ignored => debug!(person = %reaction.person, "reaction ignored"),
            ReactionOutcome::Joined | ReactionOutcome::Left => {}
            ReactionOutcome::Placed(late) => self.chat.success(&format!(
                "added {} to active lunch in group {}, new score {:.3}",
                reaction.person, late.group, late.score
            ))?,
        }
        Ok(())
    }

    fn expire(&mut self) -> Result<()> {
        if let Some(date) = self.open.take() {
            info!(date = %lunch_key(date), "lunch sign-ups closed");
        }
        if self.poller.labels().last() == Some(REACTIONS) {
            drop(self.poller.pop());
        }
        if self.poller.len() > 1 {
            warn!(len = self.poller.len(), labels = ?self.poller.labels().collect::<Vec<_>>(), "unexpected poller state after lunch expired");
        }
        self.refresh()
    }

    fn refresh(&mut self) -> Result<()> {
        if workflow::refresh_ledger(&mut self.store)? {
            self.chat.success("updated pairing ledger with the latest lunch")?;
        }
        Ok(())
    }
}
