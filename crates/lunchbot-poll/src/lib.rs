//! Event multiplexer for the control loop.
//!
//! A [`PollItem`] is one repeating asynchronous source: a single in-flight
//! future plus a factory that arms the next one. A [`Poller`] races every
//! registered item and hands back whichever value is ready first. Only the
//! item that completed is re-armed; every other in-flight future keeps its
//! progress. An item whose factory runs dry is dropped after delivering its
//! last value.
//!
//! The race starts just after the previous winner, so an item that re-arms
//! with a future that is already ready cannot shut out the others.
//!
//! ```no_run
//! # async fn demo() -> Result<(), lunchbot_poll::PollError> {
//! use std::time::Duration;
//! use lunchbot_poll::{Poller, delay};
//!
//! let mut poller = Poller::new();
//! poller.push(delay(Duration::from_millis(100), "slow"));
//! poller.push(delay(Duration::from_millis(1), "fast"));
//! assert_eq!(poller.poll().await?, "fast");
//! assert_eq!(poller.poll().await?, "slow");
//! assert!(poller.is_empty());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

use std::fmt;
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, select_all};
use tracing::trace;

/// Factory arming the next future of a [`PollItem`]; `None` means exhausted.
pub type Producer<A> = Box<dyn FnMut() -> Option<BoxFuture<'static, A>> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PollError {
    #[error("poll on an empty poller")]
    Empty,

    #[error("poll item factory was exhausted before producing anything")]
    NoInitialFuture,
}

/// One self-re-arming event source.
pub struct PollItem<A> {
    label: &'static str,
    active: Option<BoxFuture<'static, A>>,
    make_next: Producer<A>,
}

impl<A> PollItem<A> {
    /// Arm the first future from `make_next`.
    ///
    /// # Errors
    ///
    /// [`PollError::NoInitialFuture`] when the factory is exhausted at once.
    pub fn new<F>(mut make_next: F) -> Result<Self, PollError>
    where
        F: FnMut() -> Option<BoxFuture<'static, A>> + Send + 'static,
    {
        let first = make_next().ok_or(PollError::NoInitialFuture)?;
        Ok(Self::with_initial(first, make_next))
    }

    /// Item with `first` already in flight.
    pub fn with_initial<F>(first: BoxFuture<'static, A>, make_next: F) -> Self
    where
        F: FnMut() -> Option<BoxFuture<'static, A>> + Send + 'static,
    {
        Self {
            label: "item",
            active: Some(first),
            make_next: Box::new(make_next),
        }
    }

    /// Source that never runs dry.
    pub fn repeat<F>(mut make_next: F) -> Self
    where
        F: FnMut() -> BoxFuture<'static, A> + Send + 'static,
    {
        let first = make_next();
        Self::with_initial(first, move || Some(make_next()))
    }

    /// Name used in trace output.
    #[must_use]
    pub const fn labeled(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        self.label
    }

    /// `true` once the factory has reported exhaustion.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.active.is_none()
    }

    fn rearm(&mut self) {
        self.active = (self.make_next)();
    }
}

impl<A> fmt::Debug for PollItem<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollItem")
            .field("label", &self.label)
            .field("done", &self.is_done())
            .finish_non_exhaustive()
    }
}

/// One-shot item resolving to `value` after `duration`, then done.
pub fn delay<A: Send + 'static>(duration: Duration, value: A) -> PollItem<A> {
    let first = async move {
        tokio::time::sleep(duration).await;
        value
    }
    .boxed();
    PollItem::with_initial(first, || None).labeled("delay")
}

/// Races registered [`PollItem`]s in completion order.
pub struct Poller<A> {
    /// Push order; `pop` takes from the back.
    items: Vec<PollItem<A>>,
    /// Index the next race starts from.
    cursor: usize,
}

impl<A> Default for Poller<A> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            cursor: 0,
        }
    }
}

impl<A> fmt::Debug for Poller<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

impl<A> Poller<A> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: PollItem<A>) {
        trace!(label = item.label, len = self.items.len() + 1, "poll item registered");
        self.items.push(item);
    }

    /// Retract the most recently pushed item, whatever its state.
    ///
    /// Its in-flight future is handed back, not cancelled.
    pub fn pop(&mut self) -> Option<PollItem<A>> {
        let item = self.items.pop();
        if let Some(item) = &item {
            trace!(label = item.label, len = self.items.len(), "poll item retracted");
        }
        item
    }

    /// Retract every item.
    pub fn drain(&mut self) -> Vec<PollItem<A>> {
        self.cursor = 0;
        std::mem::take(&mut self.items)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Labels of the registered items in push order.
    pub fn labels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.items.iter().map(PollItem::label)
    }

    /// Next value from whichever item completes first.
    ///
    /// # Errors
    ///
    /// [`PollError::Empty`] when nothing is registered.
    pub async fn poll(&mut self) -> Result<A, PollError> {
        let start = self.cursor.checked_rem(self.items.len()).unwrap_or(0);
        let (before, after) = self.items.split_at_mut(start);
        let racing: Vec<_> = after
            .iter_mut()
            .enumerate()
            .map(|(offset, item)| (start + offset, item))
            .chain(before.iter_mut().enumerate())
            .filter_map(|(idx, item)| item.active.as_mut().map(|fut| fut.map(move |value| (value, idx))))
            .collect();
        if racing.is_empty() {
            return Err(PollError::Empty);
        }

        let ((value, idx), _, _) = select_all(racing).await;

        let item = &mut self.items[idx];
        item.rearm();
        if item.is_done() {
            let item = self.items.remove(idx);
            trace!(label = item.label, len = self.items.len(), "poll item exhausted");
            self.cursor = idx;
        } else {
            self.cursor = idx + 1;
        }
        Ok(value)
    }
}
