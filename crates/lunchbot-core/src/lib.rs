//! lunchbot-core library.
//!
//! Fairness ledger, deterministic RNG, greedy group solver and the lunch
//! workflows built on them.
//!
//! # Conventions
//!
//! - **Errors**: library code returns [`error::Result`]; every error maps to
//!   a stable [`error::ErrorCode`].
//! - **Logging**: use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).
//! - **Randomness**: only through [`rng::LunchRng`], seeded per lunch date.

#![forbid(unsafe_code)]

pub mod config;
pub mod dates;
pub mod error;
pub mod lock;
pub mod model;
pub mod ordering;
pub mod pairing;
pub mod rng;
pub mod solver;
pub mod store;
pub mod workflow;

pub use error::{ErrorCode, LunchError, Result};
pub use model::{Attendee, GroupId, Grouping, PENDING_GROUP, Person, PersonId, Solution};
pub use pairing::{LunchGroups, PairingLedger};
pub use rng::{LunchRng, deterministic_seed};
pub use solver::Solver;
pub use store::{JsonStore, LunchStore, MemoryStore, StoreError};
