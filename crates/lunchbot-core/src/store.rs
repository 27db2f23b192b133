//! Persistence for the ledger, known people and per-lunch groupings.
//!
//! [`LunchStore`] is the seam the workflows talk to. [`MemoryStore`] backs
//! tests and simulations; [`JsonStore`] keeps one directory of JSON files:
//!
//! ```text
//! <data_dir>/
//!   ledger.json
//!   people.json
//!   lunches/2024-04-17.json
//!   store.lock
//! ```
//!
//! Every file is replaced through a temp file and a rename, and every
//! mutating call holds the exclusive advisory lock on `store.lock`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::dates::lunch_key;
use crate::error::ErrorCode;
use crate::lock::{DEFAULT_LOCK_TIMEOUT, LockError, StoreLock};
use crate::model::{Grouping, Person, PersonId};
use crate::pairing::PairingLedger;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt store file {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Lock(#[from] LockError),
}

impl StoreError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Io { .. } => ErrorCode::StorageIo,
            Self::Corrupt { .. } => ErrorCode::CorruptStore,
            Self::Lock(err) => err.code(),
        }
    }

    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    fn corrupt(path: &Path, source: serde_json::Error) -> Self {
        Self::Corrupt {
            path: path.display().to_string(),
            source,
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Typed persistence operations the lunch workflows rely on.
pub trait LunchStore {
    /// The stored ledger, `None` until one is first saved.
    fn stored_ledger(&self) -> StoreResult<Option<PairingLedger>>;

    /// The stored ledger, or an empty one floored three weeks before
    /// `as_of`, so scores on a fresh store depend only on the lunch date.
    fn load_ledger(&self, as_of: DateTime<Utc>) -> StoreResult<PairingLedger> {
        Ok(self
            .stored_ledger()?
            .unwrap_or_else(|| PairingLedger::from_history(Vec::new(), as_of)))
    }

    fn save_ledger(&mut self, ledger: &PairingLedger) -> StoreResult<()>;

    fn load_grouping(&self, date: DateTime<Utc>) -> StoreResult<Option<Grouping>>;

    fn save_grouping(&mut self, date: DateTime<Utc>, grouping: &Grouping) -> StoreResult<()>;

    /// Date of the most recent stored lunch, organized or not.
    fn latest_lunch_date(&self) -> StoreResult<Option<DateTime<Utc>>>;

    /// The known person, registering them without a payer when new.
    fn ensure_person(&mut self, id: &PersonId) -> StoreResult<Person>;

    fn set_payer(&mut self, id: &PersonId, has_payer: bool) -> StoreResult<()>;

    /// Every known person in id order.
    fn known_people(&self) -> StoreResult<Vec<Person>>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    ledger: Option<PairingLedger>,
    people: BTreeMap<PersonId, Person>,
    lunches: BTreeMap<DateTime<Utc>, Grouping>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with a ledger.
    #[must_use]
    pub fn with_ledger(ledger: PairingLedger) -> Self {
        Self {
            ledger: Some(ledger),
            ..Self::default()
        }
    }
}

impl LunchStore for MemoryStore {
    fn stored_ledger(&self) -> StoreResult<Option<PairingLedger>> {
        Ok(self.ledger.clone())
    }

    fn save_ledger(&mut self, ledger: &PairingLedger) -> StoreResult<()> {
        self.ledger = Some(ledger.clone());
        Ok(())
    }

    fn load_grouping(&self, date: DateTime<Utc>) -> StoreResult<Option<Grouping>> {
        Ok(self.lunches.get(&date).cloned())
    }

    fn save_grouping(&mut self, date: DateTime<Utc>, grouping: &Grouping) -> StoreResult<()> {
        self.lunches.insert(date, grouping.clone());
        Ok(())
    }

    fn latest_lunch_date(&self) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(self.lunches.keys().next_back().copied())
    }

    fn ensure_person(&mut self, id: &PersonId) -> StoreResult<Person> {
        Ok(self
            .people
            .entry(id.clone())
            .or_insert_with(|| Person::new(id.clone(), false))
            .clone())
    }

    fn set_payer(&mut self, id: &PersonId, has_payer: bool) -> StoreResult<()> {
        self.people
            .entry(id.clone())
            .or_insert_with(|| Person::new(id.clone(), false))
            .has_payer = has_payer;
        Ok(())
    }

    fn known_people(&self) -> StoreResult<Vec<Person>> {
        Ok(self.people.values().cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// JSON directory store
// ---------------------------------------------------------------------------

/// One stored lunch file.
#[derive(Debug, Serialize, Deserialize)]
struct LunchRecord {
    date: DateTime<Utc>,
    grouping: Grouping,
}

#[derive(Debug, Clone)]
pub struct JsonStore {
    root: PathBuf,
    lock_timeout: Duration,
}

impl JsonStore {
    /// Store rooted at `root`; directories are created on first write.
    #[must_use]
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ledger_path(&self) -> PathBuf {
        self.root.join("ledger.json")
    }

    fn people_path(&self) -> PathBuf {
        self.root.join("people.json")
    }

    fn lunches_dir(&self) -> PathBuf {
        self.root.join("lunches")
    }

    fn lunch_path(&self, date: DateTime<Utc>) -> PathBuf {
        self.lunches_dir().join(format!("{}.json", lunch_key(date)))
    }

    fn lock(&self) -> StoreResult<StoreLock> {
        Ok(StoreLock::acquire(&self.root.join("store.lock"), self.lock_timeout)?)
    }

    fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<T>> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::io(path, err)),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| StoreError::corrupt(path, err))
    }

    fn write_json<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| StoreError::io(parent, err))?;
        }
        let encoded = serde_json::to_string_pretty(value).map_err(|err| StoreError::corrupt(path, err))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, encoded.as_bytes()).map_err(|err| StoreError::io(&tmp, err))?;
        fs::rename(&tmp, path).map_err(|err| StoreError::io(path, err))?;
        debug!(path = %path.display(), "store file written");
        Ok(())
    }

    fn read_people(&self) -> StoreResult<BTreeMap<PersonId, Person>> {
        let people: Vec<Person> = Self::read_json(&self.people_path())?.unwrap_or_default();
        Ok(people.into_iter().map(|p| (p.id.clone(), p)).collect())
    }

    fn write_people(&self, people: &BTreeMap<PersonId, Person>) -> StoreResult<()> {
        let people: Vec<&Person> = people.values().collect();
        Self::write_json(&self.people_path(), &people)
    }
}

impl LunchStore for JsonStore {
    fn stored_ledger(&self) -> StoreResult<Option<PairingLedger>> {
        Self::read_json(&self.ledger_path())
    }

    #[instrument(skip_all, fields(pairs = ledger.len()))]
    fn save_ledger(&mut self, ledger: &PairingLedger) -> StoreResult<()> {
        let _lock = self.lock()?;
        Self::write_json(&self.ledger_path(), ledger)
    }

    fn load_grouping(&self, date: DateTime<Utc>) -> StoreResult<Option<Grouping>> {
        let record: Option<LunchRecord> = Self::read_json(&self.lunch_path(date))?;
        Ok(record.map(|r| r.grouping))
    }

    #[instrument(skip(self, grouping), fields(date = %lunch_key(date)))]
    fn save_grouping(&mut self, date: DateTime<Utc>, grouping: &Grouping) -> StoreResult<()> {
        let _lock = self.lock()?;
        let record = LunchRecord {
            date,
            grouping: grouping.clone(),
        };
        Self::write_json(&self.lunch_path(date), &record)
    }

    fn latest_lunch_date(&self) -> StoreResult<Option<DateTime<Utc>>> {
        let dir = self.lunches_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::io(&dir, err)),
        };

        // file stems are YYYY-MM-DD, so the lexicographic max is the latest
        let mut latest: Option<PathBuf> = None;
        for entry in entries {
            let path = entry.map_err(|err| StoreError::io(&dir, err))?.path();
            if path.extension().is_some_and(|ext| ext == "json")
                && latest.as_ref().is_none_or(|current| path > *current)
            {
                latest = Some(path);
            }
        }

        let Some(path) = latest else {
            return Ok(None);
        };
        let record: Option<LunchRecord> = Self::read_json(&path)?;
        Ok(record.map(|r| r.date))
    }

    fn ensure_person(&mut self, id: &PersonId) -> StoreResult<Person> {
        let _lock = self.lock()?;
        let mut people = self.read_people()?;
        if let Some(person) = people.get(id) {
            return Ok(person.clone());
        }
        let person = Person::new(id.clone(), false);
        people.insert(id.clone(), person.clone());
        self.write_people(&people)?;
        debug!(person = %id, "registered new person");
        Ok(person)
    }

    fn set_payer(&mut self, id: &PersonId, has_payer: bool) -> StoreResult<()> {
        let _lock = self.lock()?;
        let mut people = self.read_people()?;
        people
            .entry(id.clone())
            .or_insert_with(|| Person::new(id.clone(), false))
            .has_payer = has_payer;
        self.write_people(&people)
    }

    fn known_people(&self) -> StoreResult<Vec<Person>> {
        Ok(self.read_people()?.into_values().collect())
    }
}
