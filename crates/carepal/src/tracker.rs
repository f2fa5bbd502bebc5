//! Generic status tracker.
//!
//! A [`StatusTracker`] holds one store's records in insertion order and is
//! the only way their status changes. Unknown ids are a quiet no-op; status
//! changes are checked against the record's [`Lifecycle`] table under the
//! tracker's [`TransitionPolicy`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::Result;
use crate::lifecycle::{Lifecycle, TransitionPolicy};

/// A record whose status follows a [`Lifecycle`].
pub trait Tracked: Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned {
    /// The status enum.
    type Status: Lifecycle;

    /// Persistence namespace for a store of these records.
    const NAMESPACE: &'static str;

    /// Unique identifier.
    fn id(&self) -> &str;

    /// Current status.
    fn status(&self) -> Self::Status;

    /// Replace the status and stamp the change time.
    fn set_status(&mut self, status: Self::Status, at: DateTime<Utc>);
}

/// What a status update did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome<S> {
    /// The status changed.
    Updated {
        /// Previous status.
        from: S,
        /// New status.
        to: S,
    },
    /// The record already had the requested status.
    Unchanged,
    /// No record has that id; nothing was touched.
    NotFound,
}

impl<S> UpdateOutcome<S> {
    /// Whether the record's status actually changed.
    #[must_use]
    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated { .. })
    }
}

/// Insertion-ordered collection of records keyed by id.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusTracker<E> {
    records: Vec<E>,
    policy: TransitionPolicy,
}

impl<E: Tracked> Default for StatusTracker<E> {
    fn default() -> Self {
        Self::new(TransitionPolicy::default())
    }
}

impl<E: Tracked> StatusTracker<E> {
    /// Create an empty tracker.
    #[must_use]
    pub fn new(policy: TransitionPolicy) -> Self {
        Self {
            records: Vec::new(),
            policy,
        }
    }

    /// Rebuild a tracker from a persisted snapshot.
    ///
    /// Order is preserved. If the snapshot repeats an id, the later record
    /// replaces the earlier one in its original position.
    #[must_use]
    pub fn from_snapshot(records: Vec<E>, policy: TransitionPolicy) -> Self {
        let mut tracker = Self::new(policy);
        for record in records {
            tracker.insert(record);
        }
        tracker
    }

    /// Copy of every record, in order, for persistence.
    #[must_use]
    pub fn snapshot(&self) -> Vec<E> {
        self.records.clone()
    }

    /// The transition policy in force.
    #[must_use]
    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    /// Change the transition policy.
    pub fn set_policy(&mut self, policy: TransitionPolicy) {
        self.policy = policy;
    }

    /// Add a record. A record with the same id is replaced in place and
    /// returned.
    pub fn insert(&mut self, record: E) -> Option<E> {
        if let Some(slot) = self.records.iter_mut().find(|r| r.id() == record.id()) {
            debug!(entity = E::Status::ENTITY, id = record.id(), "replacing record");
            return Some(std::mem::replace(slot, record));
        }
        debug!(
            entity = E::Status::ENTITY,
            id = record.id(),
            status = %record.status(),
            "record created"
        );
        self.records.push(record);
        None
    }

    /// Look up a record.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&E> {
        self.records.iter().find(|r| r.id() == id)
    }

    /// Whether a record with this id exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Set a record's status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalTransition`](crate::Error::IllegalTransition)
    /// when the change is not allowed under the tracker's policy. The record is
    /// left untouched.
    pub fn update_status(
        &mut self,
        id: &str,
        to: E::Status,
        at: DateTime<Utc>,
    ) -> Result<UpdateOutcome<E::Status>> {
        self.update_status_with(id, to, at, |_| {})
    }

    /// Like [`update_status`](Self::update_status), additionally applying
    /// `edit` to the record when the status changes.
    ///
    /// # Errors
    ///
    /// Same as [`update_status`](Self::update_status).
    pub fn update_status_with(
        &mut self,
        id: &str,
        to: E::Status,
        at: DateTime<Utc>,
        edit: impl FnOnce(&mut E),
    ) -> Result<UpdateOutcome<E::Status>> {
        let policy = self.policy;
        let Some(record) = self.records.iter_mut().find(|r| r.id() == id) else {
            debug!(entity = E::Status::ENTITY, id, "status update for unknown id ignored");
            return Ok(UpdateOutcome::NotFound);
        };

        let from = record.status();
        if from == to {
            return Ok(UpdateOutcome::Unchanged);
        }
        from.check_transition(id, to, policy)?;

        record.set_status(to, at);
        edit(record);
        info!(
            entity = E::Status::ENTITY,
            id,
            from = %from,
            to = %to,
            "status changed"
        );
        Ok(UpdateOutcome::Updated { from, to })
    }

    /// Records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.records.iter()
    }

    /// All ids in insertion order.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.records.iter().map(Tracked::id).collect()
    }

    /// Number of records with the given status.
    #[must_use]
    pub fn count_by_status(&self, status: E::Status) -> usize {
        self.records.iter().filter(|r| r.status() == status).count()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the tracker is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Remove every record, returning how many there were.
    pub fn clear_all(&mut self) -> usize {
        let count = self.records.len();
        self.records.clear();
        if count > 0 {
            info!(entity = E::Status::ENTITY, count, "store cleared");
        }
        count
    }
}
