//! Errands posted for pals to pick up.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lifecycle::{ErrandStatus, Lifecycle};
use crate::tracker::Tracked;

/// A small task a pal runs on someone's behalf (pharmacy pickup, post office).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Errand {
    /// Unique identifier.
    pub id: String,
    /// Short description.
    pub title: String,
    /// Current lifecycle status.
    pub status: ErrandStatus,
    /// Payout in whole currency units.
    pub reward: u64,
    /// Pal who picked up the errand, once someone has.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_pal: Option<String>,
    /// When the errand was posted.
    pub created_at: DateTime<Utc>,
    /// Last status change.
    pub updated_at: DateTime<Utc>,
}

impl Errand {
    /// Post a new, unassigned errand.
    #[must_use]
    pub fn new(title: impl Into<String>, reward: u64, now: DateTime<Utc>) -> Self {
        Self {
            id: super::new_id("err"),
            title: title.into(),
            status: ErrandStatus::initial(),
            reward,
            assigned_pal: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Tracked for Errand {
    type Status = ErrandStatus;
    const NAMESPACE: &'static str = "errands";

    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> ErrandStatus {
        self.status
    }

    fn set_status(&mut self, status: ErrandStatus, at: DateTime<Utc>) {
        self.status = status;
        self.updated_at = at;
    }
}
