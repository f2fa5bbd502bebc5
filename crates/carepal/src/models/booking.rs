//! Visit bookings with a pal.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lifecycle::{BookingStatus, Lifecycle};
use crate::tracker::Tracked;

/// When a booked visit takes place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    /// Day of the visit.
    pub date: NaiveDate,
    /// Local start time.
    pub start_time: NaiveTime,
    /// Length of the visit in hours.
    pub duration_hours: u8,
}

/// A request for a pal (caretaker) to visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    /// Unique identifier.
    pub id: String,
    /// The requested pal. Not checked against any pal directory.
    pub pal_id: String,
    /// Current lifecycle status.
    pub status: BookingStatus,
    /// Agreed price in whole currency units.
    pub price: u64,
    /// Visit timing.
    pub schedule: Schedule,
    /// Free-form instructions for the pal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// When the booking was requested.
    pub created_at: DateTime<Utc>,
    /// Last status change.
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Create a booking awaiting approval.
    #[must_use]
    pub fn new(
        pal_id: impl Into<String>,
        price: u64,
        schedule: Schedule,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: super::new_id("bk"),
            pal_id: pal_id.into(),
            status: BookingStatus::initial(),
            price,
            schedule,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach instructions for the pal.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

impl Tracked for Booking {
    type Status = BookingStatus;
    const NAMESPACE: &'static str = "bookings";

    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> BookingStatus {
        self.status
    }

    fn set_status(&mut self, status: BookingStatus, at: DateTime<Utc>) {
        self.status = status;
        self.updated_at = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn schedule() -> Schedule {
        Schedule {
            date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            duration_hours: 2,
        }
    }

    #[test]
    fn test_new_booking_awaits_approval() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let booking = Booking::new("pal-42", 300, schedule(), now);
        assert_eq!(booking.status, BookingStatus::PendingApproval);
        assert_eq!(booking.pal_id, "pal-42");
        assert!(booking.notes.is_none());
        assert!(booking.id.starts_with("bk-"));
    }

    #[test]
    fn test_with_notes() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let booking = Booking::new("pal-42", 300, schedule(), now).with_notes("Ring twice");
        assert_eq!(booking.notes.as_deref(), Some("Ring twice"));
    }

    #[test]
    fn test_notes_omitted_from_json_when_absent() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let booking = Booking::new("pal-42", 300, schedule(), now);
        let json = serde_json::to_value(&booking).unwrap();
        assert!(json.get("notes").is_none());
        assert_eq!(json["schedule"]["durationHours"], 2);
        assert_eq!(json["palId"], "pal-42");
    }
}
