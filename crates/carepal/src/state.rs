//! Application state.
//!
//! [`AppState`] owns every store. Anything that mutates a store borrows the
//! state mutably; there is no shared global.

use serde::Serialize;
use tracing::{debug, info};

use crate::clock::{system_clock, Clock, SharedClock};
use crate::config::Config;
use crate::error::Result;
use crate::lifecycle::{BookingStatus, ErrandStatus, OrderStatus, TransitionPolicy};
use crate::models::{Booking, Errand, Order, Schedule};
use crate::storage::Storage;
use crate::tracker::{StatusTracker, Tracked, UpdateOutcome};

/// Record counts removed by [`AppState::clear_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClearSummary {
    /// Orders removed.
    pub orders: usize,
    /// Bookings removed.
    pub bookings: usize,
    /// Errands removed.
    pub errands: usize,
}

impl ClearSummary {
    /// Total records removed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.orders + self.bookings + self.errands
    }
}

/// Every store plus the clock used to stamp changes.
#[derive(Debug)]
pub struct AppState {
    clock: SharedClock,
    /// Service orders.
    pub orders: StatusTracker<Order>,
    /// Pal visit bookings.
    pub bookings: StatusTracker<Booking>,
    /// Errands (gigs).
    pub errands: StatusTracker<Errand>,
}

impl AppState {
    /// Empty state with the given policy and clock.
    #[must_use]
    pub fn new(policy: TransitionPolicy, clock: SharedClock) -> Self {
        Self {
            clock,
            orders: StatusTracker::new(policy),
            bookings: StatusTracker::new(policy),
            errands: StatusTracker::new(policy),
        }
    }

    /// Empty state using the configured policy and the system clock.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.lifecycle.policy, system_clock())
    }

    /// Restore every store from `storage`. Missing namespaces start empty.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored snapshot is corrupt, has an unknown
    /// format version, or cannot be read.
    pub fn load(storage: &Storage, policy: TransitionPolicy, clock: SharedClock) -> Result<Self> {
        let state = Self {
            clock,
            orders: load_tracker(storage, policy)?,
            bookings: load_tracker(storage, policy)?,
            errands: load_tracker(storage, policy)?,
        };
        info!(
            orders = state.orders.len(),
            bookings = state.bookings.len(),
            errands = state.errands.len(),
            "state restored"
        );
        Ok(state)
    }

    /// Write every store to `storage` in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; nothing is written in that case.
    pub fn save(&self, storage: &Storage) -> Result<()> {
        storage.atomically(|s| {
            s.save(Order::NAMESPACE, &self.orders.snapshot())?;
            s.save(Booking::NAMESPACE, &self.bookings.snapshot())?;
            s.save(Errand::NAMESPACE, &self.errands.snapshot())
        })?;
        debug!("state saved");
        Ok(())
    }

    /// The clock used for timestamps.
    #[must_use]
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Apply one transition policy to every store.
    pub fn set_policy(&mut self, policy: TransitionPolicy) {
        self.orders.set_policy(policy);
        self.bookings.set_policy(policy);
        self.errands.set_policy(policy);
    }

    /// Create a pending order and return its id.
    pub fn place_order(&mut self, service_title: impl Into<String>, amount: u64) -> String {
        let order = Order::new(service_title, amount, self.clock.now());
        let id = order.id.clone();
        self.orders.insert(order);
        id
    }

    /// Request a pal visit and return the booking id.
    pub fn request_booking(
        &mut self,
        pal_id: impl Into<String>,
        price: u64,
        schedule: Schedule,
        notes: Option<String>,
    ) -> String {
        let mut booking = Booking::new(pal_id, price, schedule, self.clock.now());
        if let Some(notes) = notes {
            booking = booking.with_notes(notes);
        }
        let id = booking.id.clone();
        self.bookings.insert(booking);
        id
    }

    /// Post an errand and return its id.
    pub fn post_errand(&mut self, title: impl Into<String>, reward: u64) -> String {
        let errand = Errand::new(title, reward, self.clock.now());
        let id = errand.id.clone();
        self.errands.insert(errand);
        id
    }

    /// Set an order's status.
    ///
    /// # Errors
    ///
    /// Returns an error if the change is illegal under the current policy.
    pub fn set_order_status(
        &mut self,
        id: &str,
        status: OrderStatus,
    ) -> Result<UpdateOutcome<OrderStatus>> {
        let now = self.clock.now();
        self.orders.update_status(id, status, now)
    }

    /// Set a booking's status.
    ///
    /// # Errors
    ///
    /// Returns an error if the change is illegal under the current policy.
    pub fn set_booking_status(
        &mut self,
        id: &str,
        status: BookingStatus,
    ) -> Result<UpdateOutcome<BookingStatus>> {
        let now = self.clock.now();
        self.bookings.update_status(id, status, now)
    }

    /// Set an errand's status.
    ///
    /// # Errors
    ///
    /// Returns an error if the change is illegal under the current policy.
    pub fn set_errand_status(
        &mut self,
        id: &str,
        status: ErrandStatus,
    ) -> Result<UpdateOutcome<ErrandStatus>> {
        let now = self.clock.now();
        self.errands.update_status(id, status, now)
    }

    /// A pal picks up an errand: pending → in-progress, recording the pal.
    ///
    /// # Errors
    ///
    /// Returns an error if the errand cannot move to in-progress.
    pub fn start_errand(
        &mut self,
        id: &str,
        pal_id: impl Into<String>,
    ) -> Result<UpdateOutcome<ErrandStatus>> {
        let now = self.clock.now();
        let pal_id = pal_id.into();
        self.errands
            .update_status_with(id, ErrandStatus::InProgress, now, |errand| {
                errand.assigned_pal = Some(pal_id);
            })
    }

    /// Empty every store.
    pub fn clear_all(&mut self) -> ClearSummary {
        let summary = ClearSummary {
            orders: self.orders.clear_all(),
            bookings: self.bookings.clear_all(),
            errands: self.errands.clear_all(),
        };
        info!(removed = summary.total(), "all stores cleared");
        summary
    }
}

fn load_tracker<E: Tracked>(storage: &Storage, policy: TransitionPolicy) -> Result<StatusTracker<E>> {
    let records: Vec<E> = storage.load(E::NAMESPACE)?.unwrap_or_default();
    Ok(StatusTracker::from_snapshot(records, policy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
    use std::sync::Arc;
    use std::time::Duration;

    fn test_state() -> (AppState, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap());
        let state = AppState::new(TransitionPolicy::Strict, Arc::new(clock.clone()));
        (state, clock)
    }

    fn schedule() -> Schedule {
        Schedule {
            date: NaiveDate::from_ymd_opt(2024, 5, 3).unwrap(),
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            duration_hours: 2,
        }
    }

    #[test]
    fn test_place_order_stamps_clock() {
        let (mut state, clock) = test_state();
        let id = state.place_order("Meal delivery", 450);
        let order = state.orders.get(&id).unwrap();
        assert_eq!(order.timestamp, clock.now());
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn test_status_change_uses_current_clock() {
        let (mut state, clock) = test_state();
        let id = state.place_order("Meal delivery", 450);
        clock.advance(Duration::from_secs(60));

        state.set_order_status(&id, OrderStatus::Paid).unwrap();
        assert_eq!(state.orders.get(&id).unwrap().updated_at, clock.now());
    }

    #[test]
    fn test_booking_without_notes() {
        let (mut state, _) = test_state();
        let id = state.request_booking("pal-7", 80, schedule(), None);
        assert!(state.bookings.get(&id).unwrap().notes.is_none());
    }

    #[test]
    fn test_booking_lifecycle() {
        let (mut state, _) = test_state();
        let id = state.request_booking("pal-7", 80, schedule(), Some("Ring twice".into()));

        for status in [
            BookingStatus::ApprovedAndAssigned,
            BookingStatus::Matched,
            BookingStatus::Active,
            BookingStatus::Completed,
        ] {
            assert!(state.set_booking_status(&id, status).unwrap().is_updated());
        }
        let booking = state.bookings.get(&id).unwrap();
        assert_eq!(booking.status, BookingStatus::Completed);
        assert_eq!(booking.notes.as_deref(), Some("Ring twice"));
    }

    #[test]
    fn test_start_errand_assigns_pal() {
        let (mut state, _) = test_state();
        let id = state.post_errand("Pick up prescription", 15);

        state.start_errand(&id, "pal-3").unwrap();
        let errand = state.errands.get(&id).unwrap();
        assert_eq!(errand.status, ErrandStatus::InProgress);
        assert_eq!(errand.assigned_pal.as_deref(), Some("pal-3"));
    }

    #[test]
    fn test_start_errand_unknown_id_is_noop() {
        let (mut state, _) = test_state();
        let outcome = state.start_errand("gig-missing", "pal-3").unwrap();
        assert_eq!(outcome, UpdateOutcome::NotFound);
        assert!(state.errands.is_empty());
    }

    #[test]
    fn test_set_policy_applies_everywhere() {
        let (mut state, _) = test_state();
        state.set_policy(TransitionPolicy::Permissive);
        assert_eq!(state.orders.policy(), TransitionPolicy::Permissive);
        assert_eq!(state.bookings.policy(), TransitionPolicy::Permissive);
        assert_eq!(state.errands.policy(), TransitionPolicy::Permissive);
    }

    #[test]
    fn test_clear_all_summary() {
        let (mut state, _) = test_state();
        state.place_order("A", 1);
        state.place_order("B", 2);
        state.post_errand("C", 3);

        let summary = state.clear_all();
        assert_eq!(summary.orders, 2);
        assert_eq!(summary.bookings, 0);
        assert_eq!(summary.errands, 1);
        assert_eq!(summary.total(), 3);
        assert!(state.orders.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let (mut state, clock) = test_state();
        let order_id = state.place_order("Meal delivery", 450);
        state.set_order_status(&order_id, OrderStatus::Paid).unwrap();
        state.request_booking("pal-7", 80, schedule(), None);
        state.post_errand("Groceries", 10);

        let storage = Storage::open_in_memory().unwrap();
        state.save(&storage).unwrap();

        let restored =
            AppState::load(&storage, TransitionPolicy::Strict, Arc::new(clock)).unwrap();
        assert_eq!(restored.orders, state.orders);
        assert_eq!(restored.bookings, state.bookings);
        assert_eq!(restored.errands, state.errands);
    }

    #[test]
    fn test_load_empty_storage() {
        let storage = Storage::open_in_memory().unwrap();
        let state = AppState::load(&storage, TransitionPolicy::Strict, system_clock()).unwrap();
        assert!(state.orders.is_empty());
        assert!(state.bookings.is_empty());
        assert!(state.errands.is_empty());
    }
}
