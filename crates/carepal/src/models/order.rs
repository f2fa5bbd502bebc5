//! Service orders placed by a client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lifecycle::{Lifecycle, OrderStatus};
use crate::tracker::Tracked;

/// A paid service request (meal delivery, home visit, supplies).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Unique identifier.
    pub id: String,
    /// What was ordered, as shown to the user.
    pub service_title: String,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// When the order was placed.
    pub timestamp: DateTime<Utc>,
    /// Last status change.
    pub updated_at: DateTime<Utc>,
    /// Price in whole currency units.
    pub amount: u64,
}

impl Order {
    /// Create a pending order with a generated id.
    #[must_use]
    pub fn new(service_title: impl Into<String>, amount: u64, now: DateTime<Utc>) -> Self {
        Self::with_id(super::new_id("ord"), service_title, amount, now)
    }

    /// Create a pending order with a caller-chosen id.
    #[must_use]
    pub fn with_id(
        id: impl Into<String>,
        service_title: impl Into<String>,
        amount: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            service_title: service_title.into(),
            status: OrderStatus::initial(),
            timestamp: now,
            updated_at: now,
            amount,
        }
    }
}

impl Tracked for Order {
    type Status = OrderStatus;
    const NAMESPACE: &'static str = "orders";

    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> OrderStatus {
        self.status
    }

    fn set_status(&mut self, status: OrderStatus, at: DateTime<Utc>) {
        self.status = status;
        self.updated_at = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_new_order_is_pending() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        let order = Order::new("Meal delivery", 450, now);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.amount, 450);
        assert_eq!(order.timestamp, now);
        assert_eq!(order.updated_at, now);
        assert!(order.id.starts_with("ord-"));
    }

    #[test]
    fn test_set_status_stamps_update_time() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        let later = now + chrono::Duration::minutes(5);
        let mut order = Order::with_id("ord-1", "Groceries", 120, now);
        order.set_status(OrderStatus::Paid, later);
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.timestamp, now);
        assert_eq!(order.updated_at, later);
    }

    #[test]
    fn test_order_json_shape() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        let order = Order::with_id("ord-1", "Groceries", 120, now);
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["serviceTitle"], "Groceries");
        assert_eq!(json["status"], "Pending");
    }
}
