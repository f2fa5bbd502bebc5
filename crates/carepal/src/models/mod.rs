//! Canonical record types for every tracked entity.
//!
//! Each record has exactly one shape; optional data is an explicit `Option`
//! and construction always stamps an id and creation time.

mod booking;
mod errand;
mod order;

pub use booking::{Booking, Schedule};
pub use errand::Errand;
pub use order::Order;

use uuid::Uuid;

/// Generate a short, prefixed identifier such as `ord-1a2b3c4d`.
#[must_use]
pub fn new_id(prefix: &str) -> String {
    let simple = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &simple[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_id_has_prefix() {
        let id = new_id("ord");
        assert!(id.starts_with("ord-"));
        assert_eq!(id.len(), "ord-".len() + 8);
    }

    #[test]
    fn test_new_id_is_unique() {
        assert_ne!(new_id("bk"), new_id("bk"));
    }
}
