//! `carepal` - Status lifecycle core for care coordination
//!
//! This library tracks orders, pal bookings and errands through their status
//! lifecycles, simulates calls and payments on virtual-time timers, and
//! persists whole stores as namespaced snapshots in `SQLite`.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod call;
pub mod checkout;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod models;
pub mod payment;
pub mod state;
pub mod storage;
pub mod timer;
pub mod tracker;

pub use call::{CallSession, CallTimings, CallTransition};
pub use checkout::{Checkout, CheckoutStep};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::Config;
pub use error::{Error, Result};
pub use lifecycle::{
    BookingStatus, CallStatus, ErrandStatus, Lifecycle, OrderStatus, TransitionPolicy,
};
pub use logging::init_logging;
pub use models::{Booking, Errand, Order, Schedule};
pub use payment::{PaymentGateway, PaymentOutcome, PaymentRequest, SimulatedGateway};
pub use state::{AppState, ClearSummary};
pub use storage::{Storage, StorageStats};
pub use timer::{drive_realtime, drive_virtual, Timed, TimerQueue};
pub use tracker::{StatusTracker, Tracked, UpdateOutcome};
