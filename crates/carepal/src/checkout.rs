//! Order checkout.
//!
//! [`Checkout`] takes a pending order through the simulated payment step.
//! Payment settles after the processing delay; an approved order becomes
//! Paid and, unless disabled, is confirmed after a further delay if nothing
//! else moved it in the meantime. A declined payment leaves the order
//! Pending. Nothing is retried.

use std::collections::HashSet;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::PaymentConfig;
use crate::error::{Error, Result};
use crate::lifecycle::{Lifecycle, OrderStatus};
use crate::payment::{PaymentGateway, PaymentOutcome, PaymentRequest, SimulatedGateway};
use crate::state::AppState;
use crate::timer::{Timed, TimerQueue};

#[derive(Debug, Clone, PartialEq, Eq)]
enum CheckoutEvent {
    Settle { order_id: String, amount: u64 },
    AutoConfirm { order_id: String },
}

/// Something that happened while checkout timers fired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum CheckoutStep {
    /// Payment approved; the order is now Paid.
    Approved {
        /// The order.
        order_id: String,
        /// Gateway reference.
        reference: String,
    },
    /// Payment declined; the order stays Pending.
    Declined {
        /// The order.
        order_id: String,
        /// Reason from the gateway.
        reason: String,
    },
    /// A paid order was confirmed.
    Confirmed {
        /// The order.
        order_id: String,
    },
    /// A timer fired but the order had moved on or disappeared.
    Skipped {
        /// The order.
        order_id: String,
        /// Why nothing was done.
        reason: String,
    },
}

impl std::fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Approved {
                order_id,
                reference,
            } => write!(f, "{order_id}: payment approved ({reference})"),
            Self::Declined { order_id, reason } => write!(f, "{order_id}: declined: {reason}"),
            Self::Confirmed { order_id } => write!(f, "{order_id}: confirmed"),
            Self::Skipped { order_id, reason } => write!(f, "{order_id}: skipped: {reason}"),
        }
    }
}

/// Payment processing for orders, on its own virtual timeline.
#[derive(Debug)]
pub struct Checkout<G> {
    gateway: G,
    timers: TimerQueue<CheckoutEvent>,
    in_flight: HashSet<String>,
    processing_delay: Duration,
    auto_confirm_after: Option<Duration>,
}

impl<G: PaymentGateway> Checkout<G> {
    /// Create a checkout with explicit delays. `None` disables auto-confirm.
    #[must_use]
    pub fn new(
        gateway: G,
        processing_delay: Duration,
        auto_confirm_after: Option<Duration>,
    ) -> Self {
        Self {
            gateway,
            timers: TimerQueue::new(),
            in_flight: HashSet::new(),
            processing_delay,
            auto_confirm_after,
        }
    }

    /// Create a checkout using the configured delays.
    #[must_use]
    pub fn with_config(gateway: G, config: &PaymentConfig) -> Self {
        Self::new(
            gateway,
            config.processing_delay(),
            config.auto_confirm_after(),
        )
    }

    /// Submit payment for a pending order. It settles after the processing
    /// delay on the next [`advance`](Self::advance).
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the order does not exist.
    /// - [`Error::PaymentInFlight`] if a payment for it is already pending.
    /// - [`Error::IllegalTransition`] if the order is not Pending.
    /// - [`Error::InvalidPayment`] if there is nothing to charge.
    pub fn begin(&mut self, state: &AppState, order_id: &str) -> Result<()> {
        let order = state
            .orders
            .get(order_id)
            .ok_or_else(|| Error::not_found(OrderStatus::ENTITY, order_id))?;

        if self.in_flight.contains(order_id) {
            return Err(Error::PaymentInFlight {
                order_id: order_id.to_string(),
            });
        }
        if order.status != OrderStatus::Pending {
            return Err(Error::illegal_transition(
                OrderStatus::ENTITY,
                order_id,
                order.status,
                OrderStatus::Paid,
            ));
        }
        if order.amount == 0 {
            return Err(Error::InvalidPayment(format!(
                "order '{order_id}' has nothing to charge"
            )));
        }

        self.in_flight.insert(order_id.to_string());
        self.timers.schedule_after(
            self.processing_delay,
            CheckoutEvent::Settle {
                order_id: order_id.to_string(),
                amount: order.amount,
            },
        );
        info!(order_id, amount = order.amount, "payment submitted");
        Ok(())
    }

    /// Whether a payment for `order_id` is waiting to settle.
    #[must_use]
    pub fn is_in_flight(&self, order_id: &str) -> bool {
        self.in_flight.contains(order_id)
    }

    /// Number of armed timers (settlements and confirmations).
    #[must_use]
    pub fn pending(&self) -> usize {
        self.timers.pending()
    }

    /// Virtual time elapsed.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.timers.now()
    }

    /// Earliest armed deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    /// Advance virtual time by `by`, applying every settlement and
    /// confirmation that comes due to `state`.
    pub fn advance(&mut self, state: &mut AppState, by: Duration) -> Vec<CheckoutStep> {
        let until = self.timers.now() + by;
        let mut steps = Vec::new();
        while let Some(fired) = self.timers.pop_due(until) {
            let step = match fired.event {
                CheckoutEvent::Settle { order_id, amount } => self.settle(state, order_id, amount),
                CheckoutEvent::AutoConfirm { order_id } => confirm(state, order_id),
            };
            steps.push(step);
        }
        self.timers.settle(until);
        steps
    }

    /// Pair this checkout with `state` so it can be driven as one [`Timed`].
    #[must_use]
    pub fn run<'a>(&'a mut self, state: &'a mut AppState) -> CheckoutRun<'a, G> {
        CheckoutRun {
            checkout: self,
            state,
        }
    }

    fn settle(&mut self, state: &mut AppState, order_id: String, amount: u64) -> CheckoutStep {
        self.in_flight.remove(&order_id);

        let still_pending = state
            .orders
            .get(&order_id)
            .is_some_and(|o| o.status == OrderStatus::Pending);
        if !still_pending {
            debug!(order_id = %order_id, "settlement skipped");
            return skipped(order_id, "order no longer pending");
        }

        let request = PaymentRequest {
            order_id: order_id.clone(),
            amount,
        };
        let outcome = match self.gateway.authorize(&request) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(order_id = %order_id, error = %e, "payment could not be processed");
                return CheckoutStep::Declined {
                    order_id,
                    reason: e.to_string(),
                };
            }
        };

        match outcome {
            PaymentOutcome::Declined { reason } => CheckoutStep::Declined { order_id, reason },
            PaymentOutcome::Approved { reference } => {
                match state.set_order_status(&order_id, OrderStatus::Paid) {
                    Ok(update) if update.is_updated() => {}
                    Ok(_) => {
                        return skipped(order_id, "order no longer pending");
                    }
                    Err(e) => return skipped(order_id, e.to_string()),
                }
                if let Some(delay) = self.auto_confirm_after {
                    self.timers.schedule_after(
                        delay,
                        CheckoutEvent::AutoConfirm {
                            order_id: order_id.clone(),
                        },
                    );
                }
                CheckoutStep::Approved {
                    order_id,
                    reference,
                }
            }
        }
    }
}

impl Checkout<SimulatedGateway> {
    /// Checkout backed by a simulated gateway built from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the payment configuration is invalid.
    pub fn simulated(config: &PaymentConfig) -> Result<Self> {
        config.validate()?;
        let gateway = SimulatedGateway::from_config(config)?;
        Ok(Self::with_config(gateway, config))
    }
}

fn confirm(state: &mut AppState, order_id: String) -> CheckoutStep {
    let still_paid = state
        .orders
        .get(&order_id)
        .is_some_and(|o| o.status == OrderStatus::Paid);
    if !still_paid {
        debug!(order_id = %order_id, "auto-confirm skipped");
        return skipped(order_id, "order no longer paid");
    }
    match state.set_order_status(&order_id, OrderStatus::Confirmed) {
        Ok(_) => CheckoutStep::Confirmed { order_id },
        Err(e) => skipped(order_id, e.to_string()),
    }
}

fn skipped(order_id: String, reason: impl Into<String>) -> CheckoutStep {
    CheckoutStep::Skipped {
        order_id,
        reason: reason.into(),
    }
}

/// A [`Checkout`] borrowed together with the state it mutates.
#[derive(Debug)]
pub struct CheckoutRun<'a, G> {
    checkout: &'a mut Checkout<G>,
    state: &'a mut AppState,
}

impl<G: PaymentGateway> Timed for CheckoutRun<'_, G> {
    type Step = CheckoutStep;

    fn elapsed(&self) -> Duration {
        self.checkout.elapsed()
    }

    fn next_deadline(&self) -> Option<Duration> {
        self.checkout.next_deadline()
    }

    fn advance(&mut self, by: Duration) -> Vec<CheckoutStep> {
        self.checkout.advance(self.state, by)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::system_clock;
    use crate::lifecycle::TransitionPolicy;
    use crate::timer::drive_virtual;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn checkout(rate: f64) -> Checkout<SimulatedGateway> {
        let gateway = SimulatedGateway::new(rate, Some(11)).unwrap();
        Checkout::new(gateway, ms(2000), Some(ms(3000)))
    }

    fn state_with_order(amount: u64) -> (AppState, String) {
        let mut state = AppState::new(TransitionPolicy::Strict, system_clock());
        let id = state.place_order("Weekly groceries", amount);
        (state, id)
    }

    fn status(state: &AppState, id: &str) -> OrderStatus {
        state.orders.get(id).unwrap().status
    }

    #[test]
    fn test_approval_pays_then_confirms() {
        let (mut state, id) = state_with_order(450);
        let mut checkout = checkout(1.0);
        checkout.begin(&state, &id).unwrap();
        assert!(checkout.is_in_flight(&id));

        assert!(checkout.advance(&mut state, ms(1999)).is_empty());
        assert_eq!(status(&state, &id), OrderStatus::Pending);

        let steps = checkout.advance(&mut state, ms(1));
        assert!(matches!(steps[..], [CheckoutStep::Approved { .. }]));
        assert_eq!(status(&state, &id), OrderStatus::Paid);
        assert!(!checkout.is_in_flight(&id));

        let steps = checkout.advance(&mut state, ms(3000));
        assert_eq!(steps, vec![CheckoutStep::Confirmed { order_id: id.clone() }]);
        assert_eq!(status(&state, &id), OrderStatus::Confirmed);
        assert_eq!(checkout.pending(), 0);
    }

    #[test]
    fn test_decline_leaves_pending() {
        crate::logging::init_test_logging();
        let (mut state, id) = state_with_order(450);
        let mut checkout = checkout(0.0);
        checkout.begin(&state, &id).unwrap();

        let steps = checkout.advance(&mut state, ms(10_000));
        assert!(matches!(&steps[..], [CheckoutStep::Declined { reason, .. }] if reason.contains("Payment failed")));
        assert_eq!(status(&state, &id), OrderStatus::Pending);
        assert_eq!(checkout.pending(), 0);

        // a declined order can be retried by hand
        checkout.begin(&state, &id).unwrap();
    }

    #[test]
    fn test_auto_confirm_skipped_if_order_moved() {
        let (mut state, id) = state_with_order(450);
        let mut checkout = checkout(1.0);
        checkout.begin(&state, &id).unwrap();
        checkout.advance(&mut state, ms(2000));

        state.set_order_status(&id, OrderStatus::Confirmed).unwrap();
        state.set_order_status(&id, OrderStatus::Shipped).unwrap();

        let steps = checkout.advance(&mut state, ms(3000));
        assert!(matches!(steps[..], [CheckoutStep::Skipped { .. }]));
        assert_eq!(status(&state, &id), OrderStatus::Shipped);
    }

    #[test]
    fn test_auto_confirm_disabled() {
        let (mut state, id) = state_with_order(450);
        let gateway = SimulatedGateway::new(1.0, Some(1)).unwrap();
        let mut checkout = Checkout::new(gateway, ms(2000), None);
        checkout.begin(&state, &id).unwrap();

        checkout.advance(&mut state, ms(60_000));
        assert_eq!(status(&state, &id), OrderStatus::Paid);
        assert_eq!(checkout.pending(), 0);
    }

    #[test]
    fn test_settle_does_not_roll_back_a_moved_order() {
        let mut state = AppState::new(TransitionPolicy::Permissive, system_clock());
        let id = state.place_order("Weekly groceries", 450);
        let mut checkout = checkout(1.0);
        checkout.begin(&state, &id).unwrap();

        state.set_order_status(&id, OrderStatus::Completed).unwrap();

        let steps = checkout.advance(&mut state, ms(10_000));
        assert!(matches!(steps[..], [CheckoutStep::Skipped { .. }]));
        assert_eq!(status(&state, &id), OrderStatus::Completed);
        assert_eq!(checkout.pending(), 0);
        assert!(!checkout.is_in_flight(&id));
    }

    #[test]
    fn test_begin_unknown_order() {
        let (state, _) = state_with_order(450);
        let err = checkout(1.0).begin(&state, "ord-missing").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_begin_twice_is_rejected() {
        let (state, id) = state_with_order(450);
        let mut checkout = checkout(1.0);
        checkout.begin(&state, &id).unwrap();
        let err = checkout.begin(&state, &id).unwrap_err();
        assert!(matches!(err, Error::PaymentInFlight { .. }));
        assert_eq!(checkout.pending(), 1);
    }

    #[test]
    fn test_begin_on_paid_order_is_rejected() {
        let (mut state, id) = state_with_order(450);
        state.set_order_status(&id, OrderStatus::Paid).unwrap();
        let err = checkout(1.0).begin(&state, &id).unwrap_err();
        assert!(err.is_illegal_transition());
    }

    #[test]
    fn test_begin_zero_amount_is_rejected() {
        let (state, id) = state_with_order(0);
        let err = checkout(1.0).begin(&state, &id).unwrap_err();
        assert!(matches!(err, Error::InvalidPayment(_)));
    }

    #[test]
    fn test_settle_after_clear_is_skipped() {
        let (mut state, id) = state_with_order(450);
        let mut checkout = checkout(1.0);
        checkout.begin(&state, &id).unwrap();
        state.clear_all();

        let steps = checkout.advance(&mut state, ms(2000));
        assert!(matches!(steps[..], [CheckoutStep::Skipped { .. }]));
        assert_eq!(checkout.pending(), 0);
    }

    #[test]
    fn test_drive_run_to_completion() {
        let (mut state, id) = state_with_order(120);
        let mut checkout = checkout(1.0);
        checkout.begin(&state, &id).unwrap();

        let mut seen = Vec::new();
        drive_virtual(&mut checkout.run(&mut state), Duration::MAX, |s| {
            seen.push(s.clone());
        });

        assert_eq!(seen.len(), 2);
        assert_eq!(status(&state, &id), OrderStatus::Confirmed);
        assert_eq!(checkout.elapsed(), ms(5000));
    }

    #[test]
    fn test_simulated_from_config() {
        let config = PaymentConfig {
            success_rate: 1.0,
            seed: Some(3),
            ..PaymentConfig::default()
        };
        let (mut state, id) = state_with_order(80);
        let mut checkout = Checkout::simulated(&config).unwrap();
        checkout.begin(&state, &id).unwrap();
        assert_eq!(checkout.next_deadline(), Some(ms(2000)));
        checkout.advance(&mut state, ms(5000));
        assert_eq!(status(&state, &id), OrderStatus::Confirmed);
    }

    #[test]
    fn test_step_display() {
        let step = CheckoutStep::Confirmed {
            order_id: "ord-1".to_string(),
        };
        assert_eq!(step.to_string(), "ord-1: confirmed");
    }
}
