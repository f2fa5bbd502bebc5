//! Simulated payment gateway.
//!
//! There is no real payment processing. [`SimulatedGateway`] approves a
//! configurable share of requests at random (90% by default) and declines the
//! rest with a generic reason.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::PaymentConfig;
use crate::error::{Error, Result};

/// A charge for one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    /// Order being paid for.
    pub order_id: String,
    /// Amount in whole currency units.
    pub amount: u64,
}

/// Result of an authorization attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PaymentOutcome {
    /// Funds captured.
    Approved {
        /// Gateway reference for the charge.
        reference: String,
    },
    /// The charge did not go through.
    Declined {
        /// Message suitable for showing the user.
        reason: String,
    },
}

impl PaymentOutcome {
    /// Whether the payment was approved.
    #[must_use]
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved { .. })
    }
}

/// Something that can authorize a payment.
pub trait PaymentGateway: std::fmt::Debug {
    /// Attempt to charge `request`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPayment`] if the request can never succeed
    /// (for example a zero amount). A decline is not an error.
    fn authorize(&mut self, request: &PaymentRequest) -> Result<PaymentOutcome>;
}

/// Coin-flip gateway with a fixed approval probability.
#[derive(Debug)]
pub struct SimulatedGateway {
    rng: StdRng,
    success_rate: f64,
}

impl SimulatedGateway {
    /// Create a gateway. `seed` makes outcomes reproducible.
    ///
    /// # Errors
    ///
    /// Returns an error if `success_rate` is outside `0.0..=1.0`.
    pub fn new(success_rate: f64, seed: Option<u64>) -> Result<Self> {
        if !(0.0..=1.0).contains(&success_rate) {
            return Err(Error::config_validation(format!(
                "success_rate must be between 0 and 1, got {success_rate}"
            )));
        }
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self { rng, success_rate })
    }

    /// Create a gateway from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn from_config(config: &PaymentConfig) -> Result<Self> {
        Self::new(config.success_rate, config.seed)
    }
}

impl PaymentGateway for SimulatedGateway {
    fn authorize(&mut self, request: &PaymentRequest) -> Result<PaymentOutcome> {
        if request.amount == 0 {
            return Err(Error::InvalidPayment(format!(
                "order '{}' has nothing to charge",
                request.order_id
            )));
        }

        if self.rng.gen_bool(self.success_rate) {
            let reference = format!("pay-{:08x}", self.rng.gen::<u32>());
            debug!(order_id = %request.order_id, amount = request.amount, %reference, "payment approved");
            Ok(PaymentOutcome::Approved { reference })
        } else {
            warn!(order_id = %request.order_id, amount = request.amount, "payment declined");
            Ok(PaymentOutcome::Declined {
                reason: "Payment failed. Please try again.".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(amount: u64) -> PaymentRequest {
        PaymentRequest {
            order_id: "ord-1".to_string(),
            amount,
        }
    }

    #[test]
    fn test_always_approves_at_rate_one() {
        let mut gateway = SimulatedGateway::new(1.0, Some(1)).unwrap();
        for _ in 0..50 {
            assert!(gateway.authorize(&request(450)).unwrap().is_approved());
        }
    }

    #[test]
    fn test_always_declines_at_rate_zero() {
        let mut gateway = SimulatedGateway::new(0.0, Some(1)).unwrap();
        let outcome = gateway.authorize(&request(450)).unwrap();
        assert!(matches!(outcome, PaymentOutcome::Declined { .. }));
    }

    #[test]
    fn test_same_seed_same_outcomes() {
        let mut a = SimulatedGateway::new(0.5, Some(42)).unwrap();
        let mut b = SimulatedGateway::new(0.5, Some(42)).unwrap();
        for _ in 0..20 {
            assert_eq!(
                a.authorize(&request(10)).unwrap(),
                b.authorize(&request(10)).unwrap()
            );
        }
    }

    #[test]
    fn test_default_rate_mostly_approves() {
        let mut gateway = SimulatedGateway::new(0.9, Some(2024)).unwrap();
        let approved = (0..1000)
            .filter(|_| gateway.authorize(&request(5)).unwrap().is_approved())
            .count();
        assert!((800..=980).contains(&approved), "approved {approved}/1000");
    }

    #[test]
    fn test_zero_amount_is_invalid() {
        let mut gateway = SimulatedGateway::new(1.0, None).unwrap();
        let err = gateway.authorize(&request(0)).unwrap_err();
        assert!(matches!(err, Error::InvalidPayment(_)));
    }

    #[test]
    fn test_rejects_bad_success_rate() {
        assert!(SimulatedGateway::new(1.2, None).is_err());
    }

    #[test]
    fn test_outcome_json_is_tagged() {
        let json = serde_json::to_value(PaymentOutcome::Approved {
            reference: "pay-1".to_string(),
        })
        .unwrap();
        assert_eq!(json["outcome"], "approved");
        assert_eq!(json["reference"], "pay-1");
    }
}
