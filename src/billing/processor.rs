use async_trait::async_trait;
use rand::Rng;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::PaymentPurpose;

#[derive(Debug, Clone, Serialize)]
pub struct ChargeRequest {
    pub payment_id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub purpose: PaymentPurpose,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeOutcome {
    Approved { transaction_id: String },
    Declined { reason: String },
}

impl ChargeOutcome {
    pub fn is_approved(&self) -> bool {
        matches!(self, ChargeOutcome::Approved { .. })
    }
}

/// Failures talking to the processor itself, as opposed to a declined card
#[derive(Debug, Clone, Error)]
pub enum ProcessorError {
    #[error("Payment processor unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid charge request: {0}")]
    InvalidRequest(String),
}

#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    fn name(&self) -> &str;

    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeOutcome, ProcessorError>;
}

/// Stand-in for a real gateway: approves a configurable share of charges.
#[derive(Debug, Clone)]
pub struct SimulatedProcessor {
    success_rate: f64,
}

impl SimulatedProcessor {
    pub fn new(success_rate: f64) -> Self {
        Self {
            success_rate: success_rate.clamp(0.0, 1.0),
        }
    }

    pub fn success_rate(&self) -> f64 {
        self.success_rate
    }
}

#[async_trait]
impl PaymentProcessor for SimulatedProcessor {
    fn name(&self) -> &str {
        "simulator"
    }

    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeOutcome, ProcessorError> {
        if request.amount < Decimal::ZERO {
            return Err(ProcessorError::InvalidRequest(format!(
                "negative amount {} for payment {}",
                request.amount, request.payment_id
            )));
        }

        let approved = request.amount.is_zero() || rand::rng().random_bool(self.success_rate);

        let outcome = if approved {
            ChargeOutcome::Approved {
                transaction_id: format!("sim_{}", Uuid::new_v4().simple()),
            }
        } else {
            ChargeOutcome::Declined {
                reason: "Card declined by issuer".to_string(),
            }
        };

        tracing::debug!(
            payment_id = %request.payment_id,
            amount = %request.amount,
            purpose = request.purpose.as_str(),
            approved = outcome.is_approved(),
            "Simulated charge"
        );

        Ok(outcome)
    }
}
