// Payments crate clippy configuration
#![allow(clippy::too_many_arguments)] // Some provider operations take many parameters
// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Atelier payments
//!
//! Handles both payment providers and the webhook-driven fulfillment
//! flow.
//!
//! ## Features
//!
//! - **Checkout**: Stripe checkout sessions and Coinbase Commerce charges
//!   for the three fixed packages
//! - **Webhooks**: signature gates and event dispatch for both providers
//! - **Fulfillment**: idempotent Contact → Project → Invoice upserts keyed
//!   on values derived from immutable external ids
//! - **Invariants**: runnable consistency checks over the record graph

pub mod checkout;
pub mod client;
pub mod coinbase;
pub mod error;
pub mod fulfillment;
pub mod invariants;
pub mod packages;
pub mod webhooks;

#[cfg(test)]
mod edge_case_tests;

// Checkout
pub use checkout::{CardCheckoutResponse, CheckoutService, CustomerInfo, SafeSession};

// Client
pub use client::{StripeClient, StripeConfig};

// Coinbase
pub use coinbase::{Charge, CoinbaseClient, CoinbaseConfig, CryptoCustomer, CryptoEvent};

// Error
pub use error::{PaymentsError, PaymentsResult};

// Fulfillment
pub use fulfillment::{
    derive_invoice_number, ChargeFacts, ConfirmOutcome, FulfillmentService, CARD_INVOICE_PREFIX,
    CRYPTO_INVOICE_PREFIX,
};

// Invariants
pub use invariants::{
    InvariantCheckSummary, InvariantChecker, InvariantViolation, ViolationSeverity,
};

// Packages
pub use packages::Package;

// Webhooks
pub use webhooks::WebhookHandler;

use sqlx::PgPool;
use uuid::Uuid;

use atelier_shared::analytics::AnalyticsLogger;

/// Main payments service that combines checkout, webhooks, and
/// invariant checking.
pub struct PaymentsService {
    pub checkout: CheckoutService,
    pub fulfillment: FulfillmentService,
    pub webhooks: WebhookHandler,
    pub invariants: InvariantChecker,
}

impl PaymentsService {
    /// Create the payments service from environment variables.
    ///
    /// Fails when either provider is unconfigured; callers degrade to a
    /// payments-disabled deployment in that case.
    pub fn from_env(pool: PgPool, admin_user_id: Option<Uuid>) -> PaymentsResult<Self> {
        let stripe = StripeClient::from_env()?;
        let coinbase = CoinbaseClient::from_env()?;
        Ok(Self::new(stripe, coinbase, pool, admin_user_id))
    }

    pub fn new(
        stripe: StripeClient,
        coinbase: CoinbaseClient,
        pool: PgPool,
        admin_user_id: Option<Uuid>,
    ) -> Self {
        let analytics = AnalyticsLogger::new(pool.clone());
        let fulfillment = FulfillmentService::new(pool.clone(), admin_user_id);

        Self {
            checkout: CheckoutService::new(stripe.clone(), coinbase.clone(), pool.clone()),
            fulfillment: fulfillment.clone(),
            webhooks: WebhookHandler::new(stripe, coinbase, fulfillment, analytics),
            invariants: InvariantChecker::new(pool),
        }
    }
}
