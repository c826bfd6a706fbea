//! Webhook verification and event dispatch
//!
//! One handler per provider, dispatching on the event's `type` to
//! exactly one handler body. Unknown types are logged and acknowledged.
//! There is no mutual exclusion between concurrent deliveries: handler
//! bodies are built entirely from the idempotent upserts in
//! `fulfillment`, so two in-flight requests for the same charge id
//! converge on the store's unique constraints.

use stripe::{Event, EventObject, EventType};

use atelier_shared::analytics::{AnalyticsEventBuilder, AnalyticsLogger};
use atelier_shared::types::InvoiceStatus;

use crate::client::StripeClient;
use crate::coinbase::{Charge, CoinbaseClient, CryptoEvent};
use crate::error::{PaymentsError, PaymentsResult};
use crate::fulfillment::{
    derive_invoice_number, ChargeFacts, FulfillmentService, CARD_INVOICE_PREFIX,
    CRYPTO_INVOICE_PREFIX,
};

pub struct WebhookHandler {
    stripe: StripeClient,
    coinbase: CoinbaseClient,
    fulfillment: FulfillmentService,
    analytics: AnalyticsLogger,
}

impl WebhookHandler {
    pub fn new(
        stripe: StripeClient,
        coinbase: CoinbaseClient,
        fulfillment: FulfillmentService,
        analytics: AnalyticsLogger,
    ) -> Self {
        Self {
            stripe,
            coinbase,
            fulfillment,
            analytics,
        }
    }

    // -------------------------------------------------------------------------
    // Card payments (Stripe)
    // -------------------------------------------------------------------------

    /// Verify and parse a Stripe webhook payload.
    ///
    /// The payload must be the exact raw body: the signature covers the
    /// bytes, not the parsed JSON.
    pub fn verify_stripe_event(&self, payload: &str, signature: &str) -> PaymentsResult<Event> {
        stripe::Webhook::construct_event(payload, signature, &self.stripe.config().webhook_secret)
            .map_err(|e| {
                tracing::warn!(error = %e, "Stripe webhook signature verification failed");
                PaymentsError::WebhookSignatureInvalid
            })
    }

    /// Handle a verified Stripe event.
    pub async fn handle_stripe_event(&self, event: Event) -> PaymentsResult<()> {
        match event.type_ {
            EventType::CheckoutSessionCompleted => {
                let session = match event.data.object {
                    EventObject::CheckoutSession(session) => session,
                    _ => {
                        return Err(PaymentsError::InvalidInput(
                            "expected a checkout session object".to_string(),
                        ))
                    }
                };
                self.handle_checkout_completed(session).await
            }
            EventType::PaymentIntentSucceeded => {
                let intent = match event.data.object {
                    EventObject::PaymentIntent(intent) => intent,
                    _ => {
                        return Err(PaymentsError::InvalidInput(
                            "expected a payment intent object".to_string(),
                        ))
                    }
                };
                let rows = self
                    .fulfillment
                    .project_invoice_status(intent.id.as_str(), InvoiceStatus::Paid)
                    .await?;
                tracing::info!(
                    payment_intent = %intent.id,
                    invoices_updated = rows,
                    "Payment intent succeeded"
                );
                Ok(())
            }
            EventType::PaymentIntentPaymentFailed => {
                let intent = match event.data.object {
                    EventObject::PaymentIntent(intent) => intent,
                    _ => {
                        return Err(PaymentsError::InvalidInput(
                            "expected a payment intent object".to_string(),
                        ))
                    }
                };
                let rows = self
                    .fulfillment
                    .project_invoice_status(intent.id.as_str(), InvoiceStatus::Overdue)
                    .await?;
                tracing::warn!(
                    payment_intent = %intent.id,
                    invoices_updated = rows,
                    "Payment intent failed"
                );
                Ok(())
            }
            _ => {
                // Track which events arrive without a handler; new ones
                // may deserve one.
                tracing::info!(
                    event_type = %event.type_,
                    event_id = %event.id,
                    "Received unhandled Stripe event type"
                );
                Ok(())
            }
        }
    }

    /// checkout.session.completed: the card-side confirmed transition.
    async fn handle_checkout_completed(
        &self,
        session: stripe::CheckoutSession,
    ) -> PaymentsResult<()> {
        let session_id = session.id.to_string();

        let payment_intent_id = match &session.payment_intent {
            Some(stripe::Expandable::Id(id)) => Some(id.to_string()),
            Some(stripe::Expandable::Object(intent)) => Some(intent.id.to_string()),
            None => None,
        };

        let metadata = session.metadata.clone().unwrap_or_default();
        let package = metadata
            .get("package_id")
            .and_then(|id| crate::packages::Package::parse(id));

        let customer_email = session
            .customer_details
            .as_ref()
            .and_then(|d| d.email.clone())
            .or_else(|| metadata.get("customer_email").cloned());
        let customer_name = session
            .customer_details
            .as_ref()
            .and_then(|d| d.name.clone())
            .or_else(|| metadata.get("customer_name").cloned());

        let facts = ChargeFacts {
            invoice_number: derive_invoice_number(CARD_INVOICE_PREFIX, &session_id),
            external_ref: payment_intent_id.unwrap_or_else(|| session_id.clone()),
            charge_id: session_id.clone(),
            package,
            customer_email,
            customer_name,
            amount_cents: session.amount_total.unwrap_or(0),
            currency: session
                .currency
                .map(|c| c.to_string())
                .unwrap_or_else(|| "eur".to_string()),
            source: "stripe_payment",
        };

        let outcome = self.fulfillment.confirm_payment(&facts).await?;

        if let Err(e) = self
            .analytics
            .log_event(
                AnalyticsEventBuilder::new("payment_confirmed")
                    .page("/api/stripe/webhook")
                    .session_id(&session_id)
                    .properties(serde_json::json!({
                        "provider": "stripe",
                        "package": facts.package.map(|p| p.id()),
                        "amount_cents": facts.amount_cents,
                        "currency": facts.currency,
                        "degraded": outcome.degraded,
                    })),
            )
            .await
        {
            tracing::warn!(error = %e, "Failed to log payment confirmed event");
        }

        tracing::info!(
            session_id = %session_id,
            contact_id = ?outcome.contact_id,
            project_id = ?outcome.project_id,
            invoice_id = ?outcome.invoice_id,
            "Checkout session completed"
        );

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Crypto payments (Coinbase Commerce)
    // -------------------------------------------------------------------------

    /// Verify the crypto webhook signature over the raw body bytes.
    pub fn verify_crypto_signature(&self, body: &[u8], signature: &str) -> PaymentsResult<()> {
        self.coinbase.verify_webhook_signature(body, signature)
    }

    /// Handle a verified crypto event.
    pub async fn handle_crypto_event(&self, event: CryptoEvent) -> PaymentsResult<()> {
        match event {
            CryptoEvent::ChargeCreated(charge) => self.handle_crypto_created(charge).await,
            CryptoEvent::ChargeConfirmed(charge) => self.handle_crypto_confirmed(charge).await,
            CryptoEvent::ChargeFailed(charge) => {
                self.project_crypto_status(&charge, InvoiceStatus::Cancelled, "crypto_payment_failed")
                    .await
            }
            CryptoEvent::ChargeDelayed(charge) => {
                let rows = self
                    .fulfillment
                    .project_invoice_status(&charge.id, InvoiceStatus::Sent)
                    .await?;
                tracing::info!(charge_id = %charge.id, invoices_updated = rows, "Crypto payment delayed");
                Ok(())
            }
            CryptoEvent::ChargePending(charge) => {
                let rows = self
                    .fulfillment
                    .project_invoice_status(&charge.id, InvoiceStatus::Sent)
                    .await?;
                tracing::info!(charge_id = %charge.id, invoices_updated = rows, "Crypto payment pending");
                Ok(())
            }
            CryptoEvent::Unknown { event_type } => {
                tracing::info!(event_type = %event_type, "Received unhandled crypto event type");
                Ok(())
            }
        }
    }

    async fn handle_crypto_created(&self, charge: Charge) -> PaymentsResult<()> {
        tracing::info!(charge_id = %charge.id, "Crypto charge created");

        let facts = crypto_charge_facts(&charge);

        if let Err(e) = self
            .analytics
            .log_event(
                AnalyticsEventBuilder::new("crypto_charge_created")
                    .page("/api/crypto/webhook")
                    .session_id(&charge.id)
                    .properties(serde_json::json!({
                        "provider": "coinbase_commerce",
                        "package": charge.metadata.package,
                        "customer_email": charge.metadata.customer_email,
                        "customer_name": charge.metadata.customer_name,
                        "amount_cents": facts.amount_cents,
                        "currency": facts.currency,
                    })),
            )
            .await
        {
            tracing::warn!(error = %e, "Failed to log crypto charge created event");
        }

        self.fulfillment.upsert_placeholder_invoice(&facts).await
    }

    async fn handle_crypto_confirmed(&self, charge: Charge) -> PaymentsResult<()> {
        tracing::info!(charge_id = %charge.id, "Crypto payment confirmed");

        let facts = crypto_charge_facts(&charge);
        let outcome = self.fulfillment.confirm_payment(&facts).await?;

        let payment = charge.payments.first();
        if let Err(e) = self
            .analytics
            .log_event(
                AnalyticsEventBuilder::new("crypto_payment_confirmed")
                    .page("/api/crypto/webhook")
                    .session_id(&charge.id)
                    .properties(serde_json::json!({
                        "provider": "coinbase_commerce",
                        "package": charge.metadata.package,
                        "amount_cents": facts.amount_cents,
                        "currency": facts.currency,
                        "crypto_currency": payment.map(|p| p.value.crypto.currency.clone()),
                        "crypto_amount": payment.map(|p| p.value.crypto.amount.clone()),
                        "transaction_hash": payment.and_then(|p| p.transaction_id.clone()),
                        "degraded": outcome.degraded,
                    })),
            )
            .await
        {
            tracing::warn!(error = %e, "Failed to log crypto payment confirmed event");
        }

        Ok(())
    }

    async fn project_crypto_status(
        &self,
        charge: &Charge,
        status: InvoiceStatus,
        event_name: &str,
    ) -> PaymentsResult<()> {
        let rows = self
            .fulfillment
            .project_invoice_status(&charge.id, status)
            .await?;
        tracing::warn!(
            charge_id = %charge.id,
            status = status.as_str(),
            invoices_updated = rows,
            "Crypto charge reached a non-success state"
        );

        let facts = crypto_charge_facts(charge);
        if let Err(e) = self
            .analytics
            .log_event(
                AnalyticsEventBuilder::new(event_name)
                    .page("/api/crypto/webhook")
                    .session_id(&charge.id)
                    .properties(serde_json::json!({
                        "provider": "coinbase_commerce",
                        "package": charge.metadata.package,
                        "amount_cents": facts.amount_cents,
                        "currency": facts.currency,
                    })),
            )
            .await
        {
            tracing::warn!(error = %e, "Failed to log crypto status event");
        }

        Ok(())
    }
}

/// Build the provider-neutral charge snapshot from a crypto charge.
pub(crate) fn crypto_charge_facts(charge: &Charge) -> ChargeFacts {
    ChargeFacts {
        invoice_number: derive_invoice_number(CRYPTO_INVOICE_PREFIX, &charge.id),
        external_ref: charge.id.clone(),
        charge_id: charge.id.clone(),
        package: charge.package(),
        customer_email: charge.metadata.customer_email.clone(),
        customer_name: charge.metadata.customer_name.clone(),
        amount_cents: charge.pricing.local.minor_units(),
        currency: if charge.pricing.local.currency.is_empty() {
            "eur".to_string()
        } else {
            charge.pricing.local.currency.clone()
        },
        source: "coinbase_commerce",
    }
}
