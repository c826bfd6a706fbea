//! Checkout session and charge creation
//!
//! Card checkout goes through Stripe checkout sessions; crypto goes
//! through Coinbase Commerce charges. Both validate the package id
//! before any provider call, and the card path records a preliminary
//! contact row tagged with the session id for follow-up.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use atelier_shared::types::ContactStatus;

use crate::client::StripeClient;
use crate::coinbase::{Charge, CoinbaseClient, CryptoCustomer};
use crate::error::{PaymentsError, PaymentsResult};
use crate::packages::Package;

/// Customer details submitted with a checkout request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerInfo {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CardCheckoutResponse {
    pub session_id: String,
    pub url: Option<String>,
    pub customer_id: String,
    pub customer_email: Option<String>,
}

/// Sanitized view of a checkout session, safe to return to the browser.
#[derive(Debug, Serialize)]
pub struct SafeSession {
    pub id: String,
    pub status: Option<String>,
    pub payment_status: String,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub created: i64,
}

#[derive(Clone)]
pub struct CheckoutService {
    stripe: StripeClient,
    coinbase: CoinbaseClient,
    pool: PgPool,
}

impl CheckoutService {
    pub fn new(stripe: StripeClient, coinbase: CoinbaseClient, pool: PgPool) -> Self {
        Self {
            stripe,
            coinbase,
            pool,
        }
    }

    /// Create a Stripe checkout session for a package.
    ///
    /// The package is validated first: an unknown id fails before any
    /// provider call and before any contact row is written.
    pub async fn create_card_checkout(
        &self,
        package_id: &str,
        customer: &CustomerInfo,
        success_url: &str,
        cancel_url: &str,
    ) -> PaymentsResult<CardCheckoutResponse> {
        let package = Package::parse(package_id)
            .ok_or_else(|| PaymentsError::InvalidInput(format!("unknown package: {package_id}")))?;

        if customer.email.is_empty() {
            return Err(PaymentsError::InvalidInput(
                "customer email is required".to_string(),
            ));
        }

        let stripe_customer = self.find_or_create_customer(customer).await?;

        let metadata = checkout_metadata(package, customer);
        let expires_at = time::OffsetDateTime::now_utc().unix_timestamp() + 24 * 60 * 60;

        let mut params = stripe::CreateCheckoutSession::new();
        params.mode = Some(stripe::CheckoutSessionMode::Payment);
        params.customer = Some(stripe_customer.id.clone());
        params.payment_method_types = Some(vec![
            stripe::CreateCheckoutSessionPaymentMethodTypes::Card,
        ]);
        params.line_items = Some(vec![stripe::CreateCheckoutSessionLineItems {
            price_data: Some(stripe::CreateCheckoutSessionLineItemsPriceData {
                currency: stripe::Currency::EUR,
                product_data: Some(
                    stripe::CreateCheckoutSessionLineItemsPriceDataProductData {
                        name: package.display_name().to_string(),
                        description: Some(package.description().to_string()),
                        metadata: Some(product_metadata(package)),
                        ..Default::default()
                    },
                ),
                unit_amount: Some(package.price_cents()),
                ..Default::default()
            }),
            quantity: Some(1),
            ..Default::default()
        }]);
        params.success_url = Some(success_url);
        params.cancel_url = Some(cancel_url);
        params.metadata = Some(metadata.clone());
        params.payment_intent_data = Some(stripe::CreateCheckoutSessionPaymentIntentData {
            metadata: Some(metadata),
            ..Default::default()
        });
        params.expires_at = Some(expires_at);

        let session = stripe::CheckoutSession::create(self.stripe.inner(), params).await?;

        self.record_preliminary_contact(package, customer, session.id.as_str())
            .await?;

        Ok(CardCheckoutResponse {
            session_id: session.id.to_string(),
            url: session.url.clone(),
            customer_id: stripe_customer.id.to_string(),
            customer_email: stripe_customer.email.clone(),
        })
    }

    /// Retrieve a sanitized checkout session by id.
    pub async fn retrieve_card_session(&self, session_id: &str) -> PaymentsResult<SafeSession> {
        let id = session_id
            .parse::<stripe::CheckoutSessionId>()
            .map_err(|_| PaymentsError::InvalidInput(format!("invalid session id: {session_id}")))?;

        let session = stripe::CheckoutSession::retrieve(self.stripe.inner(), &id, &[])
            .await
            .map_err(|_| PaymentsError::NotFound(format!("session {session_id}")))?;

        Ok(SafeSession {
            id: session.id.to_string(),
            status: session.status.map(|s| format!("{s:?}").to_lowercase()),
            payment_status: format!("{:?}", session.payment_status).to_lowercase(),
            customer_email: session
                .customer_details
                .as_ref()
                .and_then(|d| d.email.clone()),
            customer_name: session
                .customer_details
                .as_ref()
                .and_then(|d| d.name.clone()),
            amount_total: session.amount_total,
            currency: session.currency.map(|c| c.to_string()),
            created: session.created,
        })
    }

    /// Create a Coinbase Commerce charge for a package.
    pub async fn create_crypto_charge(
        &self,
        package_id: &str,
        customer: &CryptoCustomer,
    ) -> PaymentsResult<Charge> {
        let package = Package::parse(package_id)
            .ok_or_else(|| PaymentsError::InvalidInput(format!("unknown package: {package_id}")))?;

        self.coinbase.create_package_charge(package, customer).await
    }

    /// Fetch a crypto charge by id.
    pub async fn get_crypto_charge(&self, charge_id: &str) -> PaymentsResult<Charge> {
        self.coinbase.get_charge(charge_id).await
    }

    async fn find_or_create_customer(
        &self,
        customer: &CustomerInfo,
    ) -> PaymentsResult<stripe::Customer> {
        let mut list = stripe::ListCustomers::new();
        list.email = Some(&customer.email);
        list.limit = Some(1);

        let existing = stripe::Customer::list(self.stripe.inner(), &list).await?;
        if let Some(found) = existing.data.into_iter().next() {
            return Ok(found);
        }

        let mut metadata = stripe::Metadata::new();
        metadata.insert(
            "company".to_string(),
            customer.company.clone().unwrap_or_default(),
        );
        metadata.insert("source".to_string(), "atelier_website".to_string());

        let mut params = stripe::CreateCustomer::new();
        params.email = Some(&customer.email);
        params.name = customer.name.as_deref();
        params.phone = customer.phone.as_deref();
        params.metadata = Some(metadata);

        Ok(stripe::Customer::create(self.stripe.inner(), params).await?)
    }

    /// Track the checkout attempt as a lead.
    ///
    /// Upsert by email: a brand-new visitor gets a NEW contact, a known
    /// one keeps their current status and just gets the session note.
    async fn record_preliminary_contact(
        &self,
        package: Package,
        customer: &CustomerInfo,
        session_id: &str,
    ) -> PaymentsResult<()> {
        let message = format!(
            "Commande {} - Session Stripe: {session_id}",
            package.display_name()
        );

        sqlx::query(
            r#"
            INSERT INTO contacts
                (email, name, phone, company, message, project_type,
                 budget_cents, status, source)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'stripe_checkout')
            ON CONFLICT (email) DO UPDATE SET
                message = EXCLUDED.message,
                updated_at = NOW()
            "#,
        )
        .bind(&customer.email)
        .bind(customer.name.clone().unwrap_or_else(|| "Client".to_string()))
        .bind(customer.phone.clone().unwrap_or_default())
        .bind(customer.company.clone().unwrap_or_default())
        .bind(&message)
        .bind(package.project_type().as_str())
        .bind(package.price_cents())
        .bind(ContactStatus::New.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Descriptive metadata shown on the Stripe product line.
fn product_metadata(package: Package) -> stripe::Metadata {
    let mut metadata = stripe::Metadata::new();
    metadata.insert("package_id".to_string(), package.id().to_string());
    metadata.insert(
        "delivery_days".to_string(),
        package.timeline_days().to_string(),
    );
    metadata.insert("revisions".to_string(), package.revisions().to_string());
    metadata.insert(
        "guarantee_days".to_string(),
        package.guarantee_days().to_string(),
    );
    metadata
}

/// Metadata attached to both the checkout session and its payment
/// intent, so webhook handlers can rebuild the order from either.
fn checkout_metadata(package: Package, customer: &CustomerInfo) -> stripe::Metadata {
    let mut metadata = stripe::Metadata::new();
    metadata.insert("package_id".to_string(), package.id().to_string());
    metadata.insert(
        "package_name".to_string(),
        package.display_name().to_string(),
    );
    metadata.insert(
        "project_type".to_string(),
        package.project_type().as_str().to_string(),
    );
    metadata.insert(
        "customer_email".to_string(),
        customer.email.clone(),
    );
    metadata.insert(
        "customer_name".to_string(),
        customer.name.clone().unwrap_or_default(),
    );
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_metadata_carries_order_identity() {
        let customer = CustomerInfo {
            email: "a@b.com".to_string(),
            name: Some("Alice".to_string()),
            phone: None,
            company: None,
        };
        let metadata = checkout_metadata(Package::Boutique, &customer);

        assert_eq!(metadata.get("package_id").map(String::as_str), Some("boutique"));
        assert_eq!(
            metadata.get("project_type").map(String::as_str),
            Some("ECOMMERCE")
        );
        assert_eq!(
            metadata.get("customer_email").map(String::as_str),
            Some("a@b.com")
        );
    }
}
