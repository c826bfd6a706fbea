//! Coinbase Commerce client and webhook event model
//!
//! Coinbase Commerce has no maintained Rust SDK, so this is a thin
//! `reqwest` client plus HMAC-SHA256 webhook verification. Signatures
//! are computed over the exact raw body bytes, which is why the webhook
//! route hands this module the unparsed payload.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{PaymentsError, PaymentsResult};
use crate::packages::Package;

type HmacSha256 = Hmac<Sha256>;

const API_BASE: &str = "https://api.commerce.coinbase.com";
const API_VERSION: &str = "2018-03-22";

/// Coinbase Commerce configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct CoinbaseConfig {
    pub api_key: String,
    pub webhook_secret: String,
}

impl CoinbaseConfig {
    pub fn from_env() -> PaymentsResult<Self> {
        let api_key = std::env::var("COINBASE_COMMERCE_API_KEY").map_err(|_| {
            PaymentsError::Configuration("COINBASE_COMMERCE_API_KEY not set".to_string())
        })?;
        let webhook_secret = std::env::var("COINBASE_COMMERCE_WEBHOOK_SECRET").map_err(|_| {
            PaymentsError::Configuration("COINBASE_COMMERCE_WEBHOOK_SECRET not set".to_string())
        })?;

        Ok(Self {
            api_key,
            webhook_secret,
        })
    }
}

/// Monetary amount as Coinbase reports it: a decimal string plus currency.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Money {
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub currency: String,
}

impl Money {
    /// Convert the decimal amount to integer minor units, rounding.
    /// Unparseable amounts become zero, matching the defensive reading
    /// of provider payloads elsewhere in the webhook path.
    pub fn minor_units(&self) -> i64 {
        match self.amount.parse::<f64>() {
            Ok(value) => (value * 100.0).round() as i64,
            Err(_) => 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChargePricing {
    #[serde(default)]
    pub local: Money,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentValue {
    #[serde(default)]
    pub crypto: Money,
}

/// One on-chain payment attached to a charge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChargePayment {
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub value: PaymentValue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChargeMetadata {
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
}

/// A Coinbase Commerce charge, as delivered in API responses and
/// webhook payloads. The provider owns this object; our copy is a
/// cache refreshed by webhook delivery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Charge {
    pub id: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub hosted_url: Option<String>,
    #[serde(default)]
    pub pricing: ChargePricing,
    #[serde(default)]
    pub metadata: ChargeMetadata,
    #[serde(default)]
    pub payments: Vec<ChargePayment>,
}

impl Charge {
    pub fn package(&self) -> Option<Package> {
        self.metadata.package.as_deref().and_then(Package::parse)
    }
}

/// Crypto webhook events, keyed by the provider's `type` string.
///
/// Unknown types are preserved (not an error): the dispatcher logs and
/// acknowledges them so the provider does not retry.
#[derive(Debug, Clone)]
pub enum CryptoEvent {
    ChargeCreated(Charge),
    ChargeConfirmed(Charge),
    ChargeFailed(Charge),
    ChargeDelayed(Charge),
    ChargePending(Charge),
    Unknown { event_type: String },
}

#[derive(Debug, Deserialize)]
struct RawCryptoEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl CryptoEvent {
    /// Parse a verified webhook body into a typed event.
    pub fn parse(body: &[u8]) -> PaymentsResult<CryptoEvent> {
        let raw: RawCryptoEvent = serde_json::from_slice(body)
            .map_err(|e| PaymentsError::InvalidInput(format!("malformed webhook body: {e}")))?;

        let charge = |data: serde_json::Value| -> PaymentsResult<Charge> {
            serde_json::from_value(data)
                .map_err(|e| PaymentsError::InvalidInput(format!("malformed charge object: {e}")))
        };

        Ok(match raw.event_type.as_str() {
            "charge:created" => CryptoEvent::ChargeCreated(charge(raw.data)?),
            "charge:confirmed" => CryptoEvent::ChargeConfirmed(charge(raw.data)?),
            "charge:failed" => CryptoEvent::ChargeFailed(charge(raw.data)?),
            "charge:delayed" => CryptoEvent::ChargeDelayed(charge(raw.data)?),
            "charge:pending" => CryptoEvent::ChargePending(charge(raw.data)?),
            _ => CryptoEvent::Unknown {
                event_type: raw.event_type,
            },
        })
    }
}

#[derive(Debug, Serialize)]
struct CreateChargeRequest {
    name: String,
    description: String,
    pricing_type: &'static str,
    local_price: Money,
    metadata: ChargeMetadata,
}

#[derive(Debug, Deserialize)]
struct ChargeEnvelope {
    data: Charge,
}

/// Customer identity attached to a crypto charge.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CryptoCustomer {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Coinbase Commerce API client.
#[derive(Clone)]
pub struct CoinbaseClient {
    http: reqwest::Client,
    config: Arc<CoinbaseConfig>,
    base_url: String,
}

impl CoinbaseClient {
    pub fn new(config: CoinbaseConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config: Arc::new(config),
            base_url: API_BASE.to_string(),
        }
    }

    pub fn from_env() -> PaymentsResult<Self> {
        Ok(Self::new(CoinbaseConfig::from_env()?))
    }

    pub fn config(&self) -> &CoinbaseConfig {
        &self.config
    }

    /// Create a fixed-price charge for a package.
    pub async fn create_package_charge(
        &self,
        package: Package,
        customer: &CryptoCustomer,
    ) -> PaymentsResult<Charge> {
        let request = CreateChargeRequest {
            name: package.display_name().to_string(),
            description: package.description().to_string(),
            pricing_type: "fixed_price",
            local_price: Money {
                amount: format!("{:.2}", package.price_cents() as f64 / 100.0),
                currency: "EUR".to_string(),
            },
            metadata: ChargeMetadata {
                package: Some(package.id().to_string()),
                customer_email: Some(customer.email.clone()),
                customer_name: customer.name.clone(),
            },
        };

        let response = self
            .http
            .post(format!("{}/charges", self.base_url))
            .header("X-CC-Api-Key", &self.config.api_key)
            .header("X-CC-Version", API_VERSION)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentsError::CoinbaseApi(format!(
                "charge creation failed with {status}: {body}"
            )));
        }

        let envelope: ChargeEnvelope = response.json().await?;
        Ok(envelope.data)
    }

    /// Fetch a charge by id.
    pub async fn get_charge(&self, charge_id: &str) -> PaymentsResult<Charge> {
        let response = self
            .http
            .get(format!("{}/charges/{charge_id}", self.base_url))
            .header("X-CC-Api-Key", &self.config.api_key)
            .header("X-CC-Version", API_VERSION)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(PaymentsError::NotFound(format!("charge {charge_id}")));
        }
        if !response.status().is_success() {
            return Err(PaymentsError::CoinbaseApi(format!(
                "charge fetch failed with {}",
                response.status()
            )));
        }

        let envelope: ChargeEnvelope = response.json().await?;
        Ok(envelope.data)
    }

    /// Verify the `x-cc-webhook-signature` header against the raw body.
    ///
    /// The signature is hex-encoded HMAC-SHA256 of the exact body bytes;
    /// comparison is constant-time via `Mac::verify_slice`.
    pub fn verify_webhook_signature(&self, body: &[u8], signature: &str) -> PaymentsResult<()> {
        verify_signature(self.config.webhook_secret.as_bytes(), body, signature)
    }
}

fn verify_signature(secret: &[u8], body: &[u8], signature: &str) -> PaymentsResult<()> {
    let expected = hex::decode(signature.trim()).map_err(|_| {
        tracing::warn!("webhook signature header is not valid hex");
        PaymentsError::WebhookSignatureInvalid
    })?;

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|_| PaymentsError::WebhookSignatureInvalid)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| PaymentsError::WebhookSignatureInvalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &[u8], body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_valid_signature_accepted() {
        let secret = b"whsec_test";
        let body = br#"{"type":"charge:confirmed","data":{"id":"ch_1"}}"#;
        let signature = sign(secret, body);

        assert!(verify_signature(secret, body, &signature).is_ok());
    }

    #[test]
    fn test_bad_signature_rejected() {
        let secret = b"whsec_test";
        assert!(matches!(
            verify_signature(secret, b"{}", "bad"),
            Err(PaymentsError::WebhookSignatureInvalid)
        ));
    }

    #[test]
    fn test_signature_over_different_body_rejected() {
        let secret = b"whsec_test";
        let signature = sign(secret, b"{\"a\":1}");
        assert!(verify_signature(secret, b"{\"a\":2}", &signature).is_err());
    }

    #[test]
    fn test_signature_with_wrong_secret_rejected() {
        let body = b"{}";
        let signature = sign(b"secret-a", body);
        assert!(verify_signature(b"secret-b", body, &signature).is_err());
    }

    #[test]
    fn test_event_parse_known_types() {
        let body = br#"{"type":"charge:created","data":{"id":"ch_9","pricing":{"local":{"amount":"1499.00","currency":"EUR"}},"metadata":{"package":"essentiel","customer_email":"a@b.com"}}}"#;
        let event = CryptoEvent::parse(body).unwrap();
        match event {
            CryptoEvent::ChargeCreated(charge) => {
                assert_eq!(charge.id, "ch_9");
                assert_eq!(charge.pricing.local.minor_units(), 149_900);
                assert_eq!(charge.package(), Some(Package::Essentiel));
            }
            other => panic!("expected ChargeCreated, got {other:?}"),
        }
    }

    #[test]
    fn test_event_parse_unknown_type_is_not_an_error() {
        let body = br#"{"type":"charge:resolved","data":{"id":"ch_1"}}"#;
        match CryptoEvent::parse(body).unwrap() {
            CryptoEvent::Unknown { event_type } => assert_eq!(event_type, "charge:resolved"),
            other => panic!("expected Unknown, got {other:?}"),
        }
    }

    #[test]
    fn test_event_parse_malformed_body_rejected() {
        assert!(CryptoEvent::parse(b"not json").is_err());
    }

    #[test]
    fn test_minor_units_rounding() {
        let money = Money {
            amount: "1499.005".to_string(),
            currency: "EUR".to_string(),
        };
        assert_eq!(money.minor_units(), 149_901);

        let garbage = Money {
            amount: "n/a".to_string(),
            currency: "EUR".to_string(),
        };
        assert_eq!(garbage.minor_units(), 0);
    }

    #[test]
    fn test_charge_payment_fields_default() {
        let body = br#"{"type":"charge:confirmed","data":{"id":"ch_2","payments":[{"transaction_id":"0xabc","value":{"crypto":{"amount":"0.42","currency":"ETH"}}}]}}"#;
        match CryptoEvent::parse(body).unwrap() {
            CryptoEvent::ChargeConfirmed(charge) => {
                let payment = charge.payments.first().unwrap();
                assert_eq!(payment.transaction_id.as_deref(), Some("0xabc"));
                assert_eq!(payment.value.crypto.currency, "ETH");
            }
            other => panic!("expected ChargeConfirmed, got {other:?}"),
        }
    }
}
