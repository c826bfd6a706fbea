// Test file - these are expected patterns in test code
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

//! Edge Case Tests for the Payments Flow
//!
//! Tests critical boundary conditions in:
//! - Package catalog (PAY-P01 to PAY-P05)
//! - Invoice number derivation (PAY-N01 to PAY-N03)
//! - Webhook signatures (PAY-W01 to PAY-W05)
//! - Crypto event dispatch (PAY-E01 to PAY-E06)
//! - Amount conversion (PAY-M01 to PAY-M04)

#[cfg(test)]
mod package_tests {
    use crate::packages::Package;
    use atelier_shared::types::ProjectType;

    // =========================================================================
    // PAY-P01: Unknown package id - rejected before any provider call
    // =========================================================================
    #[test]
    fn test_unknown_package_rejected() {
        assert_eq!(Package::parse("premium"), None);
        assert_eq!(Package::parse("vitrine"), None);
        assert_eq!(Package::parse(""), None);
    }

    // =========================================================================
    // PAY-P02: Ids accepted in both cases (API uses lowercase, crypto
    // metadata historically uppercase)
    // =========================================================================
    #[test]
    fn test_package_id_case_insensitive() {
        assert_eq!(Package::parse("boutique"), Some(Package::Boutique));
        assert_eq!(Package::parse("BOUTIQUE"), Some(Package::Boutique));
        assert_eq!(Package::parse("Professionnel"), Some(Package::Professionnel));
    }

    // =========================================================================
    // PAY-P03: Timeline tiers are exactly 10/14/21 days
    // =========================================================================
    #[test]
    fn test_timeline_tiers() {
        assert_eq!(Package::Essentiel.timeline_days(), 10);
        assert_eq!(Package::Professionnel.timeline_days(), 14);
        assert_eq!(Package::Boutique.timeline_days(), 21);
    }

    // =========================================================================
    // PAY-P04: Boutique is the only e-commerce classification
    // =========================================================================
    #[test]
    fn test_project_type_classification() {
        let ecommerce: Vec<Package> = Package::ALL
            .into_iter()
            .filter(|p| p.project_type() == ProjectType::Ecommerce)
            .collect();
        assert_eq!(ecommerce, vec![Package::Boutique]);
    }

    // =========================================================================
    // PAY-P05: Prices are ordered by tier
    // =========================================================================
    #[test]
    fn test_prices_ordered_by_tier() {
        assert!(Package::Essentiel.price_cents() < Package::Professionnel.price_cents());
        assert!(Package::Professionnel.price_cents() < Package::Boutique.price_cents());
    }
}

#[cfg(test)]
mod invoice_number_tests {
    use crate::fulfillment::{
        derive_invoice_number, CARD_INVOICE_PREFIX, CRYPTO_INVOICE_PREFIX,
    };

    // =========================================================================
    // PAY-N01: Number is a pure function of the charge id
    // =========================================================================
    #[test]
    fn test_number_is_deterministic() {
        assert_eq!(
            derive_invoice_number(CRYPTO_INVOICE_PREFIX, "ch_abc"),
            derive_invoice_number(CRYPTO_INVOICE_PREFIX, "ch_abc"),
        );
    }

    // =========================================================================
    // PAY-N02: Distinct charge ids derive distinct numbers
    // =========================================================================
    #[test]
    fn test_distinct_charges_distinct_numbers() {
        assert_ne!(
            derive_invoice_number(CRYPTO_INVOICE_PREFIX, "ch_1"),
            derive_invoice_number(CRYPTO_INVOICE_PREFIX, "ch_2"),
        );
    }

    // =========================================================================
    // PAY-N03: Providers never collide even for the same raw id
    // =========================================================================
    #[test]
    fn test_provider_prefixes_never_collide() {
        assert_ne!(
            derive_invoice_number(CRYPTO_INVOICE_PREFIX, "x1"),
            derive_invoice_number(CARD_INVOICE_PREFIX, "x1"),
        );
    }
}

#[cfg(test)]
mod webhook_signature_tests {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    use crate::coinbase::{CoinbaseClient, CoinbaseConfig};

    fn client(secret: &str) -> CoinbaseClient {
        CoinbaseClient::new(CoinbaseConfig {
            api_key: "test-key".to_string(),
            webhook_secret: secret.to_string(),
        })
    }

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    // =========================================================================
    // PAY-W01: Valid signature over exact raw bytes - accepted
    // =========================================================================
    #[test]
    fn test_valid_signature_accepted() {
        let body = br#"{"type":"charge:confirmed","data":{"id":"ch_1"}}"#;
        let signature = sign("whsec_x", body);
        assert!(client("whsec_x").verify_webhook_signature(body, &signature).is_ok());
    }

    // =========================================================================
    // PAY-W02: Payload {} with signature header "bad" - rejected
    // =========================================================================
    #[test]
    fn test_bad_signature_rejected() {
        assert!(client("whsec_x").verify_webhook_signature(b"{}", "bad").is_err());
    }

    // =========================================================================
    // PAY-W03: Empty signature header - rejected
    // =========================================================================
    #[test]
    fn test_empty_signature_rejected() {
        assert!(client("whsec_x").verify_webhook_signature(b"{}", "").is_err());
    }

    // =========================================================================
    // PAY-W04: Signature from another secret - rejected
    // =========================================================================
    #[test]
    fn test_wrong_secret_rejected() {
        let body = b"{}";
        let signature = sign("other-secret", body);
        assert!(client("whsec_x").verify_webhook_signature(body, &signature).is_err());
    }

    // =========================================================================
    // PAY-W05: Signature over different bytes - rejected (tamper check)
    // =========================================================================
    #[test]
    fn test_tampered_body_rejected() {
        let signature = sign("whsec_x", br#"{"amount":"10.00"}"#);
        assert!(client("whsec_x")
            .verify_webhook_signature(br#"{"amount":"99.00"}"#, &signature)
            .is_err());
    }
}

#[cfg(test)]
mod crypto_event_tests {
    use crate::coinbase::CryptoEvent;
    use crate::packages::Package;
    use crate::webhooks::crypto_charge_facts;

    // =========================================================================
    // PAY-E01: All five known event types map to their variants
    // =========================================================================
    #[test]
    fn test_known_event_types() {
        let cases = [
            ("charge:created", "ChargeCreated"),
            ("charge:confirmed", "ChargeConfirmed"),
            ("charge:failed", "ChargeFailed"),
            ("charge:delayed", "ChargeDelayed"),
            ("charge:pending", "ChargePending"),
        ];

        for (event_type, variant) in cases {
            let body = format!(r#"{{"type":"{event_type}","data":{{"id":"ch_1"}}}}"#);
            let parsed = CryptoEvent::parse(body.as_bytes()).unwrap();
            let debug = format!("{parsed:?}");
            assert!(
                debug.starts_with(variant),
                "{event_type} should parse to {variant}, got {debug}"
            );
        }
    }

    // =========================================================================
    // PAY-E02: Unknown type - preserved, not an error
    // =========================================================================
    #[test]
    fn test_unknown_event_preserved() {
        let body = br#"{"type":"charge:disputed","data":{"id":"ch_1"}}"#;
        match CryptoEvent::parse(body).unwrap() {
            CryptoEvent::Unknown { event_type } => assert_eq!(event_type, "charge:disputed"),
            other => panic!("expected Unknown, got {other:?}"),
        }
    }

    // =========================================================================
    // PAY-E03: Missing data object on a known type - rejected
    // =========================================================================
    #[test]
    fn test_known_type_without_charge_rejected() {
        let body = br#"{"type":"charge:confirmed"}"#;
        assert!(CryptoEvent::parse(body).is_err());
    }

    // =========================================================================
    // PAY-E04: Facts derive the CB- invoice number from the charge id
    // =========================================================================
    #[test]
    fn test_facts_derive_invoice_number() {
        let body = br#"{"type":"charge:confirmed","data":{"id":"ch_42","pricing":{"local":{"amount":"2499.00","currency":"EUR"}},"metadata":{"package":"professionnel","customer_email":"a@b.com","customer_name":"Alice"}}}"#;
        let charge = match CryptoEvent::parse(body).unwrap() {
            CryptoEvent::ChargeConfirmed(charge) => charge,
            other => panic!("expected ChargeConfirmed, got {other:?}"),
        };

        let facts = crypto_charge_facts(&charge);
        assert_eq!(facts.invoice_number, "CB-ch_42");
        assert_eq!(facts.external_ref, "ch_42");
        assert_eq!(facts.package, Some(Package::Professionnel));
        assert_eq!(facts.amount_cents, 249_900);
        assert_eq!(facts.customer_email.as_deref(), Some("a@b.com"));
        assert_eq!(facts.source, "coinbase_commerce");
    }

    // =========================================================================
    // PAY-E05: Redelivered payload derives identical facts (idempotence
    // rests on the keys being pure functions of the payload)
    // =========================================================================
    #[test]
    fn test_redelivery_derives_identical_keys() {
        let body = br#"{"type":"charge:confirmed","data":{"id":"ch_7","metadata":{"customer_email":"x@y.z"}}}"#;
        let first = match CryptoEvent::parse(body).unwrap() {
            CryptoEvent::ChargeConfirmed(charge) => crypto_charge_facts(&charge),
            other => panic!("unexpected {other:?}"),
        };
        let second = match CryptoEvent::parse(body).unwrap() {
            CryptoEvent::ChargeConfirmed(charge) => crypto_charge_facts(&charge),
            other => panic!("unexpected {other:?}"),
        };

        assert_eq!(first.invoice_number, second.invoice_number);
        assert_eq!(first.customer_email, second.customer_email);
    }

    // =========================================================================
    // PAY-E06: Missing currency falls back to eur
    // =========================================================================
    #[test]
    fn test_missing_currency_defaults_to_eur() {
        let body = br#"{"type":"charge:created","data":{"id":"ch_8"}}"#;
        let charge = match CryptoEvent::parse(body).unwrap() {
            CryptoEvent::ChargeCreated(charge) => charge,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(crypto_charge_facts(&charge).currency, "eur");
    }
}

#[cfg(test)]
mod amount_tests {
    use crate::coinbase::Money;

    fn money(amount: &str) -> Money {
        Money {
            amount: amount.to_string(),
            currency: "EUR".to_string(),
        }
    }

    // =========================================================================
    // PAY-M01: Whole euro amounts convert exactly
    // =========================================================================
    #[test]
    fn test_whole_amount_converts_exactly() {
        assert_eq!(money("1499.00").minor_units(), 149_900);
    }

    // =========================================================================
    // PAY-M02: Sub-cent amounts round to the nearest cent
    // =========================================================================
    #[test]
    fn test_sub_cent_rounds() {
        assert_eq!(money("10.005").minor_units(), 1_001);
        assert_eq!(money("10.004").minor_units(), 1_000);
    }

    // =========================================================================
    // PAY-M03: Unparseable amount becomes zero, not a panic
    // =========================================================================
    #[test]
    fn test_garbage_amount_is_zero() {
        assert_eq!(money("").minor_units(), 0);
        assert_eq!(money("n/a").minor_units(), 0);
    }

    // =========================================================================
    // PAY-M04: Zero-decimal string converts to zero
    // =========================================================================
    #[test]
    fn test_zero_amount() {
        assert_eq!(money("0.00").minor_units(), 0);
    }
}
