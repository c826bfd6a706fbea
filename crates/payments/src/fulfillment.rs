//! Order fulfillment: the webhook reconciliation core
//!
//! Webhook delivery is at-least-once and the two providers can redeliver
//! or reorder events, so every write here is a single atomic statement
//! keyed by a value that is a pure function of immutable external data:
//! the contact's unique email, the project's unique contact id, and an
//! invoice number derived from the charge id. Re-running any handler
//! with the same input converges to the same terminal state. The only
//! non-idempotent write in the flow is the append-only analytics trail,
//! which lives outside this module.

use sqlx::PgPool;
use uuid::Uuid;

use atelier_shared::retry::retry_db;
use atelier_shared::types::{ContactStatus, InvoiceStatus};

use crate::error::{PaymentsError, PaymentsResult};
use crate::packages::Package;

/// Invoice number prefix for crypto charges.
pub const CRYPTO_INVOICE_PREFIX: &str = "CB";

/// Invoice number prefix for card checkout sessions.
pub const CARD_INVOICE_PREFIX: &str = "ST";

/// Derive the unique invoice number for an external charge id.
pub fn derive_invoice_number(prefix: &str, charge_id: &str) -> String {
    format!("{prefix}-{charge_id}")
}

/// Provider-neutral snapshot of one charge, built by the webhook
/// handlers from whichever payload shape their provider delivers.
#[derive(Debug, Clone)]
pub struct ChargeFacts {
    /// Immutable provider charge/session id; the invoice number derives
    /// from it.
    pub charge_id: String,
    /// Id that later status events for the same payment will carry
    /// (payment-intent id for card, charge id for crypto).
    pub external_ref: String,
    pub invoice_number: String,
    pub package: Option<Package>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    /// Integer minor-currency units.
    pub amount_cents: i64,
    pub currency: String,
    /// Acquisition tag stored on the contact ("stripe_payment",
    /// "coinbase_commerce").
    pub source: &'static str,
}

/// What a confirmation pass actually did; callers log it.
#[derive(Debug, Clone, Default)]
pub struct ConfirmOutcome {
    pub invoices_marked_paid: u64,
    pub contact_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    /// True when owner or contact resolution failed and project/invoice
    /// bookkeeping was skipped. The payment itself still succeeded.
    pub degraded: bool,
}

#[derive(Clone)]
pub struct FulfillmentService {
    pool: PgPool,
    /// Env-pinned project owner; falls back to the first ADMIN user.
    admin_user_id: Option<Uuid>,
}

impl FulfillmentService {
    pub fn new(pool: PgPool, admin_user_id: Option<Uuid>) -> Self {
        Self {
            pool,
            admin_user_id,
        }
    }

    /// Set the status of any invoice matching the external charge id.
    ///
    /// Zero matched rows is a normal outcome: no placeholder existed yet.
    /// Pure status assignment, so redelivery and reordering reduce to
    /// last-write-wins.
    pub async fn project_invoice_status(
        &self,
        external_ref: &str,
        status: InvoiceStatus,
    ) -> PaymentsResult<u64> {
        let pool = self.pool.clone();
        let rows = retry_db(|| {
            let pool = pool.clone();
            async move {
                sqlx::query(
                    r#"
                    UPDATE invoices
                    SET status = $2,
                        paid_date = CASE WHEN $2 = 'PAID' THEN NOW() ELSE paid_date END,
                        updated_at = NOW()
                    WHERE external_charge_id = $1
                    "#,
                )
                .bind(external_ref)
                .bind(status.as_str())
                .execute(&pool)
                .await
                .map(|r| r.rows_affected())
            }
        })
        .await?;

        Ok(rows)
    }

    /// Write the placeholder invoice for a freshly created charge.
    ///
    /// Keyed by the derived number, so a redelivered created event is a
    /// no-op instead of a duplicate row.
    pub async fn upsert_placeholder_invoice(&self, facts: &ChargeFacts) -> PaymentsResult<()> {
        let pool = self.pool.clone();
        retry_db(|| {
            let pool = pool.clone();
            let facts = facts.clone();
            async move {
                sqlx::query(
                    r#"
                    INSERT INTO invoices
                        (number, subtotal_cents, tax_cents, total_cents, currency,
                         status, external_charge_id, due_date)
                    VALUES ($1, $2, 0, $2, $3, $4, $5, NOW())
                    ON CONFLICT (number) DO NOTHING
                    "#,
                )
                .bind(&facts.invoice_number)
                .bind(facts.amount_cents)
                .bind(facts.currency.to_lowercase())
                .bind(InvoiceStatus::Sent.as_str())
                .bind(&facts.external_ref)
                .execute(&pool)
                .await
                .map(|_| ())
            }
        })
        .await?;

        Ok(())
    }

    /// Resolve-or-create the contact for a confirmed payment.
    ///
    /// One atomic statement keyed on the unique email: an existing lead
    /// transitions to WON with a refreshed name, a new customer is
    /// created already WON. Split read-then-branch variants of this are
    /// unsafe under concurrent redelivery and are not used anywhere.
    pub async fn upsert_won_contact(&self, facts: &ChargeFacts) -> PaymentsResult<Uuid> {
        let email = facts
            .customer_email
            .as_deref()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                PaymentsError::InvalidInput("charge metadata has no customer email".to_string())
            })?;

        let name = facts
            .customer_name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Client".to_string());
        let project_type = facts
            .package
            .map(|p| p.project_type())
            .unwrap_or(atelier_shared::types::ProjectType::SiteVitrine);
        let message = match facts.package {
            Some(package) => format!("Commande {} payee ({})", package.display_name(), facts.source),
            None => format!("Commande payee ({})", facts.source),
        };

        let pool = self.pool.clone();
        let contact_id: Uuid = retry_db(|| {
            let pool = pool.clone();
            let name = name.clone();
            let message = message.clone();
            let facts = facts.clone();
            async move {
                sqlx::query_scalar(
                    r#"
                    INSERT INTO contacts
                        (email, name, message, project_type, budget_cents, status, source)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    ON CONFLICT (email) DO UPDATE SET
                        status = $6,
                        name = EXCLUDED.name,
                        updated_at = NOW()
                    RETURNING id
                    "#,
                )
                .bind(email)
                .bind(&name)
                .bind(&message)
                .bind(project_type.as_str())
                .bind(facts.amount_cents)
                .bind(ContactStatus::Won.as_str())
                .bind(facts.source)
                .fetch_one(&pool)
                .await
            }
        })
        .await?;

        Ok(contact_id)
    }

    /// Resolve the owning admin account for auto-created projects.
    pub async fn resolve_owner(&self) -> PaymentsResult<Option<Uuid>> {
        if let Some(id) = self.admin_user_id {
            return Ok(Some(id));
        }

        let owner: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM users WHERE role = 'ADMIN' ORDER BY created_at ASC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(owner.map(|(id,)| id))
    }

    /// Create-or-update the project for a contact.
    ///
    /// Keyed by the unique contact id: the first confirmation creates it
    /// with package-derived defaults, later confirmations for the same
    /// contact refresh budget and status instead of duplicating.
    pub async fn upsert_project(
        &self,
        contact_id: Uuid,
        owner_id: Uuid,
        facts: &ChargeFacts,
    ) -> PaymentsResult<Uuid> {
        let package = facts.package;
        let (title, description) = match package {
            Some(p) => (
                format!("Projet {}", p.display_name()),
                format!(
                    "{} commande et paye ({}). Charge: {}",
                    p.display_name(),
                    facts.source,
                    facts.charge_id
                ),
            ),
            None => (
                "Projet client".to_string(),
                format!("Commande payee ({}). Charge: {}", facts.source, facts.charge_id),
            ),
        };
        let project_type = package
            .map(|p| p.project_type())
            .unwrap_or(atelier_shared::types::ProjectType::SiteVitrine);
        let timeline_days = package.map(|p| p.timeline_days()).unwrap_or(14);
        let technologies: Vec<String> = package
            .map(|p| p.technologies().iter().map(|s| s.to_string()).collect())
            .unwrap_or_default();
        let features: Vec<String> = package
            .map(|p| p.features().iter().map(|s| s.to_string()).collect())
            .unwrap_or_default();

        let pool = self.pool.clone();
        let project_id: Uuid = retry_db(|| {
            let pool = pool.clone();
            let title = title.clone();
            let description = description.clone();
            let technologies = technologies.clone();
            let features = features.clone();
            let facts = facts.clone();
            async move {
                sqlx::query_scalar(
                    r#"
                    INSERT INTO projects
                        (contact_id, user_id, title, description, type, status,
                         budget_cents, timeline_days, technologies, features)
                    VALUES ($1, $2, $3, $4, $5, 'IN_PROGRESS', $6, $7, $8, $9)
                    ON CONFLICT (contact_id) DO UPDATE SET
                        budget_cents = EXCLUDED.budget_cents,
                        status = 'IN_PROGRESS',
                        updated_at = NOW()
                    RETURNING id
                    "#,
                )
                .bind(contact_id)
                .bind(owner_id)
                .bind(&title)
                .bind(&description)
                .bind(project_type.as_str())
                .bind(facts.amount_cents)
                .bind(timeline_days)
                .bind(&technologies)
                .bind(&features)
                .fetch_one(&pool)
                .await
            }
        })
        .await?;

        Ok(project_id)
    }

    /// Write the paid invoice for a confirmed charge.
    ///
    /// Keyed by the derived number; a confirmation that arrives after
    /// the placeholder updates it in place, one that arrives first (or
    /// without a created event at all) inserts directly as PAID.
    pub async fn upsert_paid_invoice(
        &self,
        project_id: Uuid,
        facts: &ChargeFacts,
    ) -> PaymentsResult<Uuid> {
        let pool = self.pool.clone();
        let invoice_id: Uuid = retry_db(|| {
            let pool = pool.clone();
            let facts = facts.clone();
            async move {
                sqlx::query_scalar(
                    r#"
                    INSERT INTO invoices
                        (number, project_id, subtotal_cents, tax_cents, total_cents,
                         currency, status, external_charge_id, due_date, paid_date)
                    VALUES ($1, $2, $3, 0, $3, $4, 'PAID', $5, NOW(), NOW())
                    ON CONFLICT (number) DO UPDATE SET
                        project_id = COALESCE(invoices.project_id, EXCLUDED.project_id),
                        subtotal_cents = EXCLUDED.subtotal_cents,
                        total_cents = EXCLUDED.total_cents,
                        status = 'PAID',
                        paid_date = COALESCE(invoices.paid_date, NOW()),
                        external_charge_id = EXCLUDED.external_charge_id,
                        updated_at = NOW()
                    RETURNING id
                    "#,
                )
                .bind(&facts.invoice_number)
                .bind(project_id)
                .bind(facts.amount_cents)
                .bind(facts.currency.to_lowercase())
                .bind(&facts.external_ref)
                .fetch_one(&pool)
                .await
            }
        })
        .await?;

        Ok(invoice_id)
    }

    /// The confirmed-charge transition: mark invoices paid, resolve the
    /// contact, then (owner permitting) the project and final invoice.
    ///
    /// Missing owner or unusable customer metadata degrades instead of
    /// failing: the provider considers the payment successful either
    /// way, only our internal bookkeeping is incomplete. The invariant
    /// checker surfaces those gaps later.
    pub async fn confirm_payment(&self, facts: &ChargeFacts) -> PaymentsResult<ConfirmOutcome> {
        let mut outcome = ConfirmOutcome {
            invoices_marked_paid: self
                .project_invoice_status(&facts.external_ref, InvoiceStatus::Paid)
                .await?,
            ..ConfirmOutcome::default()
        };

        let contact_id = match self.upsert_won_contact(facts).await {
            Ok(id) => Some(id),
            Err(PaymentsError::InvalidInput(reason)) => {
                tracing::warn!(
                    charge_id = %facts.charge_id,
                    reason = %reason,
                    "Skipping contact resolution for confirmed charge"
                );
                None
            }
            Err(e) => return Err(e),
        };
        outcome.contact_id = contact_id;

        let owner_id = self.resolve_owner().await?;

        match (contact_id, owner_id) {
            (Some(contact_id), Some(owner_id)) => {
                let project_id = self.upsert_project(contact_id, owner_id, facts).await?;
                outcome.project_id = Some(project_id);

                let invoice_id = self.upsert_paid_invoice(project_id, facts).await?;
                outcome.invoice_id = Some(invoice_id);
            }
            (contact, owner) => {
                outcome.degraded = true;
                tracing::warn!(
                    charge_id = %facts.charge_id,
                    contact_resolved = contact.is_some(),
                    owner_resolved = owner.is_some(),
                    "Payment confirmed but project/invoice bookkeeping skipped"
                );
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_invoice_numbers() {
        assert_eq!(
            derive_invoice_number(CRYPTO_INVOICE_PREFIX, "ch_123"),
            "CB-ch_123"
        );
        assert_eq!(
            derive_invoice_number(CARD_INVOICE_PREFIX, "cs_test_42"),
            "ST-cs_test_42"
        );
    }

    #[test]
    fn test_invoice_number_is_pure_function_of_charge_id() {
        let a = derive_invoice_number(CRYPTO_INVOICE_PREFIX, "ch_1");
        let b = derive_invoice_number(CRYPTO_INVOICE_PREFIX, "ch_1");
        assert_eq!(a, b, "same charge id must derive the same number");
    }
}
