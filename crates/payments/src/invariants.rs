//! Payment invariants
//!
//! Runnable consistency checks over the record graph the webhook flow
//! maintains. Run after suspicious webhook activity or on demand from
//! the admin area.
//!
//! 1. **Executable**: each invariant is a real SQL query
//! 2. **Explanatory**: violations include enough context to debug
//! 3. **Non-destructive**: checks only read, never write

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::PaymentsResult;

/// Result of running a single invariant check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantViolation {
    /// Which invariant was violated
    pub invariant: String,
    /// Rows affected
    pub record_ids: Vec<Uuid>,
    /// Human-readable description of the violation
    pub description: String,
    /// Additional context for debugging
    pub context: serde_json::Value,
    /// Severity level
    pub severity: ViolationSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationSeverity {
    /// Critical - billing records are wrong
    Critical,
    /// High - data inconsistency that needs attention
    High,
    /// Medium - potential issue, should investigate
    Medium,
    /// Low - minor inconsistency, informational
    Low,
}

impl std::fmt::Display for ViolationSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationSeverity::Critical => write!(f, "CRITICAL"),
            ViolationSeverity::High => write!(f, "HIGH"),
            ViolationSeverity::Medium => write!(f, "MEDIUM"),
            ViolationSeverity::Low => write!(f, "LOW"),
        }
    }
}

/// Summary of all invariant checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantCheckSummary {
    pub checked_at: OffsetDateTime,
    pub checks_run: usize,
    pub checks_passed: usize,
    pub checks_failed: usize,
    pub violations: Vec<InvariantViolation>,
    pub healthy: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct DuplicateChargeRow {
    external_charge_id: String,
    invoice_count: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct UnpaidDateRow {
    id: Uuid,
    number: String,
}

#[derive(Debug, sqlx::FromRow)]
struct TotalsMismatchRow {
    id: Uuid,
    number: String,
    subtotal_cents: i64,
    tax_cents: i64,
    total_cents: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct OrphanPaidInvoiceRow {
    id: Uuid,
    number: String,
    external_charge_id: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct WonWithoutProjectRow {
    id: Uuid,
    email: String,
}

/// Service for running payment invariant checks.
pub struct InvariantChecker {
    pool: PgPool,
}

impl InvariantChecker {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run all invariant checks and return a summary.
    pub async fn run_all_checks(&self) -> PaymentsResult<InvariantCheckSummary> {
        let now = OffsetDateTime::now_utc();
        let mut violations = Vec::new();

        violations.extend(self.check_one_invoice_per_charge().await?);
        violations.extend(self.check_paid_invoices_have_paid_date().await?);
        violations.extend(self.check_invoice_totals_consistent().await?);
        violations.extend(self.check_paid_invoices_have_project().await?);
        violations.extend(self.check_won_contacts_have_project().await?);

        let checks_run = 5;
        let checks_failed = violations
            .iter()
            .map(|v| &v.invariant)
            .collect::<std::collections::HashSet<_>>()
            .len();
        let checks_passed = checks_run - checks_failed;

        Ok(InvariantCheckSummary {
            checked_at: now,
            checks_run,
            checks_passed,
            checks_failed,
            healthy: violations.is_empty(),
            violations,
        })
    }

    /// Invariant 1: at most one invoice per external charge id.
    ///
    /// The invoice number is derived from the charge id and unique, so
    /// a duplicate here means a write path bypassed the upsert.
    async fn check_one_invoice_per_charge(&self) -> PaymentsResult<Vec<InvariantViolation>> {
        let rows: Vec<DuplicateChargeRow> = sqlx::query_as(
            r#"
            SELECT external_charge_id, COUNT(*) as invoice_count
            FROM invoices
            WHERE external_charge_id IS NOT NULL
            GROUP BY external_charge_id
            HAVING COUNT(*) > 1
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "one_invoice_per_charge".to_string(),
                record_ids: vec![],
                description: format!(
                    "Charge {} has {} invoices (expected 1)",
                    row.external_charge_id, row.invoice_count
                ),
                context: serde_json::json!({
                    "external_charge_id": row.external_charge_id,
                    "invoice_count": row.invoice_count,
                }),
                severity: ViolationSeverity::Critical,
            })
            .collect())
    }

    /// Invariant 2: PAID invoices carry a paid date.
    async fn check_paid_invoices_have_paid_date(&self) -> PaymentsResult<Vec<InvariantViolation>> {
        let rows: Vec<UnpaidDateRow> = sqlx::query_as(
            r#"
            SELECT id, number
            FROM invoices
            WHERE status = 'PAID' AND paid_date IS NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "paid_invoice_has_paid_date".to_string(),
                record_ids: vec![row.id],
                description: format!("Invoice {} is PAID without a paid date", row.number),
                context: serde_json::json!({ "number": row.number }),
                severity: ViolationSeverity::High,
            })
            .collect())
    }

    /// Invariant 3: total = subtotal + tax.
    async fn check_invoice_totals_consistent(&self) -> PaymentsResult<Vec<InvariantViolation>> {
        let rows: Vec<TotalsMismatchRow> = sqlx::query_as(
            r#"
            SELECT id, number, subtotal_cents, tax_cents, total_cents
            FROM invoices
            WHERE subtotal_cents + tax_cents != total_cents
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "invoice_totals_consistent".to_string(),
                record_ids: vec![row.id],
                description: format!(
                    "Invoice {} totals do not add up: {} + {} != {}",
                    row.number, row.subtotal_cents, row.tax_cents, row.total_cents
                ),
                context: serde_json::json!({
                    "number": row.number,
                    "subtotal_cents": row.subtotal_cents,
                    "tax_cents": row.tax_cents,
                    "total_cents": row.total_cents,
                }),
                severity: ViolationSeverity::Critical,
            })
            .collect())
    }

    /// Invariant 4: PAID invoices reference a project.
    ///
    /// The degraded confirmation path (no admin owner) legitimately
    /// produces these; they mean manual bookkeeping is owed.
    async fn check_paid_invoices_have_project(&self) -> PaymentsResult<Vec<InvariantViolation>> {
        let rows: Vec<OrphanPaidInvoiceRow> = sqlx::query_as(
            r#"
            SELECT id, number, external_charge_id
            FROM invoices
            WHERE status = 'PAID' AND project_id IS NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "paid_invoice_has_project".to_string(),
                record_ids: vec![row.id],
                description: format!(
                    "Paid invoice {} is not attached to a project",
                    row.number
                ),
                context: serde_json::json!({
                    "number": row.number,
                    "external_charge_id": row.external_charge_id,
                }),
                severity: ViolationSeverity::Medium,
            })
            .collect())
    }

    /// Invariant 5: WON contacts have a project.
    async fn check_won_contacts_have_project(&self) -> PaymentsResult<Vec<InvariantViolation>> {
        let rows: Vec<WonWithoutProjectRow> = sqlx::query_as(
            r#"
            SELECT c.id, c.email
            FROM contacts c
            WHERE c.status = 'WON'
              AND NOT EXISTS (SELECT 1 FROM projects p WHERE p.contact_id = c.id)
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "won_contact_has_project".to_string(),
                record_ids: vec![row.id],
                description: format!("Won contact {} has no project", row.email),
                context: serde_json::json!({ "email": row.email }),
                severity: ViolationSeverity::Medium,
            })
            .collect())
    }

    /// Run a single invariant check by name.
    pub async fn run_check(&self, name: &str) -> PaymentsResult<Vec<InvariantViolation>> {
        match name {
            "one_invoice_per_charge" => self.check_one_invoice_per_charge().await,
            "paid_invoice_has_paid_date" => self.check_paid_invoices_have_paid_date().await,
            "invoice_totals_consistent" => self.check_invoice_totals_consistent().await,
            "paid_invoice_has_project" => self.check_paid_invoices_have_project().await,
            "won_contact_has_project" => self.check_won_contacts_have_project().await,
            _ => Ok(vec![]),
        }
    }

    /// List all available invariant checks.
    pub fn available_checks() -> Vec<&'static str> {
        vec![
            "one_invoice_per_charge",
            "paid_invoice_has_paid_date",
            "invoice_totals_consistent",
            "paid_invoice_has_project",
            "won_contact_has_project",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_severity_display() {
        assert_eq!(ViolationSeverity::Critical.to_string(), "CRITICAL");
        assert_eq!(ViolationSeverity::High.to_string(), "HIGH");
        assert_eq!(ViolationSeverity::Medium.to_string(), "MEDIUM");
        assert_eq!(ViolationSeverity::Low.to_string(), "LOW");
    }

    #[test]
    fn test_available_checks() {
        let checks = InvariantChecker::available_checks();
        assert_eq!(checks.len(), 5);
        assert!(checks.contains(&"one_invoice_per_charge"));
        assert!(checks.contains(&"won_contact_has_project"));
    }
}
