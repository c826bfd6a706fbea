//! Domain enums shared across crates
//!
//! Statuses are stored as TEXT columns; queries bind `as_str()` values
//! and rows convert back through `FromStr`.

use serde::{Deserialize, Serialize};

/// Account role for the admin area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Editor,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Editor => "EDITOR",
            Role::User => "USER",
        }
    }

    /// Roles allowed to write through the admin API.
    pub fn can_edit(&self) -> bool {
        matches!(self, Role::Admin | Role::Editor)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "EDITOR" => Ok(Role::Editor),
            "USER" => Ok(Role::User),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lead lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContactStatus {
    New,
    Contacted,
    Qualified,
    Won,
    Lost,
}

impl ContactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactStatus::New => "NEW",
            ContactStatus::Contacted => "CONTACTED",
            ContactStatus::Qualified => "QUALIFIED",
            ContactStatus::Won => "WON",
            ContactStatus::Lost => "LOST",
        }
    }
}

impl std::str::FromStr for ContactStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(ContactStatus::New),
            "CONTACTED" => Ok(ContactStatus::Contacted),
            "QUALIFIED" => Ok(ContactStatus::Qualified),
            "WON" => Ok(ContactStatus::Won),
            "LOST" => Ok(ContactStatus::Lost),
            other => Err(format!("unknown contact status: {other}")),
        }
    }
}

/// Kind of work a project (or lead) is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectType {
    SiteVitrine,
    Ecommerce,
    Application,
    Refonte,
}

impl ProjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectType::SiteVitrine => "SITE_VITRINE",
            ProjectType::Ecommerce => "ECOMMERCE",
            ProjectType::Application => "APPLICATION",
            ProjectType::Refonte => "REFONTE",
        }
    }
}

impl std::str::FromStr for ProjectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SITE_VITRINE" => Ok(ProjectType::SiteVitrine),
            "ECOMMERCE" => Ok(ProjectType::Ecommerce),
            "APPLICATION" => Ok(ProjectType::Application),
            "REFONTE" => Ok(ProjectType::Refonte),
            other => Err(format!("unknown project type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    Planned,
    InProgress,
    Review,
    Delivered,
    Cancelled,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Planned => "PLANNED",
            ProjectStatus::InProgress => "IN_PROGRESS",
            ProjectStatus::Review => "REVIEW",
            ProjectStatus::Delivered => "DELIVERED",
            ProjectStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::str::FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PLANNED" => Ok(ProjectStatus::Planned),
            "IN_PROGRESS" => Ok(ProjectStatus::InProgress),
            "REVIEW" => Ok(ProjectStatus::Review),
            "DELIVERED" => Ok(ProjectStatus::Delivered),
            "CANCELLED" => Ok(ProjectStatus::Cancelled),
            other => Err(format!("unknown project status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "TODO",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Done => "DONE",
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TODO" => Ok(TaskStatus::Todo),
            "IN_PROGRESS" => Ok(TaskStatus::InProgress),
            "DONE" => Ok(TaskStatus::Done),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "LOW",
            TaskPriority::Medium => "MEDIUM",
            TaskPriority::High => "HIGH",
        }
    }
}

impl std::str::FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(TaskPriority::Low),
            "MEDIUM" => Ok(TaskPriority::Medium),
            "HIGH" => Ok(TaskPriority::High),
            other => Err(format!("unknown task priority: {other}")),
        }
    }
}

/// Invoice lifecycle.
///
/// Webhook handlers only ever assign these (never increment), so a
/// redelivered status event is harmless: last write wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "DRAFT",
            InvoiceStatus::Sent => "SENT",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Overdue => "OVERDUE",
            InvoiceStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::str::FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(InvoiceStatus::Draft),
            "SENT" => Ok(InvoiceStatus::Sent),
            "PAID" => Ok(InvoiceStatus::Paid),
            "OVERDUE" => Ok(InvoiceStatus::Overdue),
            "CANCELLED" => Ok(InvoiceStatus::Cancelled),
            other => Err(format!("unknown invoice status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_status_round_trips() {
        for status in [
            ContactStatus::New,
            ContactStatus::Contacted,
            ContactStatus::Qualified,
            ContactStatus::Won,
            ContactStatus::Lost,
        ] {
            assert_eq!(ContactStatus::from_str(status.as_str()), Ok(status));
        }

        for status in [
            InvoiceStatus::Draft,
            InvoiceStatus::Sent,
            InvoiceStatus::Paid,
            InvoiceStatus::Overdue,
            InvoiceStatus::Cancelled,
        ] {
            assert_eq!(InvoiceStatus::from_str(status.as_str()), Ok(status));
        }
    }

    #[test]
    fn test_serde_uses_screaming_snake_case() {
        let json = serde_json::to_string(&ProjectType::SiteVitrine).unwrap();
        assert_eq!(json, "\"SITE_VITRINE\"");

        let parsed: ProjectType = serde_json::from_str("\"ECOMMERCE\"").unwrap();
        assert_eq!(parsed, ProjectType::Ecommerce);
    }

    #[test]
    fn test_unknown_values_rejected() {
        assert!(Role::from_str("SUPERADMIN").is_err());
        assert!(ProjectType::from_str("vitrine").is_err());
    }

    #[test]
    fn test_editor_can_edit_user_cannot() {
        assert!(Role::Admin.can_edit());
        assert!(Role::Editor.can_edit());
        assert!(!Role::User.can_edit());
    }
}
