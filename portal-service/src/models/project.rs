//! Project model for portal-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Project status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Planning,
    InProgress,
    Review,
    Completed,
    OnHold,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Planning => "planning",
            ProjectStatus::InProgress => "in_progress",
            ProjectStatus::Review => "review",
            ProjectStatus::Completed => "completed",
            ProjectStatus::OnHold => "on_hold",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "in_progress" => ProjectStatus::InProgress,
            "review" => ProjectStatus::Review,
            "completed" => ProjectStatus::Completed,
            "on_hold" => ProjectStatus::OnHold,
            _ => ProjectStatus::Planning,
        }
    }

    /// Display color used by the dashboard status distribution chart.
    pub fn color(&self) -> &'static str {
        match self {
            ProjectStatus::Planning => "#6366F1",
            ProjectStatus::InProgress => "#10B981",
            ProjectStatus::Review => "#F59E0B",
            ProjectStatus::Completed => "#3B82F6",
            ProjectStatus::OnHold => "#EF4444",
        }
    }
}

/// Project row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub project_id: Uuid,
    pub owner_id: Uuid,
    pub client_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub budget: Decimal,
    pub spent: Decimal,
    pub deadline: Option<NaiveDate>,
    pub progress: i32,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Input for creating a project.
#[derive(Debug, Clone)]
pub struct CreateProject {
    pub client_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub budget: Decimal,
    pub deadline: Option<NaiveDate>,
}

/// Input for updating a project.
#[derive(Debug, Clone, Default)]
pub struct UpdateProject {
    pub client_id: Option<Uuid>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub budget: Option<Decimal>,
    pub spent: Option<Decimal>,
    pub deadline: Option<NaiveDate>,
}

/// Filter parameters for listing projects.
#[derive(Debug, Clone, Default)]
pub struct ListProjectsFilter {
    pub status: Option<ProjectStatus>,
}
