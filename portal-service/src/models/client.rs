//! Client model for portal-service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A client the owner bills and runs projects for.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Client {
    pub client_id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub avatar_color: String,
    pub created_utc: DateTime<Utc>,
}

/// Client row joined with its derived stats: number of projects and total
/// revenue from paid invoices.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClientWithStats {
    pub client_id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub avatar_color: String,
    pub created_utc: DateTime<Utc>,
    pub project_count: i64,
    pub total_revenue: rust_decimal::Decimal,
}

/// Input for creating a client.
#[derive(Debug, Clone)]
pub struct CreateClient {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub avatar_color: Option<String>,
}

/// Input for updating a client.
#[derive(Debug, Clone, Default)]
pub struct UpdateClient {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub avatar_color: Option<String>,
}
