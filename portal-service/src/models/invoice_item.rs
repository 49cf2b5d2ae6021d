//! Invoice line item model for portal-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Line item on an invoice. `amount` is `round(quantity * unit_price, 2)`,
/// recomputed whenever quantity or unit price changes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceItem {
    pub item_id: Uuid,
    pub invoice_id: Uuid,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
    pub position: i32,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating a line item.
#[derive(Debug, Clone)]
pub struct CreateInvoiceItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

/// Input for updating a line item.
#[derive(Debug, Clone, Default)]
pub struct UpdateInvoiceItem {
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
}
