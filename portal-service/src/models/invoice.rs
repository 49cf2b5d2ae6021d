//! Invoice model for portal-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    PartiallyPaid,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::PartiallyPaid => "partially_paid",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "sent" => InvoiceStatus::Sent,
            "paid" => InvoiceStatus::Paid,
            "overdue" => InvoiceStatus::Overdue,
            "partially_paid" => InvoiceStatus::PartiallyPaid,
            "cancelled" => InvoiceStatus::Cancelled,
            _ => InvoiceStatus::Draft,
        }
    }
}

/// Payment terms mapping to a due-date offset from the issue date.
///
/// `Custom` never captured a duration in the legacy schema; it falls back to
/// 30 days and that fallback is kept as permanent policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentTerms {
    DueOnReceipt,
    Net7,
    Net15,
    Net30,
    Net60,
    Custom,
}

impl PaymentTerms {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentTerms::DueOnReceipt => "due_on_receipt",
            PaymentTerms::Net7 => "net7",
            PaymentTerms::Net15 => "net15",
            PaymentTerms::Net30 => "net30",
            PaymentTerms::Net60 => "net60",
            PaymentTerms::Custom => "custom",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "due_on_receipt" => PaymentTerms::DueOnReceipt,
            "net7" => PaymentTerms::Net7,
            "net15" => PaymentTerms::Net15,
            "net60" => PaymentTerms::Net60,
            "custom" => PaymentTerms::Custom,
            _ => PaymentTerms::Net30,
        }
    }

    /// Days between issue date and due date.
    pub fn net_days(&self) -> i64 {
        match self {
            PaymentTerms::DueOnReceipt => 0,
            PaymentTerms::Net7 => 7,
            PaymentTerms::Net15 => 15,
            PaymentTerms::Net30 => 30,
            PaymentTerms::Net60 => 60,
            PaymentTerms::Custom => 30,
        }
    }
}

/// Invoice row. The five ledger fields (subtotal, discount_amount,
/// tax_amount, total, amount_due) are derived; they are recomputed inside
/// the same transaction as any item or rate mutation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub owner_id: Uuid,
    pub client_id: Uuid,
    pub project_id: Option<Uuid>,
    pub invoice_number: String,
    pub status: String,
    pub payment_terms: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub paid_date: Option<NaiveDate>,
    pub sent_utc: Option<DateTime<Utc>>,
    pub tax_rate: Decimal,
    pub discount_percent: Decimal,
    pub notes: Option<String>,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub amount_paid: Decimal,
    pub amount_due: Decimal,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating an invoice. Due date defaults to
/// `issue_date + payment_terms.net_days()` when not supplied.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub client_id: Uuid,
    pub project_id: Option<Uuid>,
    pub payment_terms: PaymentTerms,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub tax_rate: Decimal,
    pub discount_percent: Decimal,
    pub notes: Option<String>,
}

/// Input for updating an invoice.
#[derive(Debug, Clone, Default)]
pub struct UpdateInvoice {
    pub client_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub status: Option<InvoiceStatus>,
    pub payment_terms: Option<PaymentTerms>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub tax_rate: Option<Decimal>,
    pub discount_percent: Option<Decimal>,
    pub notes: Option<String>,
}

/// Filter parameters for listing invoices.
#[derive(Debug, Clone, Default)]
pub struct ListInvoicesFilter {
    pub status: Option<InvoiceStatus>,
}
