use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    middleware::AuthUser,
    models::{
        CreateInvoice, CreateInvoiceItem, CreatePayment, Invoice, InvoiceItem, InvoiceStatus,
        ListInvoicesFilter, PaymentTerms, UpdateInvoice, UpdateInvoiceItem,
    },
    services::metrics::{INVOICES_TOTAL, PAYMENT_AMOUNT_TOTAL},
    AppState,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceItemRequest {
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    #[serde(default = "default_quantity")]
    pub quantity: Decimal,
    #[serde(default)]
    pub unit_price: Decimal,
}

fn default_quantity() -> Decimal {
    Decimal::ONE
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    pub client_id: Uuid,
    pub project_id: Option<Uuid>,
    #[serde(default = "default_terms")]
    pub payment_terms: PaymentTerms,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub tax_rate: Decimal,
    #[serde(default)]
    pub discount_percent: Decimal,
    pub notes: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub items: Vec<CreateInvoiceItemRequest>,
}

fn default_terms() -> PaymentTerms {
    PaymentTerms::Net30
}

#[derive(Debug, Deserialize, Validate, Default)]
pub struct UpdateInvoiceRequest {
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

#[derive(Debug, Deserialize, Validate, Default)]
pub struct UpdateInvoiceItemRequest {
    #[validate(length(min = 1, message = "Description cannot be empty"))]
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub amount: Decimal,
    pub payment_date: Option<NaiveDate>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListInvoicesQuery {
    pub status: Option<InvoiceStatus>,
}

/// Invoice with its client's display name and its line items.
#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub client_name: Option<String>,
    pub items: Vec<InvoiceItem>,
}

async fn invoice_response(
    state: &AppState,
    invoice: Invoice,
) -> Result<InvoiceResponse, AppError> {
    let client_name = state.db.get_client_name(invoice.client_id).await?;
    let items = state.db.get_invoice_items(invoice.invoice_id).await?;

    Ok(InvoiceResponse {
        invoice,
        client_name,
        items,
    })
}

#[axum::debug_handler]
pub async fn list_invoices(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListInvoicesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let owner_id = user.user_id()?;

    let invoices = state
        .db
        .list_invoices(
            owner_id,
            &ListInvoicesFilter {
                status: query.status,
            },
        )
        .await?;

    let mut responses = Vec::with_capacity(invoices.len());
    for invoice in invoices {
        responses.push(invoice_response(&state, invoice).await?);
    }

    Ok(Json(responses))
}

/// Create a draft invoice, optionally with initial line items.
#[axum::debug_handler]
pub async fn create_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateInvoiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let owner_id = user.user_id()?;

    let invoice = state
        .db
        .create_invoice(
            owner_id,
            &CreateInvoice {
                client_id: req.client_id,
                project_id: req.project_id,
                payment_terms: req.payment_terms,
                issue_date: req.issue_date,
                due_date: req.due_date,
                tax_rate: req.tax_rate,
                discount_percent: req.discount_percent,
                notes: req.notes,
            },
        )
        .await?;

    let mut invoice = invoice;
    for item in &req.items {
        if let Some((_, updated)) = state
            .db
            .add_invoice_item(
                owner_id,
                invoice.invoice_id,
                &CreateInvoiceItem {
                    description: item.description.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                },
            )
            .await?
        {
            invoice = updated;
        }
    }

    INVOICES_TOTAL.with_label_values(&["draft"]).inc();

    state
        .db
        .log_activity(owner_id, "created", "invoice", &invoice.invoice_number, None)
        .await?;

    let response = invoice_response(&state, invoice).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

#[axum::debug_handler]
pub async fn get_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let owner_id = user.user_id()?;

    let invoice = state
        .db
        .get_invoice(owner_id, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    Ok(Json(invoice_response(&state, invoice).await?))
}

#[axum::debug_handler]
pub async fn update_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Path(invoice_id): Path<Uuid>,
    Json(req): Json<UpdateInvoiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let owner_id = user.user_id()?;

    let invoice = state
        .db
        .update_invoice(
            owner_id,
            invoice_id,
            &UpdateInvoice {
                client_id: req.client_id,
                project_id: req.project_id,
                status: req.status,
                payment_terms: req.payment_terms,
                issue_date: req.issue_date,
                due_date: req.due_date,
                tax_rate: req.tax_rate,
                discount_percent: req.discount_percent,
                notes: req.notes,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    state
        .db
        .log_activity(owner_id, "updated", "invoice", &invoice.invoice_number, None)
        .await?;

    Ok(Json(invoice_response(&state, invoice).await?))
}

#[axum::debug_handler]
pub async fn delete_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let owner_id = user.user_id()?;

    let invoice = state
        .db
        .get_invoice(owner_id, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    state.db.delete_invoice(owner_id, invoice_id).await?;

    state
        .db
        .log_activity(owner_id, "deleted", "invoice", &invoice.invoice_number, None)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Transition a draft invoice to sent.
#[axum::debug_handler]
pub async fn send_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let owner_id = user.user_id()?;

    let invoice = state
        .db
        .send_invoice(owner_id, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    INVOICES_TOTAL.with_label_values(&["sent"]).inc();

    state
        .db
        .log_activity(owner_id, "sent", "invoice", &invoice.invoice_number, None)
        .await?;

    Ok(Json(invoice_response(&state, invoice).await?))
}

/// Cancel an invoice.
#[axum::debug_handler]
pub async fn cancel_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let owner_id = user.user_id()?;

    let invoice = state
        .db
        .cancel_invoice(owner_id, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    INVOICES_TOTAL.with_label_values(&["cancelled"]).inc();

    state
        .db
        .log_activity(owner_id, "cancelled", "invoice", &invoice.invoice_number, None)
        .await?;

    Ok(Json(invoice_response(&state, invoice).await?))
}

/// Mark every invoice past its due date as overdue.
#[axum::debug_handler]
pub async fn sweep_overdue(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let owner_id = user.user_id()?;

    let swept = state.db.sweep_overdue(owner_id).await?;

    Ok(Json(json!({ "updated": swept })))
}

// -------------------------------------------------------------------------
// Line items
// -------------------------------------------------------------------------

#[axum::debug_handler]
pub async fn add_invoice_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(invoice_id): Path<Uuid>,
    Json(req): Json<CreateInvoiceItemRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let owner_id = user.user_id()?;

    let (item, invoice) = state
        .db
        .add_invoice_item(
            owner_id,
            invoice_id,
            &CreateInvoiceItem {
                description: req.description,
                quantity: req.quantity,
                unit_price: req.unit_price,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "item": item, "invoice": invoice })),
    ))
}

#[axum::debug_handler]
pub async fn update_invoice_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path((invoice_id, item_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateInvoiceItemRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let owner_id = user.user_id()?;

    let (item, invoice) = state
        .db
        .update_invoice_item(
            owner_id,
            invoice_id,
            item_id,
            &UpdateInvoiceItem {
                description: req.description,
                quantity: req.quantity,
                unit_price: req.unit_price,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Line item not found")))?;

    Ok(Json(json!({ "item": item, "invoice": invoice })))
}

#[axum::debug_handler]
pub async fn remove_invoice_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path((invoice_id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let owner_id = user.user_id()?;

    let invoice = state
        .db
        .remove_invoice_item(owner_id, invoice_id, item_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Line item not found")))?;

    Ok(Json(invoice))
}

// -------------------------------------------------------------------------
// Payments
// -------------------------------------------------------------------------

/// Record a payment and apply the resulting status transition.
#[axum::debug_handler]
pub async fn record_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(invoice_id): Path<Uuid>,
    Json(req): Json<RecordPaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let owner_id = user.user_id()?;

    if req.amount <= Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Payment amount must be positive"
        )));
    }

    let (payment, invoice) = state
        .db
        .record_payment(
            owner_id,
            invoice_id,
            &CreatePayment {
                amount: req.amount,
                payment_date: req.payment_date,
                note: req.note,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    PAYMENT_AMOUNT_TOTAL
        .with_label_values(&[&invoice.status])
        .inc_by(payment.amount.to_f64().unwrap_or(0.0));
    INVOICES_TOTAL.with_label_values(&[&invoice.status]).inc();

    state
        .db
        .log_activity(
            owner_id,
            "recorded payment on",
            "invoice",
            &invoice.invoice_number,
            Some(&format!("{}", payment.amount)),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "payment": payment, "invoice": invoice })),
    ))
}

#[axum::debug_handler]
pub async fn list_payments(
    State(state): State<AppState>,
    user: AuthUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let owner_id = user.user_id()?;

    let payments = state
        .db
        .list_payments(owner_id, invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    Ok(Json(payments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn item_request_fills_missing_quantity_and_price() {
        let item: CreateInvoiceItemRequest =
            serde_json::from_str(r#"{"description": "Consulting"}"#).unwrap();
        assert_eq!(item.quantity, dec!(1));
        assert_eq!(item.unit_price, dec!(0));

        let item: CreateInvoiceItemRequest =
            serde_json::from_str(r#"{"description": "Design", "quantity": "3", "unit_price": "150.00"}"#)
                .unwrap();
        assert_eq!(item.quantity, dec!(3));
        assert_eq!(item.unit_price, dec!(150.00));
    }
}
