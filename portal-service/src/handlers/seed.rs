//! Demo data seeding. Replaces everything the authenticated user owns with
//! a small, predictable data set, built through the same operations the API
//! exposes so every derived field is consistent.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use service_core::error::AppError;
use tracing::info;
use uuid::Uuid;

use crate::{
    middleware::AuthUser,
    models::{
        CreateClient, CreateInvoice, CreateInvoiceItem, CreatePayment, CreateProject, CreateTask,
        PaymentTerms, ProjectStatus, TaskPriority, TaskStatus,
    },
    AppState,
};

#[axum::debug_handler]
pub async fn seed(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let owner_id = user.user_id()?;

    state.db.purge_owner_data(owner_id).await?;

    let clients = seed_clients(&state, owner_id).await?;
    let projects = seed_projects(&state, owner_id, &clients).await?;
    seed_tasks(&state, owner_id, &projects).await?;
    let invoices = seed_invoices(&state, owner_id, &clients, &projects).await?;

    info!(owner_id = %owner_id, "Demo data seeded");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "clients": clients.len(),
            "projects": projects.len(),
            "invoices": invoices,
        })),
    ))
}

async fn seed_clients(state: &AppState, owner_id: Uuid) -> Result<Vec<Uuid>, AppError> {
    let samples = [
        CreateClient {
            name: "Aurora Design Co".to_string(),
            email: "hello@auroradesign.example".to_string(),
            phone: Some("+1 555 0134".to_string()),
            company: Some("Aurora Design Co".to_string()),
            address: Some("12 Harbor St, Portland".to_string()),
            notes: Some("Prefers invoices at month end".to_string()),
            avatar_color: Some("#6366F1".to_string()),
        },
        CreateClient {
            name: "Beacon Analytics".to_string(),
            email: "accounts@beacon.example".to_string(),
            phone: Some("+1 555 0188".to_string()),
            company: Some("Beacon Analytics Ltd".to_string()),
            address: None,
            notes: None,
            avatar_color: Some("#F59E0B".to_string()),
        },
        CreateClient {
            name: "Cobalt Media".to_string(),
            email: "billing@cobaltmedia.example".to_string(),
            phone: None,
            company: Some("Cobalt Media".to_string()),
            address: Some("400 5th Ave, New York".to_string()),
            notes: None,
            avatar_color: Some("#10B981".to_string()),
        },
    ];

    let mut ids = Vec::with_capacity(samples.len());
    for sample in &samples {
        let client = state.db.create_client(owner_id, sample).await?;
        ids.push(client.client_id);
    }

    Ok(ids)
}

async fn seed_projects(
    state: &AppState,
    owner_id: Uuid,
    clients: &[Uuid],
) -> Result<Vec<Uuid>, AppError> {
    let today = Utc::now().date_naive();
    let samples = [
        CreateProject {
            client_id: clients.first().copied(),
            name: "Brand refresh".to_string(),
            description: Some("New identity and site design".to_string()),
            status: ProjectStatus::InProgress,
            budget: Decimal::new(12_000_00, 2),
            deadline: Some(today + Duration::days(45)),
        },
        CreateProject {
            client_id: clients.get(1).copied(),
            name: "Quarterly reporting pipeline".to_string(),
            description: Some("Automated report generation".to_string()),
            status: ProjectStatus::Review,
            budget: Decimal::new(8_500_00, 2),
            deadline: Some(today + Duration::days(14)),
        },
        CreateProject {
            client_id: clients.get(2).copied(),
            name: "Campaign microsite".to_string(),
            description: None,
            status: ProjectStatus::Planning,
            budget: Decimal::new(4_000_00, 2),
            deadline: None,
        },
    ];

    let mut ids = Vec::with_capacity(samples.len());
    for sample in &samples {
        let project = state.db.create_project(owner_id, sample).await?;
        ids.push(project.project_id);
    }

    Ok(ids)
}

async fn seed_tasks(state: &AppState, owner_id: Uuid, projects: &[Uuid]) -> Result<(), AppError> {
    let today = Utc::now().date_naive();

    let first = match projects.first() {
        Some(project_id) => *project_id,
        None => return Ok(()),
    };

    let tasks = [
        CreateTask {
            title: "Moodboard and direction".to_string(),
            description: None,
            status: TaskStatus::Completed,
            priority: TaskPriority::High,
            due_date: Some(today - Duration::days(7)),
            estimated_hours: Some(6.0),
        },
        CreateTask {
            title: "Logo concepts".to_string(),
            description: Some("Three directions for review".to_string()),
            status: TaskStatus::InProgress,
            priority: TaskPriority::High,
            due_date: Some(today + Duration::days(3)),
            estimated_hours: Some(12.0),
        },
        CreateTask {
            title: "Site wireframes".to_string(),
            description: None,
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            due_date: Some(today + Duration::days(10)),
            estimated_hours: Some(8.0),
        },
        CreateTask {
            title: "Handover docs".to_string(),
            description: None,
            status: TaskStatus::Todo,
            priority: TaskPriority::Low,
            due_date: None,
            estimated_hours: None,
        },
    ];

    for task in &tasks {
        state.db.create_task(owner_id, first, task).await?;
    }

    Ok(())
}

/// Three invoices: one paid in full, one sent with a partial payment, one
/// draft. Returns the number created.
async fn seed_invoices(
    state: &AppState,
    owner_id: Uuid,
    clients: &[Uuid],
    projects: &[Uuid],
) -> Result<usize, AppError> {
    let today = Utc::now().date_naive();

    let (first_client, second_client) = match (clients.first(), clients.get(1)) {
        (Some(a), Some(b)) => (*a, *b),
        _ => return Ok(0),
    };

    // Paid invoice.
    let paid = state
        .db
        .create_invoice(
            owner_id,
            &CreateInvoice {
                client_id: first_client,
                project_id: projects.first().copied(),
                payment_terms: PaymentTerms::Net15,
                issue_date: Some(today - Duration::days(40)),
                due_date: None,
                tax_rate: Decimal::new(95, 1),
                discount_percent: Decimal::ZERO,
                notes: None,
            },
        )
        .await?;
    state
        .db
        .add_invoice_item(
            owner_id,
            paid.invoice_id,
            &CreateInvoiceItem {
                description: "Discovery workshop".to_string(),
                quantity: Decimal::ONE,
                unit_price: Decimal::new(2_500_00, 2),
            },
        )
        .await?;
    state.db.send_invoice(owner_id, paid.invoice_id).await?;
    if let Some(invoice) = state.db.get_invoice(owner_id, paid.invoice_id).await? {
        state
            .db
            .record_payment(
                owner_id,
                paid.invoice_id,
                &CreatePayment {
                    amount: invoice.total,
                    payment_date: Some(today - Duration::days(20)),
                    note: Some("Bank transfer".to_string()),
                },
            )
            .await?;
    }

    // Sent invoice with a partial payment.
    let sent = state
        .db
        .create_invoice(
            owner_id,
            &CreateInvoice {
                client_id: second_client,
                project_id: projects.get(1).copied(),
                payment_terms: PaymentTerms::Net30,
                issue_date: Some(today - Duration::days(10)),
                due_date: None,
                tax_rate: Decimal::ZERO,
                discount_percent: Decimal::new(5_00, 2),
                notes: Some("Milestone 1 of 2".to_string()),
            },
        )
        .await?;
    state
        .db
        .add_invoice_item(
            owner_id,
            sent.invoice_id,
            &CreateInvoiceItem {
                description: "Pipeline build, phase 1".to_string(),
                quantity: Decimal::new(40_0, 1),
                unit_price: Decimal::new(95_00, 2),
            },
        )
        .await?;
    state.db.send_invoice(owner_id, sent.invoice_id).await?;
    state
        .db
        .record_payment(
            owner_id,
            sent.invoice_id,
            &CreatePayment {
                amount: Decimal::new(1_000_00, 2),
                payment_date: Some(today - Duration::days(2)),
                note: None,
            },
        )
        .await?;

    // Draft invoice, no items yet.
    state
        .db
        .create_invoice(
            owner_id,
            &CreateInvoice {
                client_id: first_client,
                project_id: None,
                payment_terms: PaymentTerms::DueOnReceipt,
                issue_date: Some(today),
                due_date: None,
                tax_rate: Decimal::ZERO,
                discount_percent: Decimal::ZERO,
                notes: None,
            },
        )
        .await?;

    Ok(3)
}
