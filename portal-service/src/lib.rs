pub mod config;
pub mod handlers;
pub mod ledger;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use service_core::middleware::{
    security_headers::security_headers_middleware, tracing::request_id_middleware,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::PortalConfig;
use crate::services::{Database, JwtService};

#[derive(Clone)]
pub struct AppState {
    pub config: PortalConfig,
    pub db: Database,
    pub jwt: JwtService,
}

pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/health", get(handlers::health::health))
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login));

    let protected_routes = Router::new()
        .route("/api/auth/me", get(handlers::auth::me))
        // Clients
        .route(
            "/api/clients",
            get(handlers::clients::list_clients).post(handlers::clients::create_client),
        )
        .route(
            "/api/clients/:client_id",
            get(handlers::clients::get_client)
                .put(handlers::clients::update_client)
                .delete(handlers::clients::delete_client),
        )
        // Projects
        .route(
            "/api/projects",
            get(handlers::projects::list_projects).post(handlers::projects::create_project),
        )
        .route(
            "/api/projects/:project_id",
            get(handlers::projects::get_project)
                .put(handlers::projects::update_project)
                .delete(handlers::projects::delete_project),
        )
        // Tasks
        .route(
            "/api/projects/:project_id/tasks",
            post(handlers::tasks::create_task),
        )
        .route(
            "/api/projects/:project_id/tasks/reorder",
            put(handlers::tasks::reorder_tasks),
        )
        .route(
            "/api/tasks/:task_id",
            put(handlers::tasks::update_task).delete(handlers::tasks::delete_task),
        )
        .route("/api/tasks/:task_id/toggle", put(handlers::tasks::toggle_task))
        // Invoices
        .route(
            "/api/invoices",
            get(handlers::invoices::list_invoices).post(handlers::invoices::create_invoice),
        )
        .route(
            "/api/invoices/overdue-sweep",
            post(handlers::invoices::sweep_overdue),
        )
        .route(
            "/api/invoices/:invoice_id",
            get(handlers::invoices::get_invoice)
                .put(handlers::invoices::update_invoice)
                .delete(handlers::invoices::delete_invoice),
        )
        .route(
            "/api/invoices/:invoice_id/send",
            post(handlers::invoices::send_invoice),
        )
        .route(
            "/api/invoices/:invoice_id/cancel",
            post(handlers::invoices::cancel_invoice),
        )
        .route(
            "/api/invoices/:invoice_id/items",
            post(handlers::invoices::add_invoice_item),
        )
        .route(
            "/api/invoices/:invoice_id/items/:item_id",
            put(handlers::invoices::update_invoice_item)
                .delete(handlers::invoices::remove_invoice_item),
        )
        .route(
            "/api/invoices/:invoice_id/payments",
            get(handlers::invoices::list_payments).post(handlers::invoices::record_payment),
        )
        // Dashboard and demo data
        .route("/api/dashboard", get(handlers::dashboard::dashboard))
        .route("/api/seed", post(handlers::seed::seed))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/metrics", get(handlers::health::metrics))
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state.clone())
        .layer(from_fn(middleware::metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&state.config))
}

fn cors_layer(config: &PortalConfig) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(
            config
                .security
                .allowed_origins
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::warn!(origin = %origin, error = %e, "Skipping invalid CORS origin");
                        None
                    }
                })
                .collect::<Vec<HeaderValue>>(),
        )
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}
