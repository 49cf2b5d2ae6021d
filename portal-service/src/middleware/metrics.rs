use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::services::metrics::{ERRORS_TOTAL, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION};

pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    let status = response.status();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, status.as_str()])
        .inc();
    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path])
        .observe(start.elapsed().as_secs_f64());

    if status.is_server_error() {
        ERRORS_TOTAL.with_label_values(&["server_error"]).inc();
    } else if status.is_client_error() {
        ERRORS_TOTAL.with_label_values(&["client_error"]).inc();
    }

    response
}
