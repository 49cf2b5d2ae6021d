use axum::{extract::State, response::IntoResponse, Json};
use chrono::{Datelike, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use service_core::error::AppError;

use crate::{middleware::AuthUser, models::{Activity, ProjectStatus}, AppState};

#[derive(Debug, Serialize)]
pub struct MonthlyRevenue {
    pub month: String,
    pub revenue: Decimal,
}

#[derive(Debug, Serialize)]
pub struct StatusSlice {
    pub status: String,
    pub count: i64,
    pub color: String,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub total_revenue: Decimal,
    pub pending_amount: Decimal,
    pub active_projects: i64,
    pub total_clients: i64,
    pub monthly_revenue: Vec<MonthlyRevenue>,
    pub project_status: Vec<StatusSlice>,
    pub recent_activities: Vec<Activity>,
}

/// Dashboard summary: headline totals, paid revenue for the last six
/// months, project status distribution, and the recent activity feed.
#[axum::debug_handler]
pub async fn dashboard(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let owner_id = user.user_id()?;

    let (total_revenue, pending_amount, active_projects, total_clients) =
        state.db.dashboard_totals(owner_id).await?;

    let today = Utc::now().date_naive();
    let current_month = today
        .with_day(1)
        .unwrap_or(today);
    let window_start = current_month
        .checked_sub_months(Months::new(5))
        .unwrap_or(current_month);

    let revenue_rows = state.db.monthly_revenue(owner_id, window_start).await?;
    let monthly_revenue = month_series(window_start, 6)
        .into_iter()
        .map(|month| {
            let revenue = revenue_rows
                .iter()
                .find(|(m, _)| *m == month)
                .map(|(_, r)| *r)
                .unwrap_or(Decimal::ZERO);
            MonthlyRevenue {
                month: month.format("%b").to_string(),
                revenue,
            }
        })
        .collect();

    let project_status = state
        .db
        .project_status_counts(owner_id)
        .await?
        .into_iter()
        .map(|(status, count)| {
            let color = ProjectStatus::from_string(&status).color().to_string();
            StatusSlice {
                status,
                count,
                color,
            }
        })
        .collect();

    let recent_activities = state.db.recent_activities(owner_id, 10).await?;

    Ok(Json(DashboardResponse {
        total_revenue,
        pending_amount,
        active_projects,
        total_clients,
        monthly_revenue,
        project_status,
        recent_activities,
    }))
}

/// First days of `count` consecutive months starting at `start`.
fn month_series(start: NaiveDate, count: u32) -> Vec<NaiveDate> {
    (0..count)
        .filter_map(|offset| start.checked_add_months(Months::new(offset)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_series_spans_year_boundary() {
        let start = NaiveDate::from_ymd_opt(2023, 11, 1).expect("valid date");
        let months = month_series(start, 6);

        assert_eq!(months.len(), 6);
        assert_eq!(months[0], NaiveDate::from_ymd_opt(2023, 11, 1).unwrap());
        assert_eq!(months[2], NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(months[5], NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
    }
}
