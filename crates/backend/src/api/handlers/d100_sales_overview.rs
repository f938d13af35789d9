use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use contracts::dashboards::d100_sales_overview::{
    DashboardRequest, DashboardResponse, ErrorResponse,
};

use crate::dashboards::d100_sales_overview::{filter::DashboardFilter, service};
use crate::shared::data::db::AppState;

/// GET /api/dashboard-data?region=Western&channel=Supermarket
///
/// Both parameters are optional; unknown or sentinel values fall back to
/// "no filter" rather than being rejected.
pub async fn get_dashboard_data(
    State(state): State<AppState>,
    Query(request): Query<DashboardRequest>,
) -> Result<Json<DashboardResponse>, (StatusCode, Json<ErrorResponse>)> {
    let filter = DashboardFilter::new(request.region, request.channel);
    tracing::info!(
        "D100 dashboard: region={:?} channel={:?}",
        filter.region(),
        filter.channel()
    );

    match service::get_dashboard(&state.db, &filter).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            tracing::error!("D100 dashboard: query batch failed: {e}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    message: "Error fetching data".to_string(),
                    error: e.to_string(),
                }),
            ))
        }
    }
}
