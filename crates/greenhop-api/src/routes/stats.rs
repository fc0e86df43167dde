//! Dashboard statistics endpoint.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use greenhop_core::StatsSnapshot;

use crate::AppState;
use crate::error::ApiError;

pub fn router() -> Router<AppState> {
    Router::new().route("/stats", get(get_stats))
}

async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsSnapshot>, ApiError> {
    Ok(Json(state.stats.snapshot().await?))
}

#[cfg(test)]
mod tests {
    use crate::routes::router;
    use crate::routes::test_support::{get, send, state};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_stats_before_any_telemetry() {
        let app = router(state());
        let (status, body) = send(&app, get("/api/stats")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_carbon_saved"], 0.0);
        assert_eq!(body["total_jobs_processed"], 0);
        assert_eq!(body["current_intensity"], 0.0);
        assert!(body["highest_region"].is_null());
        assert_eq!(body["history"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_stats_reports_extremes() {
        let state = state();
        state.telemetry.refresh().await;
        let app = router(state);

        let (_, body) = send(&app, get("/api/stats")).await;
        assert_eq!(body["current_intensity"], 250.0);
        assert_eq!(body["highest_region"]["region"], "CAISO_NORTH");
        assert_eq!(body["lowest_region"]["region"], "NO1");
        assert_eq!(body["lowest_region"]["intensity"], 20.0);
    }
}
