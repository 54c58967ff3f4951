//! Request handlers for the API endpoints.
//!
//! Simulations block the calling thread until the engine returns, so every
//! handler that touches a module runs it on tokio's blocking pool.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use serde_json::{Map, Value};
use tracing::{error, info};

use super::AppState;
use super::types::{ApiError, ModuleListing};
use crate::pvwatts::{PvWatts4Request, PvWatts5Request, PvWattsResponse};
use crate::ssc::{self, ModuleSimulation, ModuleSummary};

/// Runs `task` on the blocking pool. A panic inside the task becomes a 500.
async fn blocking<T, F>(task: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task).await.map_err(|e| {
        error!(error = %e, "simulation task aborted");
        ApiError::server("simulation aborted unexpectedly")
    })?
}

/// Runs a PVWatts v5 simulation.
///
/// `GET /api/v5.json?lat=..&lon=..&system_capacity=..` → 200 + response JSON
/// (engine errors are reported in the body, not the status).
/// Missing location or no nearby station → 422.
pub async fn get_v5(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PvWatts5Request>, QueryRejection>,
) -> Result<Json<PvWattsResponse<PvWatts5Request>>, ApiError> {
    let Query(request) = query.map_err(|e| ApiError::invalid_request(e.body_text()))?;
    let service = state.pvwatts.clone();
    let response = blocking(move || Ok(service.v5(request)?)).await?;
    info!(errors = response.errors.len(), "v5 simulation served");
    Ok(Json(response))
}

/// Runs a PVWatts v4 simulation.
///
/// `GET /api/v4.json?lat=..&lon=..&system_size=..` → 200 + response JSON
pub async fn get_v4(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PvWatts4Request>, QueryRejection>,
) -> Result<Json<PvWattsResponse<PvWatts4Request>>, ApiError> {
    let Query(request) = query.map_err(|e| ApiError::invalid_request(e.body_text()))?;
    let service = state.pvwatts.clone();
    let response = blocking(move || Ok(service.v4(request)?)).await?;
    info!(errors = response.errors.len(), "v4 simulation served");
    Ok(Json(response))
}

/// Lists every module in the engine registry.
///
/// `GET /ssc/modules` → 200 + `Vec<ModuleListing>` JSON
pub async fn list_modules(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ModuleListing>>, ApiError> {
    let api = Arc::clone(&state.api);
    let modules = blocking(move || Ok(ssc::available_modules(api.as_ref()))).await?;
    Ok(Json(modules.into_iter().map(ModuleListing::from).collect()))
}

/// Describes one module and its variables.
///
/// `GET /ssc/modules/{name}` → 200 + `ModuleSummary` JSON, 404 if unknown
pub async fn get_module(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ModuleSummary>, ApiError> {
    let api = Arc::clone(&state.api);
    let summary = blocking(move || Ok(ssc::module_summary(api, &name)?)).await?;
    Ok(Json(summary))
}

/// Runs any module with a JSON object of inputs.
///
/// `POST /ssc/modules/{name}` → 200 + `ModuleSimulation` JSON, 404 if
/// unknown, 422 if an input does not match its declared type
pub async fn simulate_module(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Json<ModuleSimulation>, ApiError> {
    let Json(inputs) = body.map_err(|e| ApiError::invalid_request(e.body_text()))?;
    let runner = state.runner.clone();
    let simulation = blocking(move || Ok(ssc::simulate_json(&runner, &name, &inputs)?)).await?;
    info!(module = %simulation.module.name, messages = simulation.messages.len(), "module simulation served");
    Ok(Json(simulation))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tempfile::TempDir;
    use tower::util::ServiceExt;

    use super::*;
    use crate::api::router;
    use crate::pvwatts::testing;

    fn make_test_state() -> (Arc<AppState>, TempDir) {
        let weather = testing::weather();
        let api = testing::engine();
        let pvwatts = testing::service(api.clone(), &weather);
        (Arc::new(AppState::new(api, pvwatts)), weather)
    }

    async fn send(state: Arc<AppState>, req: Request<Body>) -> (StatusCode, Value) {
        let resp = router(state).oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn v5_returns_200() {
        let (state, _weather) = make_test_state();
        let (status, json) = send(
            state,
            get("/api/v5.json?lat=33.816&lon=-118.15&system_capacity=4&losses=14&tilt=20&azimuth=180"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["errors"], serde_json::json!([]));
        assert_eq!(json["station_info"]["solar_resource_file"], "23129.tm2");
        assert_eq!(json["outputs"]["ac_monthly"].as_array().unwrap().len(), 12);
        assert!(json["outputs"].get("ac").is_none());
        assert_eq!(json["ssc_info"]["build"], "memory pvwatts");
    }

    #[tokio::test]
    async fn v5_hourly_includes_series() {
        let (state, _weather) = make_test_state();
        let (status, json) = send(
            state,
            get("/api/v5.json?lat=33.816&lon=-118.15&system_capacity=4&timeframe=hourly"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["outputs"]["ac"].as_array().unwrap().len(), 8760);
    }

    #[tokio::test]
    async fn v5_engine_errors_are_200_without_outputs() {
        let (state, _weather) = make_test_state();
        let (status, json) = send(state, get("/api/v5.json?lat=33.816&lon=-118.15")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["errors"][0], "system_capacity: variable required");
        assert!(json.get("outputs").is_none());
    }

    #[tokio::test]
    async fn v5_without_location_returns_422() {
        let (state, _weather) = make_test_state();
        let (status, json) = send(state, get("/api/v5.json?system_capacity=4")).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["error_code"], "InvalidRequest");
        assert_eq!(json["status_code"], 422);
    }

    #[tokio::test]
    async fn v5_malformed_query_returns_422() {
        let (state, _weather) = make_test_state();
        let (status, json) = send(state, get("/api/v5.json?lat=north&lon=0")).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["error_code"], "InvalidRequest");
    }

    #[tokio::test]
    async fn unknown_timeframe_returns_422() {
        let (state, _weather) = make_test_state();
        let (status, json) = send(
            state,
            get("/api/v5.json?lat=33.816&lon=-118.15&system_capacity=4&timeframe=daily"),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["error_code"], "InvalidRequest");
    }

    #[tokio::test]
    async fn v4_returns_200_without_capacity_factor() {
        let (state, _weather) = make_test_state();
        let (status, json) = send(
            state,
            get("/api/v4.json?lat=33.816&lon=-118.15&system_size=4&derate=0.77"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(json["outputs"].get("capacity_factor").is_none());
        assert_eq!(json["inputs"]["system_size"], 4.0);
    }

    #[tokio::test]
    async fn modules_are_listed() {
        let (state, _weather) = make_test_state();
        let (status, json) = send(state, get("/ssc/modules")).await;

        assert_eq!(status, StatusCode::OK);
        let names: Vec<_> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["pvwattsv5", "pvwattsv1"]);
        assert_eq!(json[0]["url"], "/ssc/modules/pvwattsv5");
    }

    #[tokio::test]
    async fn module_summary_lists_variables() {
        let (state, _weather) = make_test_state();
        let (status, json) = send(state, get("/ssc/modules/pvwattsv5")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["version"], 3);
        assert_eq!(json["variables"][1]["name"], "system_capacity");
        assert_eq!(json["variables"][1]["var_type"], "input");
        assert_eq!(json["variables"][1]["data_type"], "number");
    }

    #[tokio::test]
    async fn unknown_module_returns_404() {
        let (state, _weather) = make_test_state();
        let (status, json) = send(state, get("/ssc/modules/asdf")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error_code"], "UnknownModuleName");
        assert_eq!(json["details"], "The module with the name asdf does not exist");
    }

    #[tokio::test]
    async fn post_runs_module_with_json_inputs() {
        let (state, weather) = make_test_state();
        let file = weather.path().join("tmy2").join("23129.tm2");
        let body = serde_json::json!({
            "solar_resource_file": file.to_str().unwrap(),
            "system_capacity": 2.0
        });
        let req = Request::builder()
            .method("POST")
            .uri("/ssc/modules/pvwattsv5")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let (status, json) = send(state, req).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["module"]["name"], "pvwattsv5");
        assert_eq!(json["inputs"]["system_capacity"], 2.0);
        assert_eq!(json["messages"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn post_to_unknown_module_returns_404() {
        let (state, _weather) = make_test_state();
        let req = Request::builder()
            .method("POST")
            .uri("/ssc/modules/asdf")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();

        let (status, _) = send(state, req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn post_with_non_object_body_returns_422() {
        let (state, _weather) = make_test_state();
        let req = Request::builder()
            .method("POST")
            .uri("/ssc/modules/pvwattsv5")
            .header("content-type", "application/json")
            .body(Body::from("[1, 2]"))
            .unwrap();

        let (status, json) = send(state, req).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["error_code"], "InvalidRequest");
    }
}
