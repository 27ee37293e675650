use std::net::SocketAddr;
use std::path::PathBuf;

use axum::{
    Router,
    extract::{Json, Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::advisory::AdvisoryClient;
use crate::core::{
    Asset, FinancialSettings, IncomeStream, InputError, SimulationResult, run_simulation,
    validate_inputs,
};
use crate::scenario::{ScenarioError, ScenarioLibrary};

#[derive(Debug, Clone)]
pub struct AppState {
    pub advisor: AdvisoryClient,
    pub scenario_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimulatePayload {
    settings: FinancialSettings,
    #[serde(default)]
    assets: Vec<Asset>,
    #[serde(default)]
    income_streams: Vec<IncomeStream>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdvicePayload {
    #[serde(flatten)]
    inputs: SimulatePayload,
    #[serde(default)]
    question: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewScenarioPayload {
    name: String,
    #[serde(flatten)]
    inputs: SimulatePayload,
}

#[derive(Debug, Deserialize)]
struct ActiveScenarioPayload {
    id: String,
}

#[derive(Debug)]
struct SimulateRequest {
    settings: FinancialSettings,
    assets: Vec<Asset>,
    income_streams: Vec<IncomeStream>,
}

impl SimulateRequest {
    fn run(&self) -> SimulationResult {
        run_simulation(&self.settings, &self.assets, &self.income_streams)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AdviceResponse {
    advice: String,
    result: SimulationResult,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn simulate_request_from_payload(payload: SimulatePayload) -> Result<SimulateRequest, InputError> {
    validate_inputs(&payload.settings, &payload.assets, &payload.income_streams)?;
    Ok(SimulateRequest {
        settings: payload.settings,
        assets: payload.assets,
        income_streams: payload.income_streams,
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/simulate", post(simulate_handler))
        .route("/api/advice", post(advice_handler))
        .route(
            "/api/scenarios",
            get(get_scenarios_handler)
                .put(put_scenarios_handler)
                .post(add_scenario_handler),
        )
        .route("/api/scenarios/active", put(set_active_handler))
        .route(
            "/api/scenarios/active/simulation",
            get(active_simulation_handler),
        )
        .route("/api/scenarios/:id", delete(delete_scenario_handler))
        .route("/api/scenarios/:id/clone", post(clone_scenario_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

pub async fn run_http_server(port: u16, state: AppState) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "runway HTTP API listening");

    axum::serve(listener, app).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, serde_json::json!({ "status": "ok" }))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_handler(Json(payload): Json<SimulatePayload>) -> Response {
    let request = match simulate_request_from_payload(payload) {
        Ok(request) => request,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    let result = request.run();
    info!(
        years = result.data.len(),
        success = result.success,
        depletion_age = ?result.depletion_age,
        "simulation complete"
    );
    json_response(StatusCode::OK, result)
}

async fn advice_handler(
    State(state): State<AppState>,
    Json(payload): Json<AdvicePayload>,
) -> Response {
    let request = match simulate_request_from_payload(payload.inputs) {
        Ok(request) => request,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    let result = request.run();
    let advice = state
        .advisor
        .narrate(&request.settings, &result, payload.question.as_deref())
        .await;
    json_response(StatusCode::OK, AdviceResponse { advice, result })
}

async fn get_scenarios_handler(State(state): State<AppState>) -> Response {
    match load_library(&state).await {
        Ok(library) => json_response(StatusCode::OK, library),
        Err(response) => response,
    }
}

async fn put_scenarios_handler(State(state): State<AppState>, body: String) -> Response {
    let Some(path) = state.scenario_file.as_deref() else {
        return error_response(StatusCode::NOT_FOUND, "No scenario file configured");
    };

    let library = match ScenarioLibrary::from_json(&body) {
        Ok(library) => library,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };
    if let Err(e) = library.save(path).await {
        return scenario_error_response(e);
    }
    json_response(StatusCode::OK, library)
}

async fn add_scenario_handler(
    State(state): State<AppState>,
    Json(payload): Json<NewScenarioPayload>,
) -> Response {
    let request = match simulate_request_from_payload(payload.inputs) {
        Ok(request) => request,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };
    let name = payload.name;

    edit_library(&state, move |library| {
        library
            .add(
                &name,
                request.settings,
                request.assets,
                request.income_streams,
                Utc::now(),
            )
            .map(|_| ())
    })
    .await
}

async fn clone_scenario_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    edit_library(&state, move |library| {
        library.clone_scenario(&id, Utc::now()).map(|_| ())
    })
    .await
}

async fn delete_scenario_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    edit_library(&state, move |library| library.delete(&id).map(|_| ())).await
}

async fn set_active_handler(
    State(state): State<AppState>,
    Json(payload): Json<ActiveScenarioPayload>,
) -> Response {
    edit_library(&state, move |library| library.set_active(&payload.id)).await
}

async fn active_simulation_handler(State(state): State<AppState>) -> Response {
    let library = match load_library(&state).await {
        Ok(library) => library,
        Err(response) => return response,
    };
    let Some(scenario) = library.active() else {
        return error_response(StatusCode::NOT_FOUND, "No active scenario");
    };

    let result = run_simulation(
        &scenario.settings,
        &scenario.assets,
        &scenario.income_streams,
    );
    json_response(StatusCode::OK, result)
}

// A configured but not yet created file reads as the starter library.
async fn load_library(state: &AppState) -> Result<ScenarioLibrary, Response> {
    let Some(path) = state.scenario_file.as_deref() else {
        return Err(error_response(
            StatusCode::NOT_FOUND,
            "No scenario file configured",
        ));
    };

    match ScenarioLibrary::load(path).await {
        Ok(library) => Ok(library),
        Err(ScenarioError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            Ok(ScenarioLibrary::with_default(Utc::now()))
        }
        Err(e) => Err(scenario_error_response(e)),
    }
}

// Loads the library, applies one edit and writes it back. Nothing is written
// when the edit is refused.
async fn edit_library<F>(state: &AppState, edit: F) -> Response
where
    F: FnOnce(&mut ScenarioLibrary) -> Result<(), ScenarioError>,
{
    let Some(path) = state.scenario_file.as_deref() else {
        return error_response(StatusCode::NOT_FOUND, "No scenario file configured");
    };
    let mut library = match load_library(state).await {
        Ok(library) => library,
        Err(response) => return response,
    };

    if let Err(e) = edit(&mut library) {
        let status = match e {
            ScenarioError::UnknownScenario(_) => StatusCode::NOT_FOUND,
            ScenarioError::LastScenario | ScenarioError::InvalidInputs { .. } => {
                StatusCode::BAD_REQUEST
            }
            _ => return scenario_error_response(e),
        };
        return error_response(status, &e.to_string());
    }
    if let Err(e) = library.save(path).await {
        return scenario_error_response(e);
    }
    json_response(StatusCode::OK, library)
}

fn scenario_error_response(err: ScenarioError) -> Response {
    warn!(error = %err, "scenario file error");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
