use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::alert::engine::{apply_alert_rules, evaluate_alerts, AlertEvent};
use crate::alert::sink::{dispatch_alerts, sinks_from_config};
use crate::config::Config;
use crate::feeding::classifier::ClassifierPolicy;
use crate::feeding::history::{summarize_history, FeedingRecord, HistorySummary};
use crate::feeding::pipeline::{plan_feeding, FeedingReport};
use crate::feeding::{FeedingError, FeedingSubmission};
use crate::herd::ration::{GroupRationProfile, RationBook};
use crate::herd::summary::{summarize_herd, HerdSummary};
use crate::herd::{needing_attention, new_animal_id, Animal, AnimalUpdate, Group, HerdError, NewAnimal};
use crate::store::store::HerdStore;

#[derive(Clone)]
struct ApiState {
    config: Config,
    rations: RationBook,
    policy: ClassifierPolicy,
    db_path: PathBuf,
}

#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    ok: bool,
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(error: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: error.to_string(),
        }
    }
}

impl From<FeedingError> for ApiError {
    fn from(error: FeedingError) -> Self {
        let status = match error {
            FeedingError::Unclassifiable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            FeedingError::InvalidPolicy(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            message: error.to_string(),
        }
    }
}

impl From<HerdError> for ApiError {
    fn from(error: HerdError) -> Self {
        match error {
            HerdError::AnimalNotFound(_) => Self::not_found(error.to_string()),
            _ => Self::bad_request(error.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorBody {
            ok: false,
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug, Clone, Deserialize, Default)]
struct HistoryQuery {
    group: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct FeedingResponse {
    report: FeedingReport,
    alerts: Vec<AlertEvent>,
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    summary: HistorySummary,
    records: Vec<FeedingRecord>,
}

pub async fn run_server(config: Config, bind: SocketAddr) -> Result<()> {
    let state = ApiState {
        rations: config.ration_book()?,
        policy: config.classifier_policy()?,
        db_path: config.resolved_db_path(),
        config,
    };
    {
        let mut store = HerdStore::open(&state.db_path)?;
        if store.seed_if_empty(Utc::now())? {
            info!("seeded empty registry at {}", state.db_path.display());
        }
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/v1/animals", get(list_animals).post(create_animal))
        .route("/v1/animals/:id", put(update_animal))
        .route("/v1/feedings", get(history).post(record_feeding))
        .route("/v1/alerts", get(attention))
        .route("/v1/summary", get(summary))
        .route("/v1/rations", get(rations))
        .route("/v1/config", get(show_config))
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("REST API listening on http://{bind}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<ApiResponse<HealthResponse>> {
    ok(HealthResponse { status: "ok" })
}

async fn show_config(State(state): State<ApiState>) -> Json<ApiResponse<Config>> {
    ok(state.config)
}

async fn rations(State(state): State<ApiState>) -> Json<ApiResponse<Vec<GroupRationProfile>>> {
    ok(state.rations.profiles().cloned().collect())
}

async fn list_animals(State(state): State<ApiState>) -> ApiResult<Vec<Animal>> {
    let store = open_store(&state)?;
    let animals = store.list_animals().map_err(ApiError::internal)?;
    Ok(ok(animals))
}

async fn create_animal(
    State(state): State<ApiState>,
    Json(request): Json<NewAnimal>,
) -> ApiResult<Animal> {
    let now = Utc::now();
    let animal = request.into_animal(new_animal_id(now), now)?;
    let mut store = open_store(&state)?;
    store.insert_animal(&animal).map_err(ApiError::internal)?;
    info!("registered {} ({}) in {}", animal.name, animal.tag_id, animal.group);
    Ok(ok(animal))
}

async fn update_animal(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(update): Json<AnimalUpdate>,
) -> ApiResult<Animal> {
    let mut store = open_store(&state)?;
    let mut animal = store
        .get_animal(&id)
        .map_err(ApiError::internal)?
        .ok_or(HerdError::AnimalNotFound(id))?;
    animal.apply_update(&update, Utc::now())?;
    store.update_animal(&animal).map_err(ApiError::internal)?;
    Ok(ok(animal))
}

async fn record_feeding(
    State(state): State<ApiState>,
    Json(submission): Json<FeedingSubmission>,
) -> ApiResult<FeedingResponse> {
    let report = {
        let mut store = open_store(&state)?;
        let herd = store.list_animals().map_err(ApiError::internal)?;
        let report = plan_feeding(&submission, &herd, &state.rations, &state.policy, Utc::now())?;
        store.commit_feeding(&report).map_err(ApiError::internal)?;
        report
    };

    let alerts = apply_alert_rules(
        evaluate_alerts(&report, &state.config.alerts.admin_email),
        &state.config.alerts.rules,
    );
    if !alerts.is_empty() {
        let sinks = sinks_from_config(&state.config.alerts);
        let pending = alerts.clone();
        tokio::spawn(async move {
            dispatch_alerts(&sinks, &pending).await;
        });
    }

    Ok(ok(FeedingResponse { report, alerts }))
}

async fn history(
    State(state): State<ApiState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<HistoryResponse> {
    let group = parse_group_filter(query.group.as_deref())?;
    let store = open_store(&state)?;
    let records = store
        .load_events(group, query.limit.unwrap_or(50))
        .map_err(ApiError::internal)?;
    Ok(ok(HistoryResponse {
        summary: summarize_history(&records, group),
        records,
    }))
}

async fn attention(State(state): State<ApiState>) -> ApiResult<Vec<Animal>> {
    let store = open_store(&state)?;
    let animals = store.list_animals().map_err(ApiError::internal)?;
    Ok(ok(needing_attention(&animals).into_iter().cloned().collect()))
}

async fn summary(State(state): State<ApiState>) -> ApiResult<HerdSummary> {
    let store = open_store(&state)?;
    let animals = store.list_animals().map_err(ApiError::internal)?;
    Ok(ok(summarize_herd(&animals)))
}

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { ok: true, data })
}

fn open_store(state: &ApiState) -> std::result::Result<HerdStore, ApiError> {
    HerdStore::open(&state.db_path).map_err(ApiError::internal)
}

fn parse_group_filter(raw: Option<&str>) -> std::result::Result<Option<Group>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<Group>()
            .map(Some)
            .map_err(|e| ApiError::bad_request(e.to_string())),
    }
}
