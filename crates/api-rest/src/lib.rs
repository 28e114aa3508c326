//! # API REST
//!
//! REST API for the corridor tracker.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON bodies, status codes, CORS)
//!
//! All workflow rules live in `corridor-core`; handlers only translate between DTOs and
//! [`CorridorService`] calls. Core errors map onto status codes as follows:
//!
//! | error                     | status |
//! |---------------------------|--------|
//! | `Validation`              | 400    |
//! | `NotFound` (reads only)   | 404    |
//! | `GuardViolation`          | 409    |
//! | `CollaboratorUnavailable` | 503    |
//! | anything else             | 500    |

#![warn(rust_2018_idioms)]

pub mod advisory_client;
pub mod dto;

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use corridor_core::pendency::Resolution;
use corridor_core::transfer::TransferRequest;
use corridor_core::{
    AdvisoryOutcome, ConfigValues, CoreConfig, CorridorError, CorridorService,
    EligibilityFilter, JsonFileStore, PatientId,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use advisory_client::HttpAdvisoryClient;
use dto::*;

/// Application state for the REST API server
///
/// Shared by every handler. The service holds the configuration, the record store and
/// the advisory collaborator.
#[derive(Clone)]
pub struct AppState {
    pub service: CorridorService,
}

impl AppState {
    /// Build the state from process environment variables.
    ///
    /// # Environment Variables
    /// - `PATIENT_DATA_DIR`: root of the patient record store (default: "patient_data")
    /// - `CORRIDOR_VENOUS_ACCESS_HOURS`, `CORRIDOR_NEW_RECORD_TTL_SECS`,
    ///   `CORRIDOR_ADVISORY_TIMEOUT_SECS`: tunables
    /// - `CORRIDOR_ADVISORY_URL`: advisory service base URL; advisory features are
    ///   disabled when unset
    ///
    /// # Errors
    /// Returns an error if a tunable is malformed, the store directory cannot be created,
    /// or the advisory client cannot be built.
    pub fn from_env() -> anyhow::Result<Self> {
        let values = ConfigValues {
            patient_data_dir: std::env::var("PATIENT_DATA_DIR").ok(),
            venous_access_hours: std::env::var("CORRIDOR_VENOUS_ACCESS_HOURS").ok(),
            new_record_ttl_secs: std::env::var("CORRIDOR_NEW_RECORD_TTL_SECS").ok(),
            advisory_timeout_secs: std::env::var("CORRIDOR_ADVISORY_TIMEOUT_SECS").ok(),
        };
        let cfg = Arc::new(CoreConfig::from_values(values)?);
        let store = Arc::new(JsonFileStore::open(&cfg)?);
        tracing::info!("patient records under {}", store.root().display());

        let mut service = CorridorService::new(cfg.clone(), store);
        match std::env::var("CORRIDOR_ADVISORY_URL") {
            Ok(url) if !url.trim().is_empty() => {
                let client = HttpAdvisoryClient::new(&url, cfg.advisory_timeout())?;
                tracing::info!("advisory service at {}", client.base_url());
                service = service.with_advisory(Arc::new(client));
            }
            _ => tracing::info!("advisory service not configured"),
        }
        Ok(Self { service })
    }
}

type ApiError = (StatusCode, String);

/// Maps a core error onto an HTTP status. Server-side failures are logged and their
/// details withheld from the client.
fn reject(context: &str, e: CorridorError) -> ApiError {
    let status = match &e {
        CorridorError::Validation(_) => StatusCode::BAD_REQUEST,
        CorridorError::NotFound(_) => StatusCode::NOT_FOUND,
        CorridorError::GuardViolation(_) => StatusCode::CONFLICT,
        CorridorError::CollaboratorUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => {
            tracing::error!("{} error: {:?}", context, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into());
        }
    };
    tracing::warn!("{} rejected: {}", context, e);
    (status, e.to_string())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        list_patients,
        create_patient,
        recent_admissions,
        get_patient,
        update_patient,
        delete_patient,
        pendency_board,
        resolve_pendency,
        request_transfer,
        finalize_transfer,
        cancel_transfer,
        bulk_discharge,
        bulk_delete,
        corridor_stats,
        stale_venous_access,
        advisory_priorities,
        cancel_priorities,
        advisory_summary,
        advisory_handover,
    ),
    components(schemas(
        HealthRes,
        PatientDto,
        ListPatientsRes,
        CreatePatientReq,
        UpdatePatientReq,
        OutcomeRes,
        BoardEntryDto,
        PendencyBoardRes,
        ResolveReq,
        TransferReq,
        FinalizeTransferReq,
        BulkReq,
        BulkDischargeRes,
        BulkDeleteRes,
        SpecialtyCountDto,
        StatsRes,
        PrioritiesReq,
        PriorityEntryDto,
        PrioritiesRes,
        SummaryRes,
        HandoverRes,
    ))
)]
pub struct ApiDoc;

/// Builds the full application router, including Swagger UI and CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/patients", get(list_patients).post(create_patient))
        .route("/patients/recent", get(recent_admissions))
        .route(
            "/patients/:id",
            get(get_patient).put(update_patient).delete(delete_patient),
        )
        .route("/patients/:id/resolutions", post(resolve_pendency))
        .route("/patients/:id/transfer", post(request_transfer))
        .route("/patients/:id/transfer/finalize", post(finalize_transfer))
        .route("/patients/:id/transfer/cancel", post(cancel_transfer))
        .route("/pendencies", get(pendency_board))
        .route("/bulk/discharge", post(bulk_discharge))
        .route("/bulk/delete", post(bulk_delete))
        .route("/stats", get(corridor_stats))
        .route("/venous-access/stale", get(stale_venous_access))
        .route(
            "/advisory/priorities",
            post(advisory_priorities).delete(cancel_priorities),
        )
        .route("/advisory/summary", get(advisory_summary))
        .route("/advisory/handover", get(advisory_handover))
        .merge(
            SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Corridor REST API is alive".into(),
    })
}

// ============================================================================
// PATIENTS
// ============================================================================

#[utoipa::path(
    get,
    path = "/patients",
    params(ListParams),
    responses(
        (status = 200, description = "Patients in the requested view, sorted by name", body = ListPatientsRes),
        (status = 400, description = "Unknown view"),
        (status = 500, description = "Internal server error")
    )
)]
/// List patients
///
/// Defaults to the active corridor. `history` lists finalized transfers and discharges.
#[axum::debug_handler]
async fn list_patients(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListPatientsRes>, ApiError> {
    let query = params
        .into_query()
        .map_err(|e| reject("List patients", e))?;
    let patients = state
        .service
        .list(&query)
        .map_err(|e| reject("List patients", e))?;
    Ok(Json(patient_list(&patients)))
}

#[utoipa::path(
    post,
    path = "/patients",
    request_body = CreatePatientReq,
    responses(
        (status = 201, description = "Patient admitted", body = PatientDto),
        (status = 400, description = "Bad request"),
        (status = 500, description = "Internal server error")
    )
)]
/// Admit a patient to the corridor
///
/// The record starts `Admitted`, with no pendency and no safety identification.
#[axum::debug_handler]
async fn create_patient(
    State(state): State<AppState>,
    Json(req): Json<CreatePatientReq>,
) -> Result<(StatusCode, Json<PatientDto>), ApiError> {
    let input = req
        .into_new_patient()
        .map_err(|e| reject("Create patient", e))?;
    let patient = state
        .service
        .admit(input)
        .map_err(|e| reject("Create patient", e))?;
    Ok((StatusCode::CREATED, Json(PatientDto::from(&patient))))
}

#[utoipa::path(
    get,
    path = "/patients/recent",
    responses(
        (status = 200, description = "Active patients admitted within the new-record window", body = ListPatientsRes),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn recent_admissions(
    State(state): State<AppState>,
) -> Result<Json<ListPatientsRes>, ApiError> {
    let patients = state
        .service
        .recent_admissions()
        .map_err(|e| reject("Recent admissions", e))?;
    Ok(Json(patient_list(&patients)))
}

#[utoipa::path(
    get,
    path = "/patients/{id}",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Patient record", body = PatientDto),
        (status = 404, description = "No such patient")
    )
)]
#[axum::debug_handler]
async fn get_patient(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<PatientDto>, ApiError> {
    let patient = state
        .service
        .get(&PatientId::new(id))
        .map_err(|e| reject("Get patient", e))?;
    Ok(Json(PatientDto::from(&patient)))
}

#[utoipa::path(
    put,
    path = "/patients/{id}",
    params(("id" = String, Path, description = "Patient id")),
    request_body = UpdatePatientReq,
    responses(
        (status = 200, description = "Edit outcome", body = OutcomeRes),
        (status = 400, description = "Bad request"),
        (status = 409, description = "Patient already finalized")
    )
)]
/// Edit a patient record
///
/// Transfer state cannot be changed here; use the transfer endpoints.
#[axum::debug_handler]
async fn update_patient(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<UpdatePatientReq>,
) -> Result<Json<OutcomeRes>, ApiError> {
    let edit = req.into_edit().map_err(|e| reject("Update patient", e))?;
    let outcome = state
        .service
        .edit(&PatientId::new(id), edit)
        .map_err(|e| reject("Update patient", e))?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(
    delete,
    path = "/patients/{id}",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Delete outcome; unknown ids report notFound", body = OutcomeRes),
        (status = 500, description = "Internal server error")
    )
)]
/// Permanently delete a patient record
#[axum::debug_handler]
async fn delete_patient(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<OutcomeRes>, ApiError> {
    let outcome = state
        .service
        .delete(&PatientId::new(id))
        .map_err(|e| reject("Delete patient", e))?;
    Ok(Json(outcome.into()))
}

// ============================================================================
// PENDENCIES
// ============================================================================

#[utoipa::path(
    get,
    path = "/pendencies",
    responses(
        (status = 200, description = "Active patients by pendency bucket; buckets overlap", body = PendencyBoardRes),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn pendency_board(State(state): State<AppState>) -> Result<Json<PendencyBoardRes>, ApiError> {
    let board = state
        .service
        .pendency_board()
        .map_err(|e| reject("Pendency board", e))?;
    Ok(Json(PendencyBoardRes::from(&board)))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/resolutions",
    params(("id" = String, Path, description = "Patient id")),
    request_body = ResolveReq,
    responses(
        (status = 200, description = "Resolution outcome", body = OutcomeRes),
        (status = 400, description = "Unknown action"),
        (status = 409, description = "Action does not match the patient's pendency or status")
    )
)]
/// Apply a pendency resolution action
#[axum::debug_handler]
async fn resolve_pendency(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<ResolveReq>,
) -> Result<Json<OutcomeRes>, ApiError> {
    let resolution =
        Resolution::from_action(&req.action, req.diet).map_err(|e| reject("Resolve", e))?;
    let outcome = state
        .service
        .resolve(&PatientId::new(id), resolution)
        .map_err(|e| reject("Resolve", e))?;
    Ok(Json(outcome.into()))
}

// ============================================================================
// TRANSFERS
// ============================================================================

#[utoipa::path(
    post,
    path = "/patients/{id}/transfer",
    params(("id" = String, Path, description = "Patient id")),
    request_body = TransferReq,
    responses(
        (status = 200, description = "Request outcome", body = OutcomeRes),
        (status = 400, description = "Missing sector or bed"),
        (status = 409, description = "Transfer cannot be requested in the current state")
    )
)]
/// Request a transfer to a ward sector and bed
#[axum::debug_handler]
async fn request_transfer(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<TransferReq>,
) -> Result<Json<OutcomeRes>, ApiError> {
    let request =
        TransferRequest::new(&req.sector, &req.bed).map_err(|e| reject("Request transfer", e))?;
    let outcome = state
        .service
        .request_transfer(&PatientId::new(id), &request)
        .map_err(|e| reject("Request transfer", e))?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/transfer/finalize",
    params(("id" = String, Path, description = "Patient id")),
    request_body = FinalizeTransferReq,
    responses(
        (status = 200, description = "Finalize outcome", body = OutcomeRes),
        (status = 400, description = "External transfer without destination"),
        (status = 409, description = "No transfer to finalize")
    )
)]
/// Finalize a transfer
///
/// External transfers need the receiving facility in `destination`.
#[axum::debug_handler]
async fn finalize_transfer(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<FinalizeTransferReq>,
) -> Result<Json<OutcomeRes>, ApiError> {
    let outcome = state
        .service
        .finalize_transfer(&PatientId::new(id), req.destination.as_deref())
        .map_err(|e| reject("Finalize transfer", e))?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/transfer/cancel",
    params(("id" = String, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Cancel outcome", body = OutcomeRes),
        (status = 409, description = "Transfer already finalized")
    )
)]
#[axum::debug_handler]
async fn cancel_transfer(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<OutcomeRes>, ApiError> {
    let outcome = state
        .service
        .cancel_transfer(&PatientId::new(id))
        .map_err(|e| reject("Cancel transfer", e))?;
    Ok(Json(outcome.into()))
}

// ============================================================================
// BULK
// ============================================================================

#[utoipa::path(
    post,
    path = "/bulk/discharge",
    request_body = BulkReq,
    responses(
        (status = 200, description = "Discharge report", body = BulkDischargeRes),
        (status = 400, description = "Empty id list"),
        (status = 500, description = "Nothing was discharged")
    )
)]
/// Discharge and finalize every listed patient
///
/// Coordinator override: open social-work pendencies do not block the discharge and are
/// listed in `bypassedAdminGate`.
#[axum::debug_handler]
async fn bulk_discharge(
    State(state): State<AppState>,
    Json(req): Json<BulkReq>,
) -> Result<Json<BulkDischargeRes>, ApiError> {
    let report = state
        .service
        .bulk_discharge(&req.patient_ids())
        .map_err(|e| reject("Bulk discharge", e))?;
    Ok(Json(report.into()))
}

#[utoipa::path(
    post,
    path = "/bulk/delete",
    request_body = BulkReq,
    responses(
        (status = 200, description = "Delete report", body = BulkDeleteRes),
        (status = 400, description = "Empty id list"),
        (status = 500, description = "Nothing was deleted")
    )
)]
/// Permanently delete every listed patient, all or nothing
#[axum::debug_handler]
async fn bulk_delete(
    State(state): State<AppState>,
    Json(req): Json<BulkReq>,
) -> Result<Json<BulkDeleteRes>, ApiError> {
    let report = state
        .service
        .bulk_delete(&req.patient_ids())
        .map_err(|e| reject("Bulk delete", e))?;
    Ok(Json(report.into()))
}

// ============================================================================
// READ MODELS
// ============================================================================

#[utoipa::path(
    get,
    path = "/stats",
    responses(
        (status = 200, description = "Corridor statistics", body = StatsRes),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn corridor_stats(State(state): State<AppState>) -> Result<Json<StatsRes>, ApiError> {
    let stats = state.service.stats().map_err(|e| reject("Stats", e))?;
    Ok(Json(stats.into()))
}

#[utoipa::path(
    get,
    path = "/venous-access/stale",
    responses(
        (status = 200, description = "Active patients whose venous access is due for replacement", body = ListPatientsRes),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn stale_venous_access(
    State(state): State<AppState>,
) -> Result<Json<ListPatientsRes>, ApiError> {
    let patients = state
        .service
        .stale_venous_access()
        .map_err(|e| reject("Stale venous access", e))?;
    Ok(Json(patient_list(&patients)))
}

// ============================================================================
// ADVISORY
// ============================================================================

#[utoipa::path(
    post,
    path = "/advisory/priorities",
    request_body = PrioritiesReq,
    responses(
        (status = 200, description = "Advisory ranking, or list order when the service is unavailable", body = PrioritiesRes),
        (status = 500, description = "Internal server error")
    )
)]
/// Rank eligible patients with the advisory service
///
/// Never fails because of the advisory service itself: `status` reports `unavailable`
/// and the entries keep list order.
#[axum::debug_handler]
async fn advisory_priorities(
    State(state): State<AppState>,
    Json(req): Json<PrioritiesReq>,
) -> Result<Json<PrioritiesRes>, ApiError> {
    let filter = if req.chairs_only {
        EligibilityFilter::ChairsOnly
    } else {
        EligibilityFilter::All
    };
    let outcome = state
        .service
        .prioritize(filter)
        .await
        .map_err(|e| reject("Advisory priorities", e))?;

    let res = match outcome {
        AdvisoryOutcome::Ranked(ranked) => PrioritiesRes {
            status: "ranked".into(),
            reason: None,
            entries: ranked.iter().map(PriorityEntryDto::from).collect(),
        },
        AdvisoryOutcome::Unavailable { reason, unranked } => PrioritiesRes {
            status: "unavailable".into(),
            reason: Some(reason),
            entries: unranked.iter().map(PriorityEntryDto::from).collect(),
        },
        AdvisoryOutcome::Stale => PrioritiesRes {
            status: "stale".into(),
            reason: Some("patient list changed while the request was in flight".into()),
            entries: Vec::new(),
        },
    };
    Ok(Json(res))
}

#[utoipa::path(
    delete,
    path = "/advisory/priorities",
    responses(
        (status = 204, description = "Any in-flight ranking will be reported as stale")
    )
)]
#[axum::debug_handler]
async fn cancel_priorities(State(state): State<AppState>) -> StatusCode {
    state.service.cancel_prioritization();
    StatusCode::NO_CONTENT
}

#[utoipa::path(
    get,
    path = "/advisory/summary",
    responses(
        (status = 200, description = "Narrative summary of the corridor, if available", body = SummaryRes),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn advisory_summary(State(state): State<AppState>) -> Result<Json<SummaryRes>, ApiError> {
    let summary = state
        .service
        .summarize()
        .await
        .map_err(|e| reject("Advisory summary", e))?;
    Ok(Json(SummaryRes {
        available: summary.is_some(),
        summary,
    }))
}

#[utoipa::path(
    get,
    path = "/advisory/handover",
    params(HandoverParams),
    responses(
        (status = 200, description = "Shift handover for one corridor, if available", body = HandoverRes),
        (status = 400, description = "Blank corridor"),
        (status = 500, description = "Internal server error")
    )
)]
/// Shift handover narrative for the active patients of one corridor
///
/// `available` is false when the corridor has no active patients or the advisory
/// service is unavailable.
#[axum::debug_handler]
async fn advisory_handover(
    State(state): State<AppState>,
    Query(params): Query<HandoverParams>,
) -> Result<Json<HandoverRes>, ApiError> {
    let handover = state
        .service
        .handover(&params.corridor)
        .await
        .map_err(|e| reject("Advisory handover", e))?;
    Ok(Json(HandoverRes {
        corridor: params.corridor.trim().to_string(),
        available: handover.is_some(),
        handover,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use corridor_core::{FixedClock, MemoryStore};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app() -> Router {
        let cfg = Arc::new(CoreConfig::with_defaults("patient_data").unwrap());
        let now = chrono::DateTime::parse_from_rfc3339("2024-01-12T10:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        let service = CorridorService::new(cfg, Arc::new(MemoryStore::new()))
            .with_clock(Arc::new(FixedClock(now)));
        router(AppState { service })
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    async fn admit(app: &Router, name: &str) -> String {
        let (status, body) = send(
            app,
            Method::POST,
            "/patients",
            Some(serde_json::json!({ "name": name, "medicalRecord": "4411" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_reports_alive() {
        let (status, body) = send(&app(), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn admitted_patient_is_listed_and_on_the_safety_board() {
        let app = app();
        let id = admit(&app, "Maria Souza").await;

        let (_, list) = send(&app, Method::GET, "/patients?search=souza", None).await;
        assert_eq!(list["patients"][0]["id"], id.as_str());

        let (_, board) = send(&app, Method::GET, "/pendencies", None).await;
        assert_eq!(board["safety"][0]["patient"]["id"], id.as_str());
        assert_eq!(board["safety"][0]["suggestedAction"], "safety");
    }

    #[tokio::test]
    async fn fresh_admission_is_recent() {
        let app = app();
        let id = admit(&app, "Carla").await;
        let (status, body) = send(&app, Method::GET, "/patients/recent", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["patients"][0]["id"], id.as_str());
    }

    #[tokio::test]
    async fn blank_name_is_bad_request() {
        let (status, _) = send(
            &app(),
            Method::POST,
            "/patients",
            Some(serde_json::json!({ "name": "  " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn external_finalize_without_destination_is_bad_request() {
        let app = app();
        let id = admit(&app, "Ana").await;
        send(
            &app,
            Method::PUT,
            &format!("/patients/{id}"),
            Some(serde_json::json!({ "status": "transferExternal" })),
        )
        .await;

        let uri = format!("/patients/{id}/transfer/finalize");
        let (status, _) = send(&app, Method::POST, &uri, Some(serde_json::json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            Method::POST,
            &uri,
            Some(serde_json::json!({ "destination": "hospital x" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "applied");

        let (_, patient) = send(&app, Method::GET, &format!("/patients/{id}"), None).await;
        assert_eq!(patient["transferDestinationBed"], "HOSPITAL X");
        assert_eq!(patient["isTransferred"], true);
    }

    #[tokio::test]
    async fn transfer_request_for_auto_status_is_conflict() {
        let app = app();
        let id = admit(&app, "Ana").await;
        send(
            &app,
            Method::PUT,
            &format!("/patients/{id}"),
            Some(serde_json::json!({ "status": "TransferToSecondaryFacility" })),
        )
        .await;

        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/patients/{id}/transfer"),
            Some(serde_json::json!({ "sector": "ward 3", "bed": "2" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found_on_read_but_no_op_on_write() {
        let app = app();
        let (status, _) = send(&app, Method::GET, "/patients/ghost", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, Method::DELETE, "/patients/ghost", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "notFound");
    }

    #[tokio::test]
    async fn bulk_delete_with_empty_ids_is_bad_request() {
        let (status, _) = send(
            &app(),
            Method::POST,
            "/bulk/delete",
            Some(serde_json::json!({ "ids": [] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn bulk_discharge_moves_patients_to_history() {
        let app = app();
        let a = admit(&app, "Ana").await;
        let b = admit(&app, "Bruno").await;

        let (status, report) = send(
            &app,
            Method::POST,
            "/bulk/discharge",
            Some(serde_json::json!({ "ids": [a, b] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["discharged"].as_array().unwrap().len(), 2);

        let (_, active) = send(&app, Method::GET, "/patients", None).await;
        assert!(active["patients"].as_array().unwrap().is_empty());
        let (_, history) = send(&app, Method::GET, "/patients?view=history", None).await;
        assert_eq!(history["patients"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn advisory_without_service_degrades() {
        let app = app();
        admit(&app, "Ana").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/advisory/priorities",
            Some(serde_json::json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "unavailable");
        assert_eq!(body["entries"].as_array().unwrap().len(), 1);

        let (_, summary) = send(&app, Method::GET, "/advisory/summary", None).await;
        assert_eq!(summary["available"], false);
    }

    #[tokio::test]
    async fn handover_without_service_degrades_and_blank_corridor_is_bad_request() {
        let app = app();
        let (status, _) = send(
            &app,
            Method::POST,
            "/patients",
            Some(serde_json::json!({ "name": "Ana", "corridor": "Corridor 1" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(
            &app,
            Method::GET,
            "/advisory/handover?corridor=Corridor%201",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["corridor"], "Corridor 1");
        assert_eq!(body["available"], false);
        assert!(body["handover"].is_null());

        let (status, _) = send(&app, Method::GET, "/advisory/handover?corridor=%20", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
