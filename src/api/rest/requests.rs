use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::error::Category;

use crate::error::AppError;
use crate::models::request::{opaque_string, CreateDeliveryRequest, RequestView};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/create-request", post(create_request))
        .route("/api/accept-request", post(accept_request))
        .route("/api/update-status", post(update_status))
        .route("/api/verify-otp", post(verify_otp))
        .route("/api/get-requests", get(get_requests))
        .route("/api/poll", get(poll))
}

#[derive(Deserialize, Default)]
pub struct AcceptRequest {
    pub id: Option<String>,
    pub partner_name: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct UpdateStatusRequest {
    pub id: Option<String>,
    pub status: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct VerifyOtpRequest {
    pub id: Option<String>,
    #[serde(default, deserialize_with = "opaque_string")]
    pub otp: Option<String>,
}

#[derive(Deserialize)]
pub struct GetRequestsQuery {
    pub id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct PollQuery {
    pub id: Option<String>,
}

#[derive(Serialize)]
struct Success<T> {
    success: bool,
    #[serde(flatten)]
    body: T,
}

fn success<T: Serialize>(body: T) -> Json<Success<T>> {
    Json(Success {
        success: true,
        body,
    })
}

#[derive(Serialize)]
struct Created {
    id: String,
}

fn parse_body<T>(body: &Bytes) -> Result<T, AppError>
where
    T: DeserializeOwned + Default,
{
    if body.is_empty() {
        return Ok(T::default());
    }

    serde_json::from_slice(body).map_err(|err| match err.classify() {
        Category::Data => AppError::InvalidInput(format!("Invalid field: {err}")),
        _ => AppError::InvalidInput("Invalid JSON".to_string()),
    })
}

async fn create_request(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let fields: CreateDeliveryRequest = parse_body(&body)?;
    let id = state.service.create(fields)?;

    Ok((StatusCode::CREATED, success(Created { id })))
}

async fn accept_request(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let payload: AcceptRequest = parse_body(&body)?;
    let outcome = state.service.accept(
        payload.id.as_deref().unwrap_or_default(),
        payload.partner_name.as_deref().unwrap_or_default(),
    )?;

    Ok(success(outcome))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let payload: UpdateStatusRequest = parse_body(&body)?;
    let outcome = state.service.update_status(
        payload.id.as_deref().unwrap_or_default(),
        payload.status.as_deref().unwrap_or_default(),
    )?;

    Ok(success(outcome))
}

async fn verify_otp(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let payload: VerifyOtpRequest = parse_body(&body)?;
    let outcome = state.service.verify_otp(
        payload.id.as_deref().unwrap_or_default(),
        payload.otp.as_deref().unwrap_or_default(),
    )?;

    Ok(success(outcome))
}

async fn get_requests(
    State(state): State<Arc<AppState>>,
    query: Result<Query<GetRequestsQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(query) = query.map_err(|err| AppError::InvalidInput(err.body_text()))?;

    match query.id.as_deref().filter(|id| !id.is_empty()) {
        Some(id) => Ok(Json(state.service.get_by_id(id)?).into_response()),
        None => {
            let views = state.service.list(query.status.as_deref(), query.limit);
            Ok(Json(views).into_response())
        }
    }
}

async fn poll(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PollQuery>,
) -> Result<Json<Option<RequestView>>, AppError> {
    let id = query
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::InvalidInput("Missing id parameter".to_string()))?;

    Ok(Json(state.service.poll(&id)))
}
