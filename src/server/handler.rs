//! Route handlers

use super::AppState;
use super::response::ApiError;
use crate::error::ValidationErrors;
use crate::health::{HealthStatus, HealthVerdict};
use crate::items::{CreateItem, Item, ItemPage, PageRequest, UpdateItem};
use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub service: String,
    pub version: &'static str,
    pub environment: &'static str,
}

#[derive(Debug, Serialize)]
struct DetailedHealth {
    #[serde(flatten)]
    info: ServiceInfo,
    #[serde(flatten)]
    verdict: HealthVerdict,
}

#[derive(Debug, Serialize)]
struct Liveness {
    status: HealthStatus,
}

/// Raw pagination parameters, bounds checked in `page_request`
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl ListParams {
    pub fn page_request(&self) -> Result<PageRequest, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let page = self.page.map_or(Some(1), |p| usize::try_from(p).ok());
        let page_size = self
            .page_size
            .map_or(Some(PageRequest::DEFAULT_PAGE_SIZE), |s| usize::try_from(s).ok());

        let page = page.filter(|&p| p >= 1);
        if page.is_none() {
            errors.add("page", "must be at least 1");
        }
        let page_size = page_size.filter(|s| (1..=PageRequest::MAX_PAGE_SIZE).contains(s));
        if page_size.is_none() {
            errors.add(
                "page_size",
                format!("must be between 1 and {}", PageRequest::MAX_PAGE_SIZE),
            );
        }

        match (page, page_size) {
            (Some(page), Some(page_size)) => Ok(PageRequest { page, page_size }),
            _ => Err(errors),
        }
    }
}

fn service_info(state: &AppState) -> ServiceInfo {
    ServiceInfo {
        service: state.app.name.clone(),
        version: VERSION,
        environment: state.app.environment.as_str(),
    }
}

fn verdict_status(verdict: &HealthVerdict) -> StatusCode {
    if verdict.status.is_serving() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Non-UUID ids cannot name an item, so they are simply not found
fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(format!("Item {raw} not found")))
}

pub async fn root(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(service_info(&state))
}

pub async fn liveness(State(state): State<AppState>) -> impl IntoResponse {
    Json(Liveness {
        status: state.health.liveness(),
    })
}

pub async fn readiness(State(state): State<AppState>) -> Response {
    let verdict = state.health.readiness().await;
    (verdict_status(&verdict), Json(verdict)).into_response()
}

pub async fn health_detailed(State(state): State<AppState>) -> Response {
    let verdict = state.health.readiness().await;
    let body = DetailedHealth {
        info: service_info(&state),
        verdict,
    };
    (verdict_status(&body.verdict), Json(body)).into_response()
}

pub async fn metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    let body = state.metrics.gather().map_err(ApiError::internal)?;
    Ok(([(header::CONTENT_TYPE, METRICS_CONTENT_TYPE)], body).into_response())
}

pub async fn list_items(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<ItemPage>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::Malformed {
        status: StatusCode::UNPROCESSABLE_ENTITY,
        message: e.body_text(),
    })?;
    let page = params.page_request().map_err(ApiError::Validation)?;
    Ok(Json(state.items.list(page)))
}

pub async fn create_item(
    State(state): State<AppState>,
    payload: Result<Json<CreateItem>, JsonRejection>,
) -> Result<(StatusCode, Json<Item>), ApiError> {
    let Json(request) = payload.map_err(rejected_body)?;
    let item = state.items.create(request).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Item>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.items.get(id).await?))
}

pub async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateItem>, JsonRejection>,
) -> Result<Json<Item>, ApiError> {
    let id = parse_id(&id)?;
    let Json(request) = payload.map_err(rejected_body)?;
    Ok(Json(state.items.update(id, request).await?))
}

pub async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    state.items.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Unreadable bodies are validation failures, except a wrong content type
fn rejected_body(rejection: JsonRejection) -> ApiError {
    let status = match rejection.status() {
        StatusCode::UNSUPPORTED_MEDIA_TYPE => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    };
    ApiError::Malformed {
        status,
        message: rejection.body_text(),
    }
}
