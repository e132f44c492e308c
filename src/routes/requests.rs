use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{DocumentRequest, OrgUnit, WorkflowHistoryEntry};
use crate::schema::{document_requests, org_units};
use crate::state::AppState;
use crate::workflow::{self, Outcome, Stage};

pub(crate) fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}

#[derive(Deserialize)]
pub struct SubmitRequest {
    pub owner_id: Uuid,
    pub category: String,
    pub org_unit_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct ForwardRequest {
    pub actor_id: Uuid,
    pub expected_stage: Stage,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct DecisionRequest {
    pub actor_id: Uuid,
    pub expected_stage: Stage,
    pub outcome: Outcome,
    pub notes: Option<String>,
    pub idempotency_key: Option<String>,
}

#[derive(Deserialize)]
pub struct RequestListQuery {
    pub stage: Option<Stage>,
    pub category: Option<String>,
    pub org_unit_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct RequestResponse {
    pub id: Uuid,
    pub category: String,
    pub owner_id: Uuid,
    pub org_unit_id: Option<Uuid>,
    pub stage: String,
    pub assigned_to: Option<String>,
    pub forwarded_by: Option<Uuid>,
    pub forwarded_at: Option<String>,
    pub decided_by: Option<Uuid>,
    pub decided_at: Option<String>,
    pub decision_notes: Option<String>,
    pub document_number: Option<String>,
    pub artifact_ref: Option<String>,
    pub rendered_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<DocumentRequest> for RequestResponse {
    fn from(request: DocumentRequest) -> Self {
        Self {
            id: request.id,
            category: request.category,
            owner_id: request.owner_id,
            org_unit_id: request.org_unit_id,
            stage: request.stage,
            assigned_to: request.assigned_to,
            forwarded_by: request.forwarded_by,
            forwarded_at: request.forwarded_at.map(to_iso),
            decided_by: request.decided_by,
            decided_at: request.decided_at.map(to_iso),
            decision_notes: request.decision_notes,
            document_number: request.document_number,
            artifact_ref: request.artifact_ref,
            rendered_at: request.rendered_at.map(to_iso),
            created_at: to_iso(request.created_at),
            updated_at: to_iso(request.updated_at),
        }
    }
}

#[derive(Serialize)]
pub struct RequestDetailResponse {
    pub request: RequestResponse,
}

#[derive(Serialize)]
pub struct HistoryEntryResponse {
    pub id: Uuid,
    pub action: String,
    pub actor_id: Uuid,
    pub actor_role: String,
    pub notes: Option<String>,
    pub created_at: String,
}

impl From<WorkflowHistoryEntry> for HistoryEntryResponse {
    fn from(entry: WorkflowHistoryEntry) -> Self {
        Self {
            id: entry.id,
            action: entry.action,
            actor_id: entry.actor_id,
            actor_role: entry.actor_role,
            notes: entry.notes,
            created_at: to_iso(entry.created_at),
        }
    }
}

pub async fn submit_request(
    State(state): State<AppState>,
    Json(payload): Json<SubmitRequest>,
) -> AppResult<(StatusCode, Json<RequestDetailResponse>)> {
    let category = payload.category.trim();
    if category.is_empty() {
        return Err(AppError::bad_request("category must not be empty"));
    }

    let mut conn = state.db()?;

    if let Some(unit_id) = payload.org_unit_id {
        let unit: Option<OrgUnit> = org_units::table.find(unit_id).first(&mut conn).optional()?;
        if unit.is_none() {
            return Err(AppError::bad_request("org unit does not exist"));
        }
    }

    let request = workflow::submit(&mut conn, payload.owner_id, category, payload.org_unit_id)?;
    Ok((
        StatusCode::CREATED,
        Json(RequestDetailResponse {
            request: request.into(),
        }),
    ))
}

pub async fn list_requests(
    State(state): State<AppState>,
    Query(query): Query<RequestListQuery>,
) -> AppResult<Json<Vec<RequestResponse>>> {
    let mut conn = state.db()?;

    let mut statement = document_requests::table
        .order(document_requests::created_at.desc())
        .into_boxed();

    if let Some(stage) = query.stage {
        statement = statement.filter(document_requests::stage.eq(stage.as_str()));
    }
    if let Some(category) = query.category {
        statement = statement.filter(document_requests::category.eq(category));
    }
    if let Some(org_unit_id) = query.org_unit_id {
        statement = statement.filter(document_requests::org_unit_id.eq(org_unit_id));
    }

    let rows: Vec<DocumentRequest> = statement.load(&mut conn)?;
    Ok(Json(rows.into_iter().map(RequestResponse::from).collect()))
}

pub async fn get_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> AppResult<Json<RequestDetailResponse>> {
    let mut conn = state.db()?;
    let request: DocumentRequest = document_requests::table.find(request_id).first(&mut conn)?;
    Ok(Json(RequestDetailResponse {
        request: request.into(),
    }))
}

pub async fn get_request_history(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> AppResult<Json<Vec<HistoryEntryResponse>>> {
    let mut conn = state.db()?;
    let entries = workflow::history(&mut conn, request_id)?;
    Ok(Json(
        entries.into_iter().map(HistoryEntryResponse::from).collect(),
    ))
}

pub async fn forward_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    Json(payload): Json<ForwardRequest>,
) -> AppResult<Json<RequestDetailResponse>> {
    let mut conn = state.db()?;
    let request = workflow::forward(
        &mut conn,
        request_id,
        payload.actor_id,
        payload.expected_stage,
        payload.notes,
    )?;
    Ok(Json(RequestDetailResponse {
        request: request.into(),
    }))
}

pub async fn decide_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    Json(payload): Json<DecisionRequest>,
) -> AppResult<Json<RequestDetailResponse>> {
    let mut conn = state.db()?;
    let request = workflow::decide(
        &mut conn,
        request_id,
        payload.actor_id,
        payload.expected_stage,
        payload.outcome,
        payload.notes,
        payload.idempotency_key,
    )?;
    Ok(Json(RequestDetailResponse {
        request: request.into(),
    }))
}
