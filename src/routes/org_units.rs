use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use chrono::Utc;
use diesel::dsl::count_star;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{NewOrgUnit, OrgUnit};
use crate::routes::requests::to_iso;
use crate::schema::{document_requests, org_units};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateOrgUnitRequest {
    pub code: String,
    pub name: String,
}

#[derive(Deserialize)]
pub struct UpdateOrgUnitRequest {
    pub code: Option<String>,
    pub name: Option<String>,
}

#[derive(Serialize)]
pub struct OrgUnitResponse {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<OrgUnit> for OrgUnitResponse {
    fn from(unit: OrgUnit) -> Self {
        Self {
            id: unit.id,
            code: unit.code,
            name: unit.name,
            created_at: to_iso(unit.created_at),
            updated_at: to_iso(unit.updated_at),
        }
    }
}

fn normalize_code(raw: &str) -> Result<String, AppError> {
    let code = raw.trim().to_uppercase();
    if code.is_empty() {
        return Err(AppError::bad_request("code must not be empty"));
    }
    if code.len() > 16 {
        return Err(AppError::bad_request("code must be at most 16 characters"));
    }
    // Codes end up inside rendered document numbers; keep them clean of the
    // separator characters a template is likely to use.
    if code.chars().any(|ch| !ch.is_ascii_alphanumeric() && ch != '-') {
        return Err(AppError::bad_request(
            "code may only contain letters, digits and dashes",
        ));
    }
    Ok(code)
}

pub async fn list_org_units(State(state): State<AppState>) -> AppResult<Json<Vec<OrgUnitResponse>>> {
    let mut conn = state.db()?;
    let rows: Vec<OrgUnit> = org_units::table.order(org_units::code.asc()).load(&mut conn)?;
    Ok(Json(rows.into_iter().map(OrgUnitResponse::from).collect()))
}

pub async fn create_org_unit(
    State(state): State<AppState>,
    Json(payload): Json<CreateOrgUnitRequest>,
) -> AppResult<(StatusCode, Json<OrgUnitResponse>)> {
    let code = normalize_code(&payload.code)?;
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }

    let mut conn = state.db()?;
    let new_unit = NewOrgUnit {
        id: Uuid::new_v4(),
        code,
        name,
    };

    match diesel::insert_into(org_units::table)
        .values(&new_unit)
        .execute(&mut conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )) => {
            return Err(AppError::bad_request("org unit code already exists"));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    let unit: OrgUnit = org_units::table.find(new_unit.id).first(&mut conn)?;
    Ok((StatusCode::CREATED, Json(unit.into())))
}

pub async fn update_org_unit(
    State(state): State<AppState>,
    Path(unit_id): Path<Uuid>,
    Json(payload): Json<UpdateOrgUnitRequest>,
) -> AppResult<Json<OrgUnitResponse>> {
    let mut conn = state.db()?;
    let existing: OrgUnit = org_units::table.find(unit_id).first(&mut conn)?;

    let code = match payload.code {
        Some(raw) => {
            let code = normalize_code(&raw)?;
            if code != existing.code {
                let duplicate = org_units::table
                    .filter(org_units::code.eq(&code))
                    .filter(org_units::id.ne(unit_id))
                    .first::<OrgUnit>(&mut conn)
                    .optional()?;
                if duplicate.is_some() {
                    return Err(AppError::bad_request("org unit code already exists"));
                }
            }
            code
        }
        None => existing.code.clone(),
    };
    let name = match payload.name {
        Some(raw) => {
            let name = raw.trim().to_string();
            if name.is_empty() {
                return Err(AppError::bad_request("name must not be empty"));
            }
            name
        }
        None => existing.name.clone(),
    };

    diesel::update(org_units::table.find(unit_id))
        .set((
            org_units::code.eq(code),
            org_units::name.eq(name),
            org_units::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut conn)?;

    let updated: OrgUnit = org_units::table.find(unit_id).first(&mut conn)?;
    Ok(Json(updated.into()))
}

pub async fn delete_org_unit(
    State(state): State<AppState>,
    Path(unit_id): Path<Uuid>,
) -> AppResult<impl axum::response::IntoResponse> {
    let mut conn = state.db()?;

    let usage: i64 = document_requests::table
        .filter(document_requests::org_unit_id.eq(unit_id))
        .select(count_star())
        .first(&mut conn)?;
    if usage > 0 {
        return Err(AppError::bad_request(
            "cannot delete an org unit that is referenced by requests",
        ));
    }

    let deleted = diesel::delete(org_units::table.find(unit_id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(AppError::not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}
