use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use chrono::{Datelike, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::{NewNumberingTemplate, NumberingTemplate};
use crate::numbering::{template, RenderContext, ResetPolicy};
use crate::routes::requests::to_iso;
use crate::schema::numbering_templates;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateTemplateRequest {
    pub category: String,
    pub template: String,
    pub reset_policy: String,
}

#[derive(Deserialize)]
pub struct UpdateTemplateRequest {
    pub template: Option<String>,
    pub reset_policy: Option<String>,
}

#[derive(Serialize)]
pub struct TemplateResponse {
    pub category: String,
    pub template: String,
    pub reset_policy: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<NumberingTemplate> for TemplateResponse {
    fn from(tpl: NumberingTemplate) -> Self {
        Self {
            category: tpl.category,
            template: tpl.template,
            reset_policy: tpl.reset_policy,
            created_at: to_iso(tpl.created_at),
            updated_at: to_iso(tpl.updated_at),
        }
    }
}

/// Reject templates that could never render instead of discovering the
/// defect at the first approval.
fn validate_template(raw: &str) -> Result<(), AppError> {
    let today = Utc::now().date_naive();
    let probe = RenderContext {
        sequence: 1,
        category: "PROBE",
        org_unit_code: "UNIT",
        issued_on: today.with_day(1).unwrap_or(today),
    };
    template::render(raw, &probe)
        .map(|_| ())
        .map_err(|err| AppError::bad_request(err.to_string()))
}

pub async fn list_templates(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<TemplateResponse>>> {
    let mut conn = state.db()?;
    let rows: Vec<NumberingTemplate> = numbering_templates::table
        .order(numbering_templates::category.asc())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(TemplateResponse::from).collect()))
}

pub async fn create_template(
    State(state): State<AppState>,
    Json(payload): Json<CreateTemplateRequest>,
) -> AppResult<(StatusCode, Json<TemplateResponse>)> {
    let category = payload.category.trim().to_string();
    if category.is_empty() {
        return Err(AppError::bad_request("category must not be empty"));
    }
    if ResetPolicy::parse(&payload.reset_policy).is_none() {
        return Err(AppError::bad_request(
            "reset_policy must be one of never, yearly, monthly",
        ));
    }
    validate_template(&payload.template)?;

    let mut conn = state.db()?;
    let new_template = NewNumberingTemplate {
        category: category.clone(),
        template: payload.template,
        reset_policy: payload.reset_policy,
    };

    match diesel::insert_into(numbering_templates::table)
        .values(&new_template)
        .execute(&mut conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )) => {
            return Err(AppError::bad_request(
                "a template for this category already exists",
            ));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    let tpl: NumberingTemplate = numbering_templates::table.find(&category).first(&mut conn)?;
    Ok((StatusCode::CREATED, Json(tpl.into())))
}

pub async fn update_template(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Json(payload): Json<UpdateTemplateRequest>,
) -> AppResult<Json<TemplateResponse>> {
    let mut conn = state.db()?;
    let existing: NumberingTemplate =
        numbering_templates::table.find(&category).first(&mut conn)?;

    let template_value = match payload.template {
        Some(raw) => {
            validate_template(&raw)?;
            raw
        }
        None => existing.template.clone(),
    };
    let reset_policy = match payload.reset_policy {
        Some(raw) => {
            if ResetPolicy::parse(&raw).is_none() {
                return Err(AppError::bad_request(
                    "reset_policy must be one of never, yearly, monthly",
                ));
            }
            raw
        }
        None => existing.reset_policy.clone(),
    };

    diesel::update(numbering_templates::table.find(&category))
        .set((
            numbering_templates::template.eq(template_value),
            numbering_templates::reset_policy.eq(reset_policy),
            numbering_templates::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut conn)?;

    let updated: NumberingTemplate = numbering_templates::table.find(&category).first(&mut conn)?;
    Ok(Json(updated.into()))
}

pub async fn delete_template(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> AppResult<impl axum::response::IntoResponse> {
    let mut conn = state.db()?;
    let deleted =
        diesel::delete(numbering_templates::table.find(&category)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(AppError::not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}
