use axum::extract::{Json, State};
use diesel::prelude::*;
use serde::Serialize;

use crate::error::AppResult;
use crate::models::NumberCounter;
use crate::routes::requests::to_iso;
use crate::schema::number_counters;
use crate::state::AppState;

/// Counter rows are the institution's issuance record; this read-only view
/// exists for audits and is the only way the rows leave the store.
#[derive(Serialize)]
pub struct CounterResponse {
    pub scope_key: String,
    pub period_key: String,
    pub value: i64,
    pub updated_at: String,
}

pub async fn list_counters(State(state): State<AppState>) -> AppResult<Json<Vec<CounterResponse>>> {
    let mut conn = state.db()?;
    let rows: Vec<NumberCounter> = number_counters::table
        .order((
            number_counters::scope_key.asc(),
            number_counters::period_key.asc(),
        ))
        .load(&mut conn)?;

    Ok(Json(
        rows.into_iter()
            .map(|counter| CounterResponse {
                scope_key: counter.scope_key,
                period_key: counter.period_key,
                value: counter.value,
                updated_at: to_iso(counter.updated_at),
            })
            .collect(),
    ))
}
