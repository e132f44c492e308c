//! Scoped, period-resetting allocation of official document numbers.
//!
//! Counters are rows in Postgres, not process state: the row lock taken in
//! [`allocate`] is what serializes concurrent issuance across every thread
//! and instance of the service. Counter rows are never deleted; they are the
//! institution's record of how many documents of a kind were ever issued.

use chrono::{Datelike, NaiveDateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{NewNumberCounter, NumberCounter, NumberingTemplate, OrgUnit};
use crate::schema::number_counters;

pub mod calendar;
pub mod template;

pub use template::RenderContext;

pub const RESET_NEVER: &str = "never";
pub const RESET_YEARLY: &str = "yearly";
pub const RESET_MONTHLY: &str = "monthly";

#[derive(Debug, Error)]
pub enum NumberingError {
    #[error("no numbering template configured for category {0}")]
    NotConfigured(String),
    #[error("template {template:?} has invalid placeholder {placeholder:?}")]
    InvalidTemplate {
        template: String,
        placeholder: String,
    },
    #[error("unknown reset policy {0:?}")]
    UnknownResetPolicy(String),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

pub type NumberingResult<T> = Result<T, NumberingError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetPolicy {
    Never,
    Yearly,
    Monthly,
}

impl ResetPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            RESET_NEVER => Some(Self::Never),
            RESET_YEARLY => Some(Self::Yearly),
            RESET_MONTHLY => Some(Self::Monthly),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Never => RESET_NEVER,
            Self::Yearly => RESET_YEARLY,
            Self::Monthly => RESET_MONTHLY,
        }
    }
}

/// Counter partition key for a (category, org unit) pair.
///
/// Hashed rather than concatenated so that category codes and unit ids can
/// never collide into another scope's key regardless of their content.
pub fn scope_key(category: &str, org_unit_id: Option<Uuid>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(category.as_bytes());
    hasher.update([0x1f]);
    match org_unit_id {
        Some(id) => hasher.update(id.as_bytes()),
        None => hasher.update(b"institution"),
    }
    hex::encode(hasher.finalize())[..32].to_string()
}

/// Sub-partition of a scope derived from the reset policy.
pub fn period_key(policy: ResetPolicy, issued_at: NaiveDateTime) -> String {
    let date = issued_at.date();
    match policy {
        ResetPolicy::Never => "all".to_string(),
        ResetPolicy::Yearly => format!("{:04}", date.year()),
        ResetPolicy::Monthly => format!("{:04}-{:02}", date.year(), date.month()),
    }
}

/// Allocate the next number for a scope and render it.
///
/// Must be called on a connection with an open transaction: the `FOR UPDATE`
/// lock on the counter row lives until that transaction commits, and a
/// rollback leaves the increment unobservable. The first allocation in a new
/// period creates a fresh row and yields sequence 1, with no carry-over from
/// the previous period.
pub fn allocate(
    conn: &mut PgConnection,
    tpl: &NumberingTemplate,
    org_unit: Option<&OrgUnit>,
    issued_at: NaiveDateTime,
) -> NumberingResult<String> {
    let policy = ResetPolicy::parse(&tpl.reset_policy)
        .ok_or_else(|| NumberingError::UnknownResetPolicy(tpl.reset_policy.clone()))?;

    let scope = scope_key(&tpl.category, org_unit.map(|unit| unit.id));
    let period = period_key(policy, issued_at);

    // Lazily create the counter row, then lock it. The insert is a no-op
    // when the row exists; the FOR UPDATE select is the serialization point
    // for every concurrent allocation in this scope+period.
    diesel::insert_into(number_counters::table)
        .values(NewNumberCounter {
            scope_key: scope.clone(),
            period_key: period.clone(),
            value: 0,
        })
        .on_conflict((number_counters::scope_key, number_counters::period_key))
        .do_nothing()
        .execute(conn)?;

    let counter: NumberCounter = number_counters::table
        .find((&scope, &period))
        .for_update()
        .first(conn)?;

    let sequence = counter.value + 1;
    diesel::update(number_counters::table.find((&scope, &period)))
        .set((
            number_counters::value.eq(sequence),
            number_counters::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;

    template::render(
        &tpl.template,
        &RenderContext {
            sequence,
            category: &tpl.category,
            org_unit_code: org_unit.map(|unit| unit.code.as_str()).unwrap_or(""),
            issued_on: issued_at.date(),
        },
    )
}
