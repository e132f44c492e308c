//! Approval pipeline for official-document requests.
//!
//! The request row is a materialized projection; the append-only
//! `workflow_history` log is the audit of record, and [`replay`] rebuilds
//! the projection from it. Every mutation is one transaction that updates
//! the row and appends exactly one history entry. Approval additionally
//! allocates the document number in that same transaction, so a completed
//! request without a number (or a consumed counter without a completed
//! request) can never be observed.

use std::fmt;

use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::jobs::{enqueue_job, JobQueueError, JOB_RENDER_DOCUMENT};
use crate::models::{
    DocumentRequest, NewDocumentRequest, NewWorkflowHistoryEntry, NumberingTemplate, OrgUnit,
    WorkflowHistoryEntry,
};
use crate::numbering::{self, NumberingError};
use crate::schema::{document_requests, numbering_templates, org_units, workflow_history};

pub const ACTION_SUBMITTED: &str = "submitted";
pub const ACTION_FORWARDED: &str = "forwarded";
pub const ACTION_APPROVED: &str = "approved";
pub const ACTION_REJECTED: &str = "rejected";

/// Static stage-ownership table. Actor directories live outside this
/// service; what the workflow tracks is which role must act next.
pub const ROLE_REQUESTER: &str = "requester";
pub const ROLE_INITIAL_REVIEW: &str = "registrar";
pub const ROLE_UNIT_APPROVAL: &str = "unit_head";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    InitialReview,
    UnitApproval,
    Completed,
    Rejected,
}

impl Stage {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "initial_review" => Some(Self::InitialReview),
            "unit_approval" => Some(Self::UnitApproval),
            "completed" => Some(Self::Completed),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InitialReview => "initial_review",
            Self::UnitApproval => "unit_approval",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }

    /// Role responsible for acting while a request sits in this stage.
    pub fn owning_role(&self) -> Option<&'static str> {
        match self {
            Self::InitialReview => Some(ROLE_INITIAL_REVIEW),
            Self::UnitApproval => Some(ROLE_UNIT_APPROVAL),
            Self::Completed | Self::Rejected => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Approve,
    Reject,
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("request not found")]
    NotFound,
    #[error("request is at stage {actual}, caller expected {expected}")]
    Conflict { expected: Stage, actual: Stage },
    #[error("{action} is not legal from stage {stage}")]
    InvalidTransition { stage: Stage, action: &'static str },
    #[error("stored request has unknown stage {stage:?}")]
    CorruptStage { stage: String },
    #[error(transparent)]
    Numbering(#[from] NumberingError),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error(transparent)]
    JobQueue(#[from] JobQueueError),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Target stage of a forward action, if one exists.
fn forward_target(stage: Stage) -> Option<Stage> {
    match stage {
        Stage::InitialReview => Some(Stage::UnitApproval),
        _ => None,
    }
}

/// Target stage of a decision, if one is legal from `stage`.
///
/// Rejection is allowed from both review stages; approval only from the
/// unit-approval stage, because that transition mints the number.
fn decide_target(stage: Stage, outcome: Outcome) -> Option<Stage> {
    match (stage, outcome) {
        (Stage::UnitApproval, Outcome::Approve) => Some(Stage::Completed),
        (Stage::InitialReview | Stage::UnitApproval, Outcome::Reject) => Some(Stage::Rejected),
        _ => None,
    }
}

/// Create a request at the initial review stage and record its submission.
pub fn submit(
    conn: &mut PgConnection,
    owner_id: Uuid,
    category: &str,
    org_unit_id: Option<Uuid>,
) -> WorkflowResult<DocumentRequest> {
    conn.transaction::<DocumentRequest, WorkflowError, _>(|conn| {
        let new_request = NewDocumentRequest {
            id: Uuid::new_v4(),
            category: category.to_string(),
            owner_id,
            org_unit_id,
            stage: Stage::InitialReview.as_str().to_string(),
            assigned_to: Some(ROLE_INITIAL_REVIEW.to_string()),
        };

        diesel::insert_into(document_requests::table)
            .values(&new_request)
            .execute(conn)?;

        append_history(
            conn,
            new_request.id,
            ACTION_SUBMITTED,
            owner_id,
            ROLE_REQUESTER,
            None,
        )?;

        let request: DocumentRequest = document_requests::table.find(new_request.id).first(conn)?;
        info!(request_id = %request.id, category = %request.category, "request submitted");
        Ok(request)
    })
}

/// Move a request from initial review to unit approval.
pub fn forward(
    conn: &mut PgConnection,
    request_id: Uuid,
    actor_id: Uuid,
    expected_stage: Stage,
    notes: Option<String>,
) -> WorkflowResult<DocumentRequest> {
    conn.transaction::<DocumentRequest, WorkflowError, _>(|conn| {
        let (request, actual) = lock_request(conn, request_id)?;
        check_expected(actual, expected_stage)?;

        let target = forward_target(actual).ok_or(WorkflowError::InvalidTransition {
            stage: actual,
            action: "forward",
        })?;

        let now = Utc::now().naive_utc();
        diesel::update(document_requests::table.find(request.id))
            .set((
                document_requests::stage.eq(target.as_str()),
                document_requests::assigned_to.eq(target.owning_role()),
                document_requests::forwarded_by.eq(Some(actor_id)),
                document_requests::forwarded_at.eq(Some(now)),
                document_requests::updated_at.eq(now),
            ))
            .execute(conn)?;

        append_history(
            conn,
            request.id,
            ACTION_FORWARDED,
            actor_id,
            ROLE_INITIAL_REVIEW,
            notes,
        )?;

        let updated: DocumentRequest = document_requests::table.find(request.id).first(conn)?;
        info!(request_id = %updated.id, stage = %target, "request forwarded");
        Ok(updated)
    })
}

/// Decide a request: approve into `completed` (allocating its number in
/// the same transaction) or reject into `rejected` (never allocating).
///
/// `idempotency_key` makes a timed-out decide safe to retry: a retry that
/// finds the request already terminal with the same stored key returns the
/// committed outcome instead of `Conflict`.
#[allow(clippy::too_many_arguments)]
pub fn decide(
    conn: &mut PgConnection,
    request_id: Uuid,
    actor_id: Uuid,
    expected_stage: Stage,
    outcome: Outcome,
    notes: Option<String>,
    idempotency_key: Option<String>,
) -> WorkflowResult<DocumentRequest> {
    conn.transaction::<DocumentRequest, WorkflowError, _>(|conn| {
        let (request, actual) = lock_request(conn, request_id)?;

        if actual != expected_stage {
            if actual.is_terminal() {
                if let (Some(key), Some(stored)) = (&idempotency_key, &request.decision_key) {
                    if key == stored {
                        return Ok(request);
                    }
                }
            }
            return Err(WorkflowError::Conflict {
                expected: expected_stage,
                actual,
            });
        }

        let target = decide_target(actual, outcome).ok_or(WorkflowError::InvalidTransition {
            stage: actual,
            action: match outcome {
                Outcome::Approve => "approve",
                Outcome::Reject => "reject",
            },
        })?;

        let actor_role = actual.owning_role().unwrap_or(ROLE_INITIAL_REVIEW);
        let now = Utc::now().naive_utc();

        let document_number = if target == Stage::Completed {
            let tpl: Option<NumberingTemplate> = numbering_templates::table
                .find(&request.category)
                .first(conn)
                .optional()?;
            let tpl = tpl.ok_or_else(|| NumberingError::NotConfigured(request.category.clone()))?;

            let org_unit: Option<OrgUnit> = match request.org_unit_id {
                Some(unit_id) => Some(org_units::table.find(unit_id).first(conn)?),
                None => None,
            };

            Some(numbering::allocate(conn, &tpl, org_unit.as_ref(), now)?)
        } else {
            None
        };

        diesel::update(document_requests::table.find(request.id))
            .set((
                document_requests::stage.eq(target.as_str()),
                document_requests::assigned_to.eq(None::<String>),
                document_requests::decided_by.eq(Some(actor_id)),
                document_requests::decided_at.eq(Some(now)),
                document_requests::decision_notes.eq(notes.clone()),
                document_requests::decision_key.eq(idempotency_key),
                document_requests::document_number.eq(document_number.clone()),
                document_requests::updated_at.eq(now),
            ))
            .execute(conn)?;

        let action = match target {
            Stage::Completed => ACTION_APPROVED,
            _ => ACTION_REJECTED,
        };
        append_history(conn, request.id, action, actor_id, actor_role, notes)?;

        // The render dispatch rides the same transaction: the job becomes
        // visible exactly when the approval does.
        if target == Stage::Completed {
            enqueue_job(
                conn,
                JOB_RENDER_DOCUMENT,
                json!({ "request_id": request.id }),
                None,
            )?;
        }

        let updated: DocumentRequest = document_requests::table.find(request.id).first(conn)?;
        info!(
            request_id = %updated.id,
            stage = %target,
            document_number = updated.document_number.as_deref().unwrap_or("-"),
            "request decided"
        );
        Ok(updated)
    })
}

/// Load a request's history, oldest first.
pub fn history(
    conn: &mut PgConnection,
    request_id: Uuid,
) -> WorkflowResult<Vec<WorkflowHistoryEntry>> {
    let exists: Option<Uuid> = document_requests::table
        .find(request_id)
        .select(document_requests::id)
        .first(conn)
        .optional()?;
    if exists.is_none() {
        return Err(WorkflowError::NotFound);
    }

    let entries = workflow_history::table
        .filter(workflow_history::request_id.eq(request_id))
        .order(workflow_history::created_at.asc())
        .load(conn)?;
    Ok(entries)
}

/// Projection of a request's mutable workflow fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projection {
    pub stage: Stage,
    pub assigned_to: Option<&'static str>,
}

/// Rebuild the current projection from an ordered history sequence.
///
/// Returns `None` for an empty or malformed sequence. The row in
/// `document_requests` must always equal the replay of its log.
pub fn replay(entries: &[WorkflowHistoryEntry]) -> Option<Projection> {
    let mut projection: Option<Projection> = None;
    for entry in entries {
        let stage = match entry.action.as_str() {
            ACTION_SUBMITTED => Stage::InitialReview,
            ACTION_FORWARDED => Stage::UnitApproval,
            ACTION_APPROVED => Stage::Completed,
            ACTION_REJECTED => Stage::Rejected,
            _ => return None,
        };
        projection = Some(Projection {
            stage,
            assigned_to: stage.owning_role(),
        });
    }
    projection
}

fn lock_request(
    conn: &mut PgConnection,
    request_id: Uuid,
) -> WorkflowResult<(DocumentRequest, Stage)> {
    let request: Option<DocumentRequest> = document_requests::table
        .find(request_id)
        .for_update()
        .first(conn)
        .optional()?;
    let request = request.ok_or(WorkflowError::NotFound)?;
    let stage = Stage::parse(&request.stage).ok_or_else(|| WorkflowError::CorruptStage {
        stage: request.stage.clone(),
    })?;
    Ok((request, stage))
}

fn check_expected(actual: Stage, expected: Stage) -> WorkflowResult<()> {
    if actual != expected {
        return Err(WorkflowError::Conflict { expected, actual });
    }
    Ok(())
}

fn append_history(
    conn: &mut PgConnection,
    request_id: Uuid,
    action: &str,
    actor_id: Uuid,
    actor_role: &str,
    notes: Option<String>,
) -> WorkflowResult<()> {
    let entry = NewWorkflowHistoryEntry {
        id: Uuid::new_v4(),
        request_id,
        action: action.to_string(),
        actor_id,
        actor_role: actor_role.to_string(),
        notes,
    };
    diesel::insert_into(workflow_history::table)
        .values(&entry)
        .execute(conn)?;
    Ok(())
}
