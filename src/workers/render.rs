use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    jobs::JOB_RENDER_DOCUMENT,
    models::{DocumentRequest, Job, OrgUnit},
    rendering::RenderRequest,
    schema::{document_requests, org_units},
    state::AppState,
    workflow::Stage,
};

use super::{JobExecution, JobHandler};

const RETRY_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct RenderPayload {
    request_id: Uuid,
}

pub struct RenderDocumentJob;

impl RenderDocumentJob {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RenderDocumentJob {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobHandler for RenderDocumentJob {
    fn job_type(&self) -> &'static str {
        JOB_RENDER_DOCUMENT
    }

    async fn handle(&self, state: Arc<AppState>, job: Job) -> JobExecution {
        let payload: RenderPayload = match serde_json::from_value(job.payload.clone()) {
            Ok(payload) => payload,
            Err(err) => {
                return JobExecution::Failed {
                    error: format!("invalid render payload: {err}"),
                }
            }
        };

        let mut conn = match state.db() {
            Ok(conn) => conn,
            Err(err) => {
                return JobExecution::Retry {
                    delay: RETRY_DELAY,
                    error: format!("database unavailable: {err:?}"),
                }
            }
        };

        let request: DocumentRequest = match document_requests::table
            .find(payload.request_id)
            .first(&mut conn)
            .optional()
        {
            Ok(Some(request)) => request,
            Ok(None) => {
                return JobExecution::Failed {
                    error: format!("request {} no longer exists", payload.request_id),
                }
            }
            Err(err) => {
                return JobExecution::Retry {
                    delay: RETRY_DELAY,
                    error: format!("failed to load request: {err}"),
                }
            }
        };

        // Only completed, numbered requests are renderable; anything else
        // reaching this queue is a bug upstream, not a transient fault.
        if Stage::parse(&request.stage) != Some(Stage::Completed) {
            return JobExecution::Failed {
                error: format!("request {} is not completed", request.id),
            };
        }
        let (Some(number), Some(decided_at)) =
            (request.document_number.clone(), request.decided_at)
        else {
            return JobExecution::Failed {
                error: format!("request {} is completed but has no number", request.id),
            };
        };

        if request.artifact_ref.is_some() {
            // A previous attempt already rendered this request.
            return JobExecution::Success;
        }

        let org_unit_code = match request.org_unit_id {
            Some(unit_id) => match org_units::table.find(unit_id).first::<OrgUnit>(&mut conn) {
                Ok(unit) => Some(unit.code),
                Err(err) => {
                    return JobExecution::Retry {
                        delay: RETRY_DELAY,
                        error: format!("failed to load org unit: {err}"),
                    }
                }
            },
            None => None,
        };
        drop(conn);

        let render_request = RenderRequest {
            request_id: request.id,
            document_number: number,
            category: request.category.clone(),
            org_unit_code,
            owner_id: request.owner_id,
            decided_at,
            decision_notes: request.decision_notes.clone(),
        };

        let artifact_ref = match state.renderer.render(&render_request).await {
            Ok(artifact_ref) => artifact_ref,
            Err(err) => {
                return JobExecution::Retry {
                    delay: RETRY_DELAY,
                    error: format!("rendering failed: {err:#}"),
                }
            }
        };

        let mut conn = match state.db() {
            Ok(conn) => conn,
            Err(err) => {
                return JobExecution::Retry {
                    delay: RETRY_DELAY,
                    error: format!("database unavailable: {err:?}"),
                }
            }
        };

        let updated = diesel::update(document_requests::table.find(request.id))
            .set((
                document_requests::artifact_ref.eq(Some(artifact_ref.clone())),
                document_requests::rendered_at.eq(Some(Utc::now().naive_utc())),
                document_requests::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(&mut conn);

        match updated {
            Ok(_) => {
                info!(request_id = %request.id, artifact_ref = %artifact_ref, "request rendered");
                JobExecution::Success
            }
            Err(err) => JobExecution::Retry {
                delay: RETRY_DELAY,
                error: format!("failed to store artifact reference: {err}"),
            },
        }
    }
}
