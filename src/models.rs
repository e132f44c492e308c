use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = document_requests)]
pub struct DocumentRequest {
    pub id: Uuid,
    pub category: String,
    pub owner_id: Uuid,
    pub org_unit_id: Option<Uuid>,
    pub stage: String,
    pub assigned_to: Option<String>,
    pub forwarded_by: Option<Uuid>,
    pub forwarded_at: Option<NaiveDateTime>,
    pub decided_by: Option<Uuid>,
    pub decided_at: Option<NaiveDateTime>,
    pub decision_notes: Option<String>,
    pub decision_key: Option<String>,
    pub document_number: Option<String>,
    pub artifact_ref: Option<String>,
    pub rendered_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = document_requests)]
pub struct NewDocumentRequest {
    pub id: Uuid,
    pub category: String,
    pub owner_id: Uuid,
    pub org_unit_id: Option<Uuid>,
    pub stage: String,
    pub assigned_to: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = workflow_history)]
#[diesel(belongs_to(DocumentRequest, foreign_key = request_id))]
pub struct WorkflowHistoryEntry {
    pub id: Uuid,
    pub request_id: Uuid,
    pub action: String,
    pub actor_id: Uuid,
    pub actor_role: String,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = workflow_history)]
pub struct NewWorkflowHistoryEntry {
    pub id: Uuid,
    pub request_id: Uuid,
    pub action: String,
    pub actor_id: Uuid,
    pub actor_role: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Queryable)]
#[diesel(table_name = number_counters)]
pub struct NumberCounter {
    pub scope_key: String,
    pub period_key: String,
    pub value: i64,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = number_counters)]
pub struct NewNumberCounter {
    pub scope_key: String,
    pub period_key: String,
    pub value: i64,
}

#[derive(Debug, Clone, Queryable)]
#[diesel(table_name = numbering_templates)]
pub struct NumberingTemplate {
    pub category: String,
    pub template: String,
    pub reset_policy: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = numbering_templates)]
pub struct NewNumberingTemplate {
    pub category: String,
    pub template: String,
    pub reset_policy: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = org_units)]
pub struct OrgUnit {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = org_units)]
pub struct NewOrgUnit {
    pub id: Uuid,
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = jobs)]
pub struct Job {
    pub id: Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts: i32,
    pub run_after: NaiveDateTime,
    pub last_error: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = jobs)]
pub struct NewJob {
    pub id: Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub run_after: NaiveDateTime,
}
