use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;

/// Field set handed to the rendering service once a request is completed
/// and numbered. The gateway returns an opaque artifact reference; what the
/// artifact is (PDF, print queue entry) is the renderer's business.
#[derive(Debug, Clone, Serialize)]
pub struct RenderRequest {
    pub request_id: Uuid,
    pub document_number: String,
    pub category: String,
    pub org_unit_code: Option<String>,
    pub owner_id: Uuid,
    pub decided_at: NaiveDateTime,
    pub decision_notes: Option<String>,
}

#[async_trait]
pub trait RenderingGateway: Send + Sync + 'static {
    async fn render(&self, request: &RenderRequest) -> Result<String>;
}

pub struct HttpRenderingGateway {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRenderingGateway {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build rendering HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[derive(Deserialize)]
struct RenderResponse {
    artifact_ref: String,
}

#[async_trait]
impl RenderingGateway for HttpRenderingGateway {
    async fn render(&self, request: &RenderRequest) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .context("rendering service unreachable")?;

        let status = response.status();
        if !status.is_success() {
            bail!("rendering service returned {status}");
        }

        let parsed: RenderResponse = response
            .json()
            .await
            .context("rendering service returned malformed response")?;
        Ok(parsed.artifact_ref)
    }
}

/// Gateway selected by configuration: HTTP when an endpoint is set,
/// otherwise disabled.
pub fn from_config(config: &AppConfig) -> Result<Arc<dyn RenderingGateway>> {
    match config.renderer_endpoint.as_deref() {
        Some(endpoint) => {
            let gateway = HttpRenderingGateway::new(
                endpoint,
                Duration::from_secs(config.renderer_timeout_seconds),
            )?;
            Ok(Arc::new(gateway))
        }
        None => Ok(Arc::new(DisabledRendering)),
    }
}

/// Stand-in used when no rendering endpoint is configured. Render jobs
/// retry and eventually fail; approvals are unaffected.
pub struct DisabledRendering;

#[async_trait]
impl RenderingGateway for DisabledRendering {
    async fn render(&self, _request: &RenderRequest) -> Result<String> {
        bail!("no rendering endpoint configured")
    }
}
