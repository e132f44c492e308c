use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::Router;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::PgConnection;
use diesel_migrations::MigrationHarness;
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use serde::Serialize;
use sijil::config::AppConfig;
use sijil::db::{self, PgPool, MIGRATIONS};
use sijil::models::{Job, NewNumberingTemplate, NewOrgUnit};
use sijil::rendering::{RenderRequest, RenderingGateway};
use sijil::routes;
use sijil::state::AppState;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Records render calls instead of talking to a rendering service.
#[derive(Default)]
pub struct FakeRenderer {
    calls: Mutex<Vec<RenderRequest>>,
    fail: AtomicBool,
}

#[async_trait]
impl RenderingGateway for FakeRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<String> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("renderer down");
        }
        let mut guard = self.calls.lock().await;
        guard.push(request.clone());
        Ok(format!("fake://letters/{}", request.request_id))
    }
}

impl FakeRenderer {
    #[allow(dead_code)]
    pub async fn calls(&self) -> Vec<RenderRequest> {
        let guard = self.calls.lock().await;
        guard.clone()
    }

    #[allow(dead_code)]
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    renderer: Arc<FakeRenderer>,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let database_url = env::var("TEST_DATABASE_URL")
            .context("TEST_DATABASE_URL must be set for integration tests")?;

        let config = AppConfig {
            database_url: database_url.clone(),
            database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            cors_allowed_origin: None,
            renderer_endpoint: None,
            renderer_timeout_seconds: 5,
            worker_poll_seconds: 1,
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let renderer = Arc::new(FakeRenderer::default());
        let renderer_for_state: Arc<dyn RenderingGateway> = renderer.clone();
        let state = AppState::new(pool.clone(), config, renderer_for_state);
        let router = routes::create_router(state.clone());

        Ok(Self {
            state,
            router,
            renderer,
        })
    }

    pub async fn cleanup(&self) -> Result<()> {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get cleanup connection: {err}"))?;
            truncate_all(&mut conn)?;
            Ok(())
        })
        .await
        .context("cleanup task panicked")?
    }

    #[allow(dead_code)]
    pub fn renderer(&self) -> Arc<FakeRenderer> {
        self.renderer.clone()
    }

    /// Owned router clone for tests that drive requests from spawned tasks.
    #[allow(dead_code)]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub async fn insert_org_unit(&self, code: &str, name: &str) -> Result<Uuid> {
        let code = code.to_string();
        let name = name.to_string();
        self.with_conn(move |conn| {
            let unit = NewOrgUnit {
                id: Uuid::new_v4(),
                code,
                name,
            };
            diesel::insert_into(sijil::schema::org_units::table)
                .values(&unit)
                .execute(conn)
                .context("failed to insert org unit")?;
            Ok(unit.id)
        })
        .await
    }

    pub async fn insert_template(
        &self,
        category: &str,
        template: &str,
        reset_policy: &str,
    ) -> Result<()> {
        let template = NewNumberingTemplate {
            category: category.to_string(),
            template: template.to_string(),
            reset_policy: reset_policy.to_string(),
        };
        self.with_conn(move |conn| {
            diesel::insert_into(sijil::schema::numbering_templates::table)
                .values(&template)
                .execute(conn)
                .context("failed to insert numbering template")?;
            Ok(())
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn jobs_by_type(&self, ty: &str) -> Result<Vec<Job>> {
        let ty = ty.to_string();
        self.with_conn(move |conn| {
            use sijil::schema::jobs::dsl::{job_type as job_type_col, jobs as jobs_table};
            let rows = jobs_table
                .filter(job_type_col.eq(&ty))
                .load::<Job>(conn)
                .context("failed to load jobs")?;
            Ok(rows)
        })
        .await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let request = Request::builder()
            .method(Method::PATCH)
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn get(&self, path: &str) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(Method::DELETE)
            .uri(path)
            .body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|err| anyhow!("failed to run migrations: {err}"))?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(
        "TRUNCATE TABLE workflow_history, document_requests, number_counters, numbering_templates, org_units, jobs RESTART IDENTITY CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}
