mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, body_to_vec, TestApp};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Deserialize)]
struct TemplateInfo {
    category: String,
    template: String,
    reset_policy: String,
}

#[derive(Deserialize)]
struct OrgUnitInfo {
    id: Uuid,
    code: String,
    name: String,
}

#[tokio::test]
async fn template_administration_flow() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let create = app
        .post_json(
            "/api/templates",
            &json!({
                "category": "SK",
                "template": "{seq}/{category}/{year}",
                "reset_policy": "yearly",
            }),
        )
        .await?;
    assert_eq!(create.status(), StatusCode::CREATED);
    let body = body_to_vec(create.into_body()).await?;
    let created: TemplateInfo = serde_json::from_slice(&body)?;
    assert_eq!(created.category, "SK");
    assert_eq!(created.reset_policy, "yearly");

    // One template per category.
    let duplicate = app
        .post_json(
            "/api/templates",
            &json!({
                "category": "SK",
                "template": "{seq}",
                "reset_policy": "never",
            }),
        )
        .await?;
    assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);

    // Templates that cannot render are rejected at configuration time.
    let broken = app
        .post_json(
            "/api/templates",
            &json!({
                "category": "ND",
                "template": "{seq}/{quarter}",
                "reset_policy": "yearly",
            }),
        )
        .await?;
    assert_eq!(broken.status(), StatusCode::BAD_REQUEST);

    let bad_policy = app
        .post_json(
            "/api/templates",
            &json!({
                "category": "ND",
                "template": "{seq}",
                "reset_policy": "weekly",
            }),
        )
        .await?;
    assert_eq!(bad_policy.status(), StatusCode::BAD_REQUEST);

    let update = app
        .patch_json(
            "/api/templates/SK",
            &json!({ "reset_policy": "monthly" }),
        )
        .await?;
    assert_eq!(update.status(), StatusCode::OK);
    let body = body_to_vec(update.into_body()).await?;
    let updated: TemplateInfo = serde_json::from_slice(&body)?;
    assert_eq!(updated.reset_policy, "monthly");
    assert_eq!(updated.template, "{seq}/{category}/{year}");

    let listed = app.get("/api/templates").await?;
    assert_eq!(listed.status(), StatusCode::OK);
    let body = body_to_vec(listed.into_body()).await?;
    let templates: Vec<TemplateInfo> = serde_json::from_slice(&body)?;
    assert_eq!(templates.len(), 1);

    let delete = app.delete("/api/templates/SK").await?;
    assert_eq!(delete.status(), StatusCode::NO_CONTENT);
    let delete_again = app.delete("/api/templates/SK").await?;
    assert_eq!(delete_again.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn org_unit_administration_flow() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let create = app
        .post_json(
            "/api/org-units",
            &json!({ "code": "fst", "name": "Faculty of Science and Technology" }),
        )
        .await?;
    assert_eq!(create.status(), StatusCode::CREATED);
    let body = body_to_vec(create.into_body()).await?;
    let unit: OrgUnitInfo = serde_json::from_slice(&body)?;
    // Codes are normalized for use inside rendered numbers.
    assert_eq!(unit.code, "FST");

    let duplicate = app
        .post_json(
            "/api/org-units",
            &json!({ "code": "FST", "name": "Duplicate" }),
        )
        .await?;
    assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);

    let bad_code = app
        .post_json(
            "/api/org-units",
            &json!({ "code": "F/ST", "name": "Slashes collide with templates" }),
        )
        .await?;
    assert_eq!(bad_code.status(), StatusCode::BAD_REQUEST);

    let update = app
        .patch_json(
            &format!("/api/org-units/{}", unit.id),
            &json!({ "name": "Faculty of Science" }),
        )
        .await?;
    assert_eq!(update.status(), StatusCode::OK);
    let body = body_to_vec(update.into_body()).await?;
    let updated: OrgUnitInfo = serde_json::from_slice(&body)?;
    assert_eq!(updated.name, "Faculty of Science");
    assert_eq!(updated.code, "FST");

    // A unit referenced by a request cannot be deleted.
    app.insert_template("SK", "{seq}/{unit}", "yearly").await?;
    let submit = app
        .post_json(
            "/api/requests",
            &json!({ "owner_id": Uuid::new_v4(), "category": "SK", "org_unit_id": unit.id }),
        )
        .await?;
    assert_eq!(submit.status(), StatusCode::CREATED);

    let blocked = app.delete(&format!("/api/org-units/{}", unit.id)).await?;
    assert_eq!(blocked.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await?;
    Ok(())
}
