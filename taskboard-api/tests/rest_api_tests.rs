//! REST endpoints driven through the full router.

mod support;

use axum::http::StatusCode;
use serde_json::json;
use taskboard_core::{EntityIdType, ProjectId, Role, TaskFilter, UserId};
use taskboard_storage::{MemoryStore, Store};
use taskboard_test_utils::fixtures::{admin, project, seeded_store, task, user};

use support::{multipart_request, test_app};

// ============================================================================
// USERS
// ============================================================================

async fn register(app: &support::TestApp, username: &str, password: &str) -> (StatusCode, serde_json::Value) {
    app.post(
        "/users/register",
        json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": password,
        }),
        None,
    )
    .await
}

#[tokio::test]
async fn register_login_and_profile() -> Result<(), String> {
    let app = test_app(MemoryStore::new());

    let (status, body) = register(&app, "alice", "correct horse").await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["username"], "alice");
    assert_eq!(body["role"], "user");
    assert!(body.get("password_hash").is_none());
    assert!(body.get("password").is_none());

    let (status, tokens) = app
        .post(
            "/users/login",
            json!({ "email": "alice@example.com", "password": "correct horse" }),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", tokens);
    assert_eq!(tokens["token_type"], "Bearer");
    let access = tokens["access_token"]
        .as_str()
        .ok_or("missing access token")?
        .to_string();

    let (status, profile) = app.get("/users/profile", Some(&access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["username"], "alice");
    assert_eq!(profile["id"], body["id"]);

    Ok(())
}

#[tokio::test]
async fn register_rejects_duplicates_and_bad_input() {
    let app = test_app(MemoryStore::new());

    let (status, _) = register(&app, "alice", "correct horse").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = register(&app, "alice", "another password").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ENTITY_ALREADY_EXISTS");

    let (status, body) = app
        .post(
            "/users/register",
            json!({ "username": "bob", "email": "not-an-email", "password": "long enough" }),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["field"], "email");

    let (status, _) = register(&app, "carol", "short").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = test_app(MemoryStore::new());
    register(&app, "alice", "correct horse").await;

    let (wrong_status, wrong_body) = app
        .post(
            "/users/login",
            json!({ "email": "alice@example.com", "password": "wrong password" }),
            None,
        )
        .await;
    let (unknown_status, unknown_body) = app
        .post(
            "/users/login",
            json!({ "email": "nobody@example.com", "password": "wrong password" }),
            None,
        )
        .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body["message"], unknown_body["message"]);
}

#[tokio::test]
async fn refresh_token_issues_new_pair_but_access_token_does_not() -> Result<(), String> {
    let app = test_app(MemoryStore::new());
    register(&app, "alice", "correct horse").await;
    let (_, tokens) = app
        .post(
            "/users/login",
            json!({ "email": "alice@example.com", "password": "correct horse" }),
            None,
        )
        .await;

    let (status, refreshed) = app
        .post(
            "/users/refresh",
            json!({ "refresh_token": tokens["refresh_token"] }),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", refreshed);
    assert!(refreshed["access_token"].is_string());

    let (status, _) = app
        .post(
            "/users/refresh",
            json!({ "refresh_token": tokens["access_token"] }),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn profile_requires_token() {
    let app = test_app(MemoryStore::new());

    let (status, body) = app.get("/users/profile", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = app.get("/users/profile", Some("garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_of_deleted_account_is_not_found() {
    let app = test_app(MemoryStore::new());
    // Never inserted into the store.
    let ghost = user("ghost");
    let token = app.token_for(&ghost);

    let (status, _) = app.get("/users/profile", Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// PROJECTS
// ============================================================================

#[tokio::test]
async fn project_crud_by_owner() -> Result<(), String> {
    let store = MemoryStore::new();
    let owner = user("owner");
    store.user_insert(&owner).await.map_err(|e| e.to_string())?;
    let app = test_app(store);
    let token = app.token_for(&owner);

    let (status, created) = app
        .post("/projects", json!({ "name": "  Roadmap  ", "description": "Q3" }), Some(&token))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    assert_eq!(created["name"], "Roadmap");
    assert_eq!(created["owner_id"], owner.id.to_string());
    let id = created["id"].as_str().ok_or("missing id")?.to_string();

    let (status, list) = app.get("/projects", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().map(Vec::len), Some(1));

    let (status, updated) = app
        .put(&format!("/projects/{}", id), json!({ "name": "Roadmap v2" }), Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Roadmap v2");
    assert_eq!(updated["description"], "Q3");

    let (status, _) = app.delete(&format!("/projects/{}", id), Some(&token)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.get(&format!("/projects/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "ENTITY_NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn project_detail_includes_owner_and_tasks() {
    let seeded = seeded_store(1, 3).await.unwrap();
    let app = test_app(seeded.store.clone());
    let project = &seeded.projects[0];

    let (status, body) = app.get(&format!("/projects/{}", project.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], project.id.to_string());
    assert_eq!(body["owner"]["username"], "owner0");
    assert_eq!(body["tasks"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn project_writes_need_token_and_ownership() {
    let store = MemoryStore::new();
    let owner = user("owner");
    let stranger = user("stranger");
    let boss = admin("boss");
    for u in [&owner, &stranger, &boss] {
        store.user_insert(u).await.unwrap();
    }
    let roadmap = project("Roadmap", &owner);
    store.project_insert(&roadmap).await.unwrap();
    let app = test_app(store);
    let uri = format!("/projects/{}", roadmap.id);

    let (status, _) = app.post("/projects", json!({ "name": "X" }), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let stranger_token = app.token_for(&stranger);
    let (status, body) = app
        .put(&uri, json!({ "name": "Mine now" }), Some(&stranger_token))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, _) = app.delete(&uri, Some(&stranger_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Owners cannot give the project away; admins can.
    let owner_token = app.token_for(&owner);
    let (status, _) = app
        .put(&uri, json!({ "owner_id": stranger.id }), Some(&owner_token))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin_token = app.token_for(&boss);
    let (status, body) = app
        .put(&uri, json!({ "owner_id": stranger.id }), Some(&admin_token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["owner_id"], stranger.id.to_string());

    let (status, _) = app.delete(&uri, Some(&admin_token)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn project_path_and_body_validation() {
    let store = MemoryStore::new();
    let owner = user("owner");
    store.user_insert(&owner).await.unwrap();
    let app = test_app(store);
    let token = app.token_for(&owner);

    let (status, body) = app.get("/projects/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_FORMAT");

    let (status, _) = app.post("/projects", json!({ "name": "   " }), Some(&token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .get(&format!("/projects/{}", ProjectId::now_v7()), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_project_removes_its_tasks() {
    let seeded = seeded_store(2, 2).await.unwrap();
    let app = test_app(seeded.store.clone());
    let token = app.token_for(&seeded.owners[0]);

    let (status, _) = app
        .delete(&format!("/projects/{}", seeded.projects[0].id), Some(&token))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let remaining = seeded.store.task_list(TaskFilter::default()).await.unwrap();
    assert_eq!(remaining.len(), 2);
    assert!(remaining.iter().all(|t| t.project_id == seeded.projects[1].id));
}

// ============================================================================
// TASKS
// ============================================================================

#[tokio::test]
async fn task_create_rejects_unknown_project_or_assignee() {
    let seeded = seeded_store(1, 1).await.unwrap();
    let app = test_app(seeded.store.clone());
    let token = app.token_for(&seeded.owners[0]);

    let (status, body) = app
        .post(
            "/tasks",
            json!({
                "title": "Orphan",
                "project_id": ProjectId::now_v7(),
                "assignee_id": seeded.assignees[0].id,
            }),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);

    let (status, _) = app
        .post(
            "/tasks",
            json!({
                "title": "Nobody's",
                "project_id": seeded.projects[0].id,
                "assignee_id": UserId::now_v7(),
            }),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, created) = app
        .post(
            "/tasks",
            json!({
                "title": "Write docs",
                "project_id": seeded.projects[0].id,
                "assignee_id": seeded.assignees[0].id,
            }),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["completed"], false);
}

#[tokio::test]
async fn task_listing_filters() {
    let seeded = seeded_store(2, 3).await.unwrap();
    let app = test_app(seeded.store.clone());

    let (status, all) = app.get("/tasks", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().map(Vec::len), Some(6));

    let (_, by_project) = app
        .get(&format!("/tasks?project_id={}", seeded.projects[1].id), None)
        .await;
    assert_eq!(by_project.as_array().map(Vec::len), Some(3));

    let (_, by_both) = app
        .get(
            &format!(
                "/tasks?project_id={}&assignee_id={}",
                seeded.projects[1].id, seeded.assignees[2].id
            ),
            None,
        )
        .await;
    let by_both = by_both.as_array().cloned().unwrap_or_default();
    assert_eq!(by_both.len(), 1);
    assert_eq!(by_both[0]["title"], "Task 1.2");
}

#[tokio::test]
async fn task_update_and_delete_permissions() {
    let store = MemoryStore::new();
    let owner = user("owner");
    let assignee = user("assignee");
    let stranger = user("stranger");
    for u in [&owner, &assignee, &stranger] {
        store.user_insert(u).await.unwrap();
    }
    let roadmap = project("Roadmap", &owner);
    store.project_insert(&roadmap).await.unwrap();
    let docs = task("Write docs", &roadmap, &assignee);
    store.task_insert(&docs).await.unwrap();
    let app = test_app(store);
    let uri = format!("/tasks/{}", docs.id);

    let (status, _) = app
        .put(&uri, json!({ "completed": true }), Some(&app.token_for(&stranger)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .put(&uri, json!({ "completed": true }), Some(&app.token_for(&assignee)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["completed"], true);
    assert_eq!(body["title"], "Write docs");

    let (status, _) = app.delete(&uri, Some(&app.token_for(&stranger))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.delete(&uri, Some(&app.token_for(&owner))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(&uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_role_in_token_grants_task_management() {
    let seeded = seeded_store(1, 1).await.unwrap();
    let app = test_app(seeded.store.clone());
    let mut outsider = user("outsider");
    outsider.role = Role::Admin;

    let (status, _) = app
        .delete(&format!("/tasks/{}", seeded.tasks[0].id), Some(&app.token_for(&outsider)))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

// ============================================================================
// UPLOADS
// ============================================================================

#[tokio::test]
async fn upload_stores_image_and_serves_it() -> Result<(), String> {
    let app = test_app(MemoryStore::new());
    let png = b"\x89PNG\r\n\x1a\nfake image bytes";

    let (status, body) = app
        .send(multipart_request("/upload", "file", "../cat photo.png", "image/png", png))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let filename = body["filename"].as_str().ok_or("missing filename")?;
    assert!(filename.ends_with("-cat_photo.png"), "{}", filename);
    assert_eq!(body["path"], format!("/uploads/{}", filename));

    let stored = app.state.config.upload_dir.join(filename);
    let on_disk = std::fs::read(&stored).map_err(|e| e.to_string())?;
    assert_eq!(on_disk, png);

    let (status, _) = app.get(&format!("/uploads/{}", filename), None).await;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn upload_rejects_non_images_and_missing_file() {
    let app = test_app(MemoryStore::new());

    let (status, body) = app
        .send(multipart_request("/upload", "file", "notes.txt", "text/plain", b"hello"))
        .await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["code"], "UNSUPPORTED_MEDIA_TYPE");

    let (status, body) = app
        .send(multipart_request("/upload", "avatar", "cat.png", "image/png", b"png"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_FIELD");
}

#[tokio::test]
async fn upload_enforces_size_limit() {
    let uploads = tempfile::TempDir::new().unwrap();
    let config = taskboard_api::ApiConfig {
        upload_max_bytes: 16,
        ..support::test_config(&uploads)
    };
    let app = support::test_app_with_config(MemoryStore::new(), config, uploads);

    let (status, _) = app
        .send(multipart_request("/upload", "file", "big.png", "image/png", &[0u8; 64]))
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

// ============================================================================
// HEALTH & DOCS
// ============================================================================

#[tokio::test]
async fn health_and_openapi_are_public() {
    let app = test_app(MemoryStore::new());

    let (status, body) = app.get("/health/ping", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "pong");

    let (status, body) = app.get("/health/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.get("/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/projects/{id}"].is_object());
}
