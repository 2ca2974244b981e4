//! Drives the admin and API routers over in-memory collaborators.

use architect_admin::{
    admin_routes, common_routes, AdminConfig, AdminEnv, AppState, GrantTable, MemoryRecordStore, MemorySessions,
    MemorySettingsPersistence,
};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    records: Arc<MemoryRecordStore>,
    settings: Arc<MemorySettingsPersistence>,
    _templates: TempDir,
}

fn app() -> TestApp {
    let templates = tempfile::tempdir().unwrap();
    for name in ["search.html", "create.html", "edit.html", "processeditcolumn.html"] {
        std::fs::write(templates.path().join(name), "").unwrap();
    }
    std::fs::create_dir(templates.path().join("widget")).unwrap();
    std::fs::write(templates.path().join("widget").join("view.html"), "").unwrap();

    let config: AdminConfig = serde_json::from_value(json!({
        "modules": [{
            "type": "Widget",
            "columns": [
                { "name": "WidgetID", "type": "int(10) unsigned", "key": "Primary" },
                { "name": "Name", "type": "varchar(255)" },
                { "name": "Active", "type": "tinyint(1)", "default": 1 }
            ],
            "edit_columns": ["Active"],
            "settings_fields": { "PageSize": "Rows per page" }
        }],
        "template_dirs": [templates.path().to_string_lossy()],
        "grants": [
            { "user": "ann", "module": "Widget", "components": ["*"] },
            { "user": "*", "module": "Widget", "components": ["search", "view"] }
        ]
    }))
    .unwrap();

    let records = Arc::new(MemoryRecordStore::new());
    let settings = Arc::new(MemorySettingsPersistence::default());
    let state = AppState {
        env: Arc::new(AdminEnv::from_config(&config).unwrap()),
        records: records.clone(),
        settings: settings.clone(),
        sessions: Arc::new(MemorySessions::new()),
        authorization: Arc::new(GrantTable::from_config(&config.grants)),
    };
    TestApp {
        router: common_routes().merge(admin_routes(state)),
        records,
        settings,
        _templates: templates,
    }
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = router.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, body)
}

fn get(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut b = Request::builder().uri(uri).header("X-Session-ID", "s1");
    if let Some(u) = user {
        b = b.header("X-User-ID", u);
    }
    b.body(Body::empty()).unwrap()
}

fn form(uri: &str, user: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("X-Session-ID", "s1")
        .header("X-User-ID", user)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn json_req(method: &str, uri: &str, user: Option<&str>, body: Value) -> Request<Body> {
    let mut b = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(u) = user {
        b = b.header("X-User-ID", u);
    }
    b.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn health_and_version() {
    let app = app();
    let (status, body) = send(&app.router, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    let (_, body) = send(&app.router, get("/version", None)).await;
    assert_eq!(body["name"], "architect-admin");
}

#[tokio::test]
async fn list_page_resolves_search_template() {
    let app = app();
    let (status, body) = send(&app.router, get("/admin/widget", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["template"], "search.html");
    assert_eq!(body["data"]["action"], "list");
    assert_eq!(body["data"]["values"]["module"]["type"], "Widget");
    assert!(body["data"]["values"]["rows"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn denied_page_is_forbidden() {
    let app = app();
    let (status, body) = send(&app.router, get("/admin/widget/create", None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "permission_denied");

    let (status, body) = send(&app.router, get("/admin/widget/create", Some("ann"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["template"], "create.html");
    assert!(body["data"]["values"]["createForm"].as_str().unwrap().contains("Widget[Name]"));
}

#[tokio::test]
async fn posted_create_then_scoped_view() {
    let app = app();
    let (status, body) = send(&app.router, form("/admin/widget/create", "ann", "Widget%5BName%5D=Cog")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["values"]["success"], "This Widget has been created.");
    assert_eq!(app.records.count("Widget"), 1);

    let (status, body) = send(&app.router, get("/admin/widget/1/view", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["template"], "widget/view.html");
    assert_eq!(body["data"]["values"]["currentItem"]["Name"], "Cog");
}

#[tokio::test]
async fn settings_post_is_checked_before_anything_is_saved() {
    let app = app();
    let (status, body) = send(&app.router, form("/admin/widget/settings", "bob", "Widget%5BPageSize%5D=999")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["message"], "Action (settings) not allowed");
    assert_eq!(app.settings.writes(), 0);

    send(&app.router, form("/admin/widget/settings", "ann", "Widget%5BPageSize%5D=50")).await;
    assert_eq!(app.settings.writes(), 1);
}

#[tokio::test]
async fn missing_template_is_fatal() {
    let app = app();
    let (status, body) = send(&app.router, get("/admin/widget/settings", Some("ann"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "configuration_fatal");
}

#[tokio::test]
async fn unknown_module_is_not_found() {
    let app = app();
    let (status, _) = send(&app.router, get("/admin/gadget", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app.router, get("/api/gadget", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn batch_edit_asks_for_delete_confirmation() {
    let app = app();
    send(&app.router, json_req("POST", "/api/widget", Some("ann"), json!({ "Name": "Cog" }))).await;
    let (status, body) = send(
        &app.router,
        form("/admin/widget/editcolumn", "ann", "WidgetID%5B1%5D=1&Delete=1"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["template"], "processeditcolumn.html");
    let markup = body["data"]["values"]["editColumn"].as_str().unwrap();
    assert!(markup.contains("can <b>not</b> be restored"));
    assert_eq!(app.records.count("Widget"), 1);

    let (_, body) = send(
        &app.router,
        form("/admin/widget/editcolumn", "ann", "Check=Yes"),
    )
    .await;
    assert!(body["data"]["values"]["editColumn"].as_str().unwrap().contains("Deletion complete!"));
    assert_eq!(app.records.count("Widget"), 0);
}

#[tokio::test]
async fn api_create_list_update() {
    let app = app();
    let (status, body) = send(&app.router, json_req("POST", "/api/widget", Some("ann"), json!({ "Name": "Bolt" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["Name"], "Bolt");

    let (status, body) = send(&app.router, get("/api/widget", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["count"], 1);

    let (status, body) = send(&app.router, json_req("PUT", "/api/widget/1", Some("ann"), json!({ "Name": "Nut" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["next"], "view");

    let (_, body) = send(&app.router, get("/api/widget/1", None)).await;
    assert_eq!(body["data"]["Name"], "Nut");
}

#[tokio::test]
async fn api_delete_rules() {
    let app = app();
    send(&app.router, json_req("POST", "/api/widget", Some("ann"), json!({ "Name": "Bolt" }))).await;

    let (status, body) = send(&app.router, json_req("DELETE", "/api/widget", Some("ann"), Value::Null)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["message"], "Deleting multiple items is forbidden");

    let (status, _) = send(&app.router, json_req("DELETE", "/api/widget/1", None, Value::Null)).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, body) = send(&app.router, json_req("DELETE", "/api/widget/1", Some("ann"), Value::Null)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["next"], "list");
    assert_eq!(app.records.count("Widget"), 0);
}
