//! HTTP API integration tests: sign-in, role guard, CSRF gate and the main
//! admin/student flows, driven through the router with `oneshot`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use argon2::Params;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::{json, Value as JsonValue};
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

use xceliq::data::users;
use xceliq::identity::{IdentityProvider, LocalIdentityProvider, RouteGuard, SessionManager};
use xceliq::server::{router, AppState};
use xceliq::store::SharedStore;

struct TestApp {
    app: Router,
    store: SharedStore,
    idp: Arc<LocalIdentityProvider>,
    _tmp: TempDir,
}

fn cheap_idp(store: &SharedStore) -> LocalIdentityProvider {
    LocalIdentityProvider::with_params(store.clone(), Params::new(8, 1, 1, None).expect("argon2 params"))
}

fn setup() -> Result<TestApp> {
    let tmp = tempdir()?;
    let store = SharedStore::open(tmp.path(), "xceliq-test")?;
    let idp = Arc::new(cheap_idp(&store));
    let dyn_idp: Arc<dyn IdentityProvider> = idp.clone();
    let state = AppState::new(store.clone(), dyn_idp, SessionManager::default(), RouteGuard::new(Duration::from_millis(10)));
    Ok(TestApp { app: router(state), store, idp, _tmp: tmp })
}

/// Signed-in client: session cookie plus CSRF token.
struct Client {
    cookie: String,
    csrf: String,
}

async fn call(app: &Router, method: Method, uri: &str, client: Option<&Client>, body: Option<JsonValue>) -> (StatusCode, Option<String>, JsonValue) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(c) = client {
        req = req.header(header::COOKIE, &c.cookie).header("x-csrf-token", &c.csrf);
    }
    let req = match body {
        Some(b) => req.header(header::CONTENT_TYPE, "application/json").body(Body::from(b.to_string())),
        None => req.body(Body::empty()),
    }
    .expect("request");
    let resp = app.clone().oneshot(req).await.expect("response");
    let status = resp.status();
    let set_cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.expect("body");
    let json = serde_json::from_slice(&bytes).unwrap_or_else(|_| JsonValue::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, set_cookie, json)
}

async fn login(app: &Router, email: &str, password: &str) -> Client {
    let (status, set_cookie, body) = call(app, Method::POST, "/api/auth/login", None, Some(json!({"email": email, "password": password}))).await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    let cookie = set_cookie.expect("session cookie").split(';').next().unwrap_or_default().to_string();
    let csrf = body["csrfToken"].as_str().expect("csrf token").to_string();
    Client { cookie, csrf }
}

async fn admin_client(t: &TestApp) -> Client {
    users::bootstrap_admin(&t.store, t.idp.as_ref(), "root@xceliq.io", "secret1", "Root").expect("bootstrap");
    login(&t.app, "root@xceliq.io", "secret1").await
}

async fn create_college(app: &Router, admin: &Client, name: &str, email: &str) -> String {
    let (status, _, body) = call(
        app,
        Method::POST,
        "/api/colleges",
        Some(admin),
        Some(json!({"name": name, "adminEmail": email, "branches": ["CSE", "ECE"], "years": ["1", "2"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "create college failed: {}", body);
    body["college"]["id"].as_str().expect("college id").to_string()
}

async fn register_student(app: &Router, email: &str, college_id: &str) {
    let (status, _, body) = call(
        app,
        Method::POST,
        "/api/register",
        None,
        Some(json!({"email": email, "password": "secret1", "name": "Stu Dent", "collegeId": college_id, "branch": "CSE", "year": "2"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "registration failed: {}", body);
}

#[tokio::test]
async fn health_and_anonymous_session() -> Result<()> {
    let t = setup()?;
    let (status, _, body) = call(&t.app, Method::GET, "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, JsonValue::String("xceliq ok".into()));

    let (_, _, body) = call(&t.app, Method::GET, "/api/auth/session", None, None).await;
    assert_eq!(body["session"]["state"], "anonymous");

    let (_, _, body) = call(&t.app, Method::GET, "/api/guard/admin", None, None).await;
    assert_eq!(body["guard"]["decision"], "redirect");
    assert_eq!(body["guard"]["to"], "/login");
    assert_eq!(body["guard"]["delay_ms"], 10);

    let (status, _, body) = call(&t.app, Method::GET, "/api/colleges", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "error");
    assert_eq!(body["code"], "no_session");
    Ok(())
}

#[tokio::test]
async fn login_guard_csrf_and_logout() -> Result<()> {
    let t = setup()?;
    let admin = admin_client(&t).await;

    let (_, _, body) = call(&t.app, Method::GET, "/api/auth/session", Some(&admin), None).await;
    assert_eq!(body["session"]["state"], "authenticated");
    assert_eq!(body["session"]["user"]["role"], "admin");

    let (_, _, body) = call(&t.app, Method::GET, "/api/guard/admin", Some(&admin), None).await;
    assert_eq!(body["guard"]["decision"], "allow");
    // no hierarchy: admins are bounced off student pages too
    let (_, _, body) = call(&t.app, Method::GET, "/api/guard/student", Some(&admin), None).await;
    assert_eq!(body["guard"]["decision"], "redirect");
    assert_eq!(body["guard"]["to"], "/admin/dashboard");

    let forged = Client { cookie: admin.cookie.clone(), csrf: "forged".into() };
    let (status, _, body) = call(&t.app, Method::POST, "/api/colleges", Some(&forged), Some(json!({"name": "X", "adminEmail": "x@x.io"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "invalid_csrf");

    let (status, _, _) = call(&t.app, Method::POST, "/api/auth/logout", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, _, body) = call(&t.app, Method::GET, "/api/auth/session", Some(&admin), None).await;
    assert_eq!(body["session"]["state"], "anonymous");
    Ok(())
}

#[tokio::test]
async fn bad_credentials_are_rejected() -> Result<()> {
    let t = setup()?;
    users::bootstrap_admin(&t.store, t.idp.as_ref(), "root@xceliq.io", "secret1", "Root")?;
    let (status, cookie, body) = call(&t.app, Method::POST, "/api/auth/login", None, Some(json!({"email": "root@xceliq.io", "password": "nope!!"}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(cookie.is_none());
    assert_eq!(body["code"], "invalid_credentials");
    Ok(())
}

#[tokio::test]
async fn college_delete_depends_on_students() -> Result<()> {
    let t = setup()?;
    let admin = admin_client(&t).await;
    let busy = create_college(&t.app, &admin, "Busy College", "busy@college.io").await;
    let empty = create_college(&t.app, &admin, "Empty College", "empty@college.io").await;
    register_student(&t.app, "stu@busy.io", &busy).await;

    let (status, _, body) = call(&t.app, Method::DELETE, &format!("/api/colleges/{}", busy), Some(&admin), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "college_has_students");

    let (status, _, _) = call(&t.app, Method::DELETE, &format!("/api/colleges/{}", empty), Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, _, body) = call(&t.app, Method::GET, "/api/colleges", Some(&admin), None).await;
    let names: Vec<&str> = body["colleges"].as_array().unwrap().iter().filter_map(|c| c["name"].as_str()).collect();
    assert_eq!(names, vec!["Busy College"]);
    assert_eq!(body["colleges"][0]["studentCount"], 1);
    Ok(())
}

#[tokio::test]
async fn assessment_search_is_case_insensitive() -> Result<()> {
    let t = setup()?;
    let admin = admin_client(&t).await;
    let cid = create_college(&t.app, &admin, "North", "north@college.io").await;
    let start = Utc::now() - ChronoDuration::minutes(5);
    let end = Utc::now() + ChronoDuration::hours(1);
    for name in ["Aptitude Round", "Logic Sprint", "Final APTITUDE"] {
        let (status, _, body) = call(
            &t.app,
            Method::POST,
            "/api/assessments",
            Some(&admin),
            Some(json!({"name": name, "startTime": start, "endTime": end, "games": ["speed-math"], "assignedTo": [cid]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "create assessment failed: {}", body);
    }
    let (_, _, body) = call(&t.app, Method::GET, "/api/assessments?q=apti", Some(&admin), None).await;
    let mut names: Vec<&str> = body["assessments"].as_array().unwrap().iter().filter_map(|a| a["name"].as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["Aptitude Round", "Final APTITUDE"]);

    let (_, _, body) = call(&t.app, Method::GET, "/api/assessments", Some(&admin), None).await;
    assert_eq!(body["assessments"].as_array().map(|a| a.len()), Some(3));
    Ok(())
}

#[tokio::test]
async fn student_plays_and_takes_an_assessment() -> Result<()> {
    let t = setup()?;
    let admin = admin_client(&t).await;
    let cid = create_college(&t.app, &admin, "North", "north@college.io").await;
    let start = Utc::now() - ChronoDuration::minutes(5);
    let end = Utc::now() + ChronoDuration::hours(1);
    let (_, _, body) = call(
        &t.app,
        Method::POST,
        "/api/assessments",
        Some(&admin),
        Some(json!({"name": "Live", "startTime": start, "endTime": end, "games": ["speed-math", "logic-grid"], "assignedTo": [cid]})),
    )
    .await;
    let aid = body["assessment"]["id"].as_str().expect("assessment id").to_string();

    register_student(&t.app, "stu@north.io", &cid).await;
    let stu = login(&t.app, "stu@north.io", "secret1").await;

    // exact role match only
    let (status, _, body) = call(&t.app, Method::GET, "/api/users", Some(&stu), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "role_mismatch");

    let (status, _, body) = call(&t.app, Method::POST, "/api/student/games/memory-match/plays", Some(&stu), Some(json!({"score": 42}))).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let (_, _, body) = call(&t.app, Method::GET, "/api/student/stats", Some(&stu), None).await;
    assert_eq!(body["stats"]["totalPlays"], 1);
    assert_eq!(body["stats"]["bestOverall"], 42);

    let (_, _, body) = call(&t.app, Method::GET, "/api/student/assessments", Some(&stu), None).await;
    assert_eq!(body["assessments"][0]["status"], "active");

    let base = format!("/api/student/assessments/{}/attempt", aid);
    let (status, _, _) = call(&t.app, Method::POST, &base, Some(&stu), None).await;
    assert_eq!(status, StatusCode::OK);
    call(&t.app, Method::POST, &format!("{}/games/speed-math", base), Some(&stu), Some(json!({"score": 30}))).await;
    call(&t.app, Method::POST, &format!("{}/games/logic-grid", base), Some(&stu), Some(json!({"score": 45}))).await;
    let (_, _, body) = call(&t.app, Method::POST, &format!("{}/submit", base), Some(&stu), None).await;
    assert_eq!(body["attempt"]["totalScore"], 75);
    assert_eq!(body["attempt"]["status"], "submitted");

    let (_, _, body) = call(&t.app, Method::GET, &format!("/api/reports/assessments/{}", aid), Some(&admin), None).await;
    assert_eq!(body["report"]["submitted"], 1);
    assert_eq!(body["report"]["topTotal"], 75);

    let (_, _, body) = call(&t.app, Method::GET, "/api/games/memory-match/leaderboard", Some(&stu), None).await;
    assert_eq!(body["leaderboard"][0]["bestScore"], 42);
    Ok(())
}

#[tokio::test]
async fn college_account_is_scoped_to_its_college() -> Result<()> {
    let t = setup()?;
    let admin = admin_client(&t).await;
    let own = create_college(&t.app, &admin, "Own", "own@college.io").await;
    let other = create_college(&t.app, &admin, "Other", "other@college.io").await;
    let (status, _, body) = call(
        &t.app,
        Method::POST,
        "/api/users",
        Some(&admin),
        Some(json!({"email": "own@college.io", "password": "secret1", "name": "Own Admin", "role": "college", "collegeId": own})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let college = login(&t.app, "own@college.io", "secret1").await;
    let (status, _, _) = call(&t.app, Method::GET, &format!("/api/colleges/{}/students", own), Some(&college), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, body) = call(&t.app, Method::GET, &format!("/api/reports/colleges/{}", other), Some(&college), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "college_scope");
    let (_, _, body) = call(&t.app, Method::GET, "/api/guard/college", Some(&college), None).await;
    assert_eq!(body["guard"]["decision"], "allow");
    Ok(())
}
