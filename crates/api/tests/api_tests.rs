//! Router-level tests driven through `tower::ServiceExt::oneshot`.

use api::{AppState, build_router};
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use nexus_core::time::{Clock, fixed_now};
use serde_json::{Value, json};
use services::AppServices;
use tower::util::ServiceExt;

const PASSWORD: &str = "correct horse";

async fn setup() -> Router {
    let services = AppServices::in_memory(Clock::manual(fixed_now()));
    services
        .auth()
        .ensure_admin("admin@corp.example", "Admin", PASSWORD)
        .await
        .expect("bootstrap admin");
    build_router(AppState::new(services))
}

fn request(method: &str, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

/// Logs in and returns the `session=...` pair for the Cookie header.
async fn login(app: &Router, email: &str) -> String {
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": email, "password": PASSWORD })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("session cookie")
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_owned()
}

async fn create_account(app: &Router, admin: &str, email: &str, role: &str) -> Value {
    let (status, body) = send(
        app,
        request(
            "POST",
            "/api/users",
            Some(admin),
            Some(json!({
                "email": email,
                "name": email,
                "password": PASSWORD,
                "role": role,
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

#[tokio::test]
async fn health_needs_no_session() {
    let app = setup().await;
    let (status, body) = send(&app, request("GET", "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn protected_routes_reject_missing_or_stale_sessions() {
    let app = setup().await;
    let (status, body) = send(&app, request("GET", "/api/auth/me", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "authentication required");

    let (status, _) = send(
        &app,
        request("GET", "/api/courses", Some("session=deadbeef"), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_me_logout() {
    let app = setup().await;
    let cookie = login(&app, "Admin@Corp.example").await;

    let (status, me) = send(&app, request("GET", "/api/auth/me", Some(&cookie), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "admin@corp.example");
    assert_eq!(me["role"], "ADMINISTRATOR");

    let (status, _) = send(
        &app,
        request("POST", "/api/auth/logout", Some(&cookie), None),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, request("GET", "/api/auth/me", Some(&cookie), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bad_passwords_are_rate_limited() {
    let app = setup().await;
    let wrong = json!({ "email": "admin@corp.example", "password": "not the password" });
    for _ in 0..5 {
        let (status, body) = send(
            &app,
            request("POST", "/api/auth/login", None, Some(wrong.clone())),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid email or password");
    }
    let (status, _) = send(
        &app,
        request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "admin@corp.example", "password": PASSWORD })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn course_lifecycle_over_http() {
    let app = setup().await;
    let admin = login(&app, "admin@corp.example").await;
    create_account(&app, &admin, "ines@corp.example", "INSTRUCTOR").await;
    create_account(&app, &admin, "sam@corp.example", "STUDENT").await;
    let instructor = login(&app, "ines@corp.example").await;
    let student = login(&app, "sam@corp.example").await;

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/api/courses",
            Some(&student),
            Some(json!({ "title": "Nope" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, course) = send(
        &app,
        request(
            "POST",
            "/api/courses",
            Some(&instructor),
            Some(json!({ "title": "Onboarding", "description": "Day one" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let course_id = course["id"].as_u64().unwrap();

    let (status, lesson) = send(
        &app,
        request(
            "POST",
            &format!("/api/courses/{course_id}/lessons"),
            Some(&instructor),
            Some(json!({ "title": "Welcome" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let lesson_id = lesson["id"].as_u64().unwrap();

    // Drafts are hidden from students.
    let (status, _) = send(
        &app,
        request("GET", &format!("/api/courses/{course_id}"), Some(&student), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        request(
            "POST",
            &format!("/api/courses/{course_id}/publish"),
            Some(&instructor),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let enroll = format!("/api/courses/{course_id}/enroll");
    let (status, progress) = send(&app, request("POST", &enroll, Some(&student), None)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(progress["progress_percentage"], 0);
    let (status, _) = send(&app, request("POST", &enroll, Some(&student), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, outcome) = send(
        &app,
        request(
            "POST",
            &format!("/api/progress/{course_id}/lessons/{lesson_id}/complete"),
            Some(&student),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["recorded"], true);
    assert_eq!(outcome["course_completed"], true);
    assert_eq!(outcome["progress"]["progress_percentage"], 100);

    // lesson + course + first enrollment + first completion
    let (_, summary) = send(
        &app,
        request("GET", "/api/gamification/me", Some(&student), None),
    )
    .await;
    assert_eq!(summary["xp"], 10 + 100 + 10 + 50);

    let (_, notifications) = send(
        &app,
        request("GET", "/api/notifications", Some(&student), None),
    )
    .await;
    assert_eq!(notifications.as_array().unwrap().len(), 2);
    let (status, marked) = send(
        &app,
        request("POST", "/api/notifications/read-all", Some(&student), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(marked["updated"], 2);
}

#[tokio::test]
async fn admin_surfaces_are_guarded() {
    let app = setup().await;
    let admin = login(&app, "admin@corp.example").await;
    create_account(&app, &admin, "sam@corp.example", "STUDENT").await;
    let student = login(&app, "sam@corp.example").await;

    let draft = json!({ "platform_name": "Academy", "allow_public_registration": true });
    let (status, _) = send(
        &app,
        request("PUT", "/api/settings", Some(&student), Some(draft.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, saved) = send(
        &app,
        request("PUT", "/api/settings", Some(&admin), Some(draft)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["platform_name"], "Academy");

    let (status, _) = send(
        &app,
        request("GET", "/api/security-logs", Some(&student), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, logs) = send(
        &app,
        request("GET", "/api/security-logs?limit=1", Some(&admin), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(logs[0]["event"], "SUCCESSFUL_LOGIN");
}

#[tokio::test]
async fn weekly_event_appears_once_in_the_next_week() {
    let app = setup().await;
    let admin = login(&app, "admin@corp.example").await;

    let (status, event) = send(
        &app,
        request(
            "POST",
            "/api/events",
            Some(&admin),
            Some(json!({
                "title": "Stand-up",
                "start": "2024-03-04T09:00:00Z",
                "end": "2024-03-04T09:30:00Z",
                "recurrence": "WEEKLY",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(event["recurrence"], "WEEKLY");

    let (status, occurrences) = send(
        &app,
        request(
            "GET",
            "/api/events?start=2024-03-10T00:00:00Z&end=2024-03-16T23:59:59Z",
            Some(&admin),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let occurrences = occurrences.as_array().unwrap();
    assert_eq!(occurrences.len(), 1);
    assert_eq!(occurrences[0]["start"], "2024-03-11T09:00:00Z");
    assert_eq!(occurrences[0]["end"], "2024-03-11T09:30:00Z");
}
