//! HTTP-level tests driving the router with `oneshot`.

use std::sync::Arc;

use axum::{
  body::Body,
  http::{Request, StatusCode, header},
};
use pickup_core::{
  directory,
  guardian::{NewGuardian, Role},
  store::PickupStore,
};
use pickup_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use super::*;
use crate::{auth::hash_password, render::QrSvgRenderer};

const ADMIN_EMAIL: &str = "admin@school.test";
const PASSWORD: &str = "hunter22";

async fn make_state() -> AppState<SqliteStore> {
  let store = SqliteStore::open_in_memory().await.unwrap();
  directory::create_admin(&store, NewGuardian {
    name:          "Head of School".into(),
    email:         ADMIN_EMAIL.into(),
    phone:         None,
    role:          Role::Admin,
    photo:         None,
    password_hash: hash_password(PASSWORD).unwrap(),
    children:      vec![],
  })
  .await
  .unwrap();

  AppState {
    store:    Arc::new(store),
    renderer: Arc::new(QrSvgRenderer),
    config:   Arc::new(ServerConfig::default()),
  }
}

async fn send(
  state: &AppState<SqliteStore>,
  method: &str,
  uri: &str,
  token: Option<&str>,
  body: Option<Value>,
) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  if let Some(token) = token {
    builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
  }
  let body = match body {
    Some(v) => {
      builder = builder.header(header::CONTENT_TYPE, "application/json");
      Body::from(v.to_string())
    }
    None => Body::empty(),
  };
  let resp = router(state.clone())
    .oneshot(builder.body(body).unwrap())
    .await
    .unwrap();

  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let json = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, json)
}

async fn login(state: &AppState<SqliteStore>, email: &str) -> String {
  let (status, body) = send(
    state,
    "POST",
    "/api/v1/auth/login",
    None,
    Some(json!({ "email": email, "password": PASSWORD })),
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  body["token"].as_str().unwrap().to_string()
}

async fn create_account(
  state: &AppState<SqliteStore>,
  admin: &str,
  email: &str,
  role: &str,
) -> String {
  let (status, body) = send(
    state,
    "POST",
    "/api/v1/guardians",
    Some(admin),
    Some(json!({ "name": email, "email": email, "password": PASSWORD, "role": role })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED, "{body}");
  body["record"]["guardian_id"].as_str().unwrap().to_string()
}

async fn create_student(state: &AppState<SqliteStore>, admin: &str, guardians: &[&str]) -> Value {
  let (status, body) = send(
    state,
    "POST",
    "/api/v1/students",
    Some(admin),
    Some(json!({
      "student_number": "S-100",
      "first_name": "Ada",
      "last_name": "Byron",
      "grade": "3",
      "date_of_birth": "2016-12-10",
      "guardians": guardians,
      "authorized_pickup": [
        { "name": "Charles Babbage", "relationship": "Uncle", "phone": "555-0101" }
      ],
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED, "{body}");
  body["record"].clone()
}

/// What a scanner would read off a guardian code image.
fn scanned(student_id: &str, guardian_id: &str, code: &str) -> String {
  json!({ "student_id": student_id, "guardian_id": guardian_id, "code": code }).to_string()
}

// ─── Public routes ───────────────────────────────────────────────────────────

#[tokio::test]
async fn health_is_public() {
  let state = make_state().await;
  let (status, body) = send(&state, "GET", "/api/v1/health", None, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn unknown_route_is_json_404() {
  let state = make_state().await;
  let (status, body) = send(&state, "GET", "/api/v1/nope", None, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["error"], "not found");
}

// ─── Auth ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn register_ignores_requested_role() {
  let state = make_state().await;
  let (status, body) = send(
    &state,
    "POST",
    "/api/v1/auth/register",
    None,
    Some(json!({
      "name": "Parent",
      "email": "Parent@Example.com",
      "password": PASSWORD,
      "role": "admin",
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED, "{body}");
  let token = body["token"].as_str().unwrap();

  let (status, me) = send(&state, "GET", "/api/v1/auth/me", Some(token), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(me["role"], "guardian");
  assert_eq!(me["email"], "parent@example.com");
}

#[tokio::test]
async fn login_failures() {
  let state = make_state().await;

  let (status, _) = send(
    &state,
    "POST",
    "/api/v1/auth/login",
    None,
    Some(json!({ "email": ADMIN_EMAIL })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, body) = send(
    &state,
    "POST",
    "/api/v1/auth/login",
    None,
    Some(json!({ "email": ADMIN_EMAIL, "password": "wrong-password" })),
  )
  .await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(body["error"], "invalid credentials");

  let (status, _) = send(
    &state,
    "POST",
    "/api/v1/auth/login",
    None,
    Some(json!({ "email": "ghost@school.test", "password": PASSWORD })),
  )
  .await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_need_a_live_token() {
  let state = make_state().await;
  let (status, _) = send(&state, "GET", "/api/v1/students", None, None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);

  let (status, _) = send(&state, "GET", "/api/v1/students", Some("bogus"), None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);

  let token = login(&state, ADMIN_EMAIL).await;
  let (status, _) = send(&state, "POST", "/api/v1/auth/logout", Some(&token), None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  let (status, _) = send(&state, "GET", "/api/v1/students", Some(&token), None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_json_body_is_bad_request() {
  let state = make_state().await;
  let admin = login(&state, ADMIN_EMAIL).await;
  let (status, body) = send(
    &state,
    "POST",
    "/api/v1/students",
    Some(&admin),
    Some(json!({ "first_name": "Ada" })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].is_string());
}

// ─── Directory ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn guardians_cannot_manage_directory() {
  let state = make_state().await;
  let admin = login(&state, ADMIN_EMAIL).await;
  create_account(&state, &admin, "parent@school.test", "guardian").await;
  let parent = login(&state, "parent@school.test").await;

  let (status, _) = send(&state, "GET", "/api/v1/students", Some(&parent), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  let (status, _) = send(&state, "GET", "/api/v1/guardians", Some(&parent), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn student_response_links_guardian_and_hides_codes() {
  let state = make_state().await;
  let admin = login(&state, ADMIN_EMAIL).await;
  let gid = create_account(&state, &admin, "parent@school.test", "guardian").await;
  let student = create_student(&state, &admin, &[&gid]).await;
  let sid = student["student_id"].as_str().unwrap();

  assert_eq!(student["guardians"], json!([gid]));
  assert!(student.get("codes").is_none());
  assert_eq!(student["photo"], "no-photo.jpg");
  assert!(student["authorized_pickup"][0].get("code").is_none());

  let parent = login(&state, "parent@school.test").await;
  let (status, me) = send(&state, "GET", "/api/v1/auth/me", Some(&parent), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(me["children"], json!([sid]));

  let (status, _) =
    send(&state, "GET", &format!("/api/v1/students/{sid}"), Some(&parent), None).await;
  assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn duplicate_student_number_is_409() {
  let state = make_state().await;
  let admin = login(&state, ADMIN_EMAIL).await;
  create_student(&state, &admin, &[]).await;
  let (status, _) = send(
    &state,
    "POST",
    "/api/v1/students",
    Some(&admin),
    Some(json!({
      "student_number": "S-100",
      "first_name": "Other",
      "last_name": "Child",
      "grade": "1",
      "date_of_birth": "2018-01-01",
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn guardian_cannot_escalate_own_role() {
  let state = make_state().await;
  let admin = login(&state, ADMIN_EMAIL).await;
  let gid = create_account(&state, &admin, "parent@school.test", "guardian").await;
  let parent = login(&state, "parent@school.test").await;

  let (status, body) = send(
    &state,
    "PUT",
    &format!("/api/v1/guardians/{gid}"),
    Some(&parent),
    Some(json!({ "name": "Renamed", "role": "admin" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["record"]["name"], "Renamed");
  assert_eq!(body["record"]["role"], "guardian");

  let other = create_account(&state, &admin, "other@school.test", "guardian").await;
  let (status, _) =
    send(&state, "GET", &format!("/api/v1/guardians/{other}"), Some(&parent), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn deleting_guardian_unlinks_student() {
  let state = make_state().await;
  let admin = login(&state, ADMIN_EMAIL).await;
  let gid = create_account(&state, &admin, "parent@school.test", "guardian").await;
  let student = create_student(&state, &admin, &[&gid]).await;
  let sid = student["student_id"].as_str().unwrap();

  let (status, _) =
    send(&state, "DELETE", &format!("/api/v1/guardians/{gid}"), Some(&admin), None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);

  let (_, student) =
    send(&state, "GET", &format!("/api/v1/students/{sid}"), Some(&admin), None).await;
  assert_eq!(student["guardians"], json!([]));
}

// ─── Pickup flow ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn guardian_pickup_end_to_end() {
  let state = make_state().await;
  let admin = login(&state, ADMIN_EMAIL).await;
  let gid = create_account(&state, &admin, "parent@school.test", "guardian").await;
  create_account(&state, &admin, "desk@school.test", "staff").await;
  let student = create_student(&state, &admin, &[&gid]).await;
  let sid = student["student_id"].as_str().unwrap();

  let parent = login(&state, "parent@school.test").await;
  let staff = login(&state, "desk@school.test").await;

  let (status, issued) = send(
    &state,
    "GET",
    &format!("/api/v1/students/{sid}/guardians/{gid}/qrcode"),
    Some(&parent),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{issued}");
  assert!(
    issued["image"]
      .as_str()
      .unwrap()
      .starts_with("data:image/svg+xml;base64,")
  );
  let code = issued["code"].as_str().unwrap();
  let payload = scanned(sid, &gid, code);

  // Guardians may not verify.
  let (status, _) = send(
    &state,
    "POST",
    "/api/v1/verify-pickup",
    Some(&parent),
    Some(json!({ "qr_code_data": payload })),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, receipt) = send(
    &state,
    "POST",
    "/api/v1/verify-pickup",
    Some(&staff),
    Some(json!({ "qr_code_data": payload })),
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{receipt}");
  assert_eq!(receipt["student"]["name"], "Ada Byron");
  assert_eq!(receipt["verified_by"], "desk@school.test");

  let (status, body) = send(
    &state,
    "POST",
    "/api/v1/verify-pickup",
    Some(&staff),
    Some(json!({ "qr_code_data": payload })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], "invalid or expired pickup code");

  let (status, logs) = send(&state, "GET", "/api/v1/logs", Some(&parent), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(logs.as_array().unwrap().len(), 1);
  assert_eq!(logs[0]["collector"]["kind"], "guardian");
}

#[tokio::test]
async fn registered_stranger_is_refused_student_and_code() {
  let state = make_state().await;
  let admin = login(&state, ADMIN_EMAIL).await;
  let gid = create_account(&state, &admin, "parent@school.test", "guardian").await;
  let student = create_student(&state, &admin, &[&gid]).await;
  let sid = student["student_id"].as_str().unwrap();

  let (status, body) = send(
    &state,
    "POST",
    "/api/v1/auth/register",
    None,
    Some(json!({ "name": "Eve", "email": "eve@example.com", "password": PASSWORD })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED, "{body}");
  let eve = body["token"].as_str().unwrap();

  let (status, _) = send(&state, "GET", &format!("/api/v1/students/{sid}"), Some(eve), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, _) = send(
    &state,
    "GET",
    &format!("/api/v1/students/{sid}/guardians/{gid}/qrcode"),
    Some(eve),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn empty_scan_is_bad_request() {
  let state = make_state().await;
  let admin = login(&state, ADMIN_EMAIL).await;
  let (status, body) = send(
    &state,
    "POST",
    "/api/v1/verify-pickup",
    Some(&admin),
    Some(json!({})),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], "please provide QR code data");
}

#[tokio::test]
async fn authorized_pickup_end_to_end() {
  let state = make_state().await;
  let admin = login(&state, ADMIN_EMAIL).await;
  let gid = create_account(&state, &admin, "parent@school.test", "guardian").await;
  let student = create_student(&state, &admin, &[&gid]).await;
  let sid = student["student_id"].as_str().unwrap();
  let pid = student["authorized_pickup"][0]["pickup_id"].as_str().unwrap();
  let parent = login(&state, "parent@school.test").await;

  let (status, issued) = send(
    &state,
    "GET",
    &format!("/api/v1/students/{sid}/authorized-pickup/{pid}/qrcode"),
    Some(&parent),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{issued}");
  assert_eq!(issued["pickup_person_name"], "Charles Babbage");

  let payload = json!({ "student_id": sid, "pickup_id": pid, "code": issued["code"] }).to_string();
  let (status, receipt) = send(
    &state,
    "POST",
    "/api/v1/verify-authorized-pickup",
    Some(&admin),
    Some(json!({ "qr_code_data": payload })),
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{receipt}");
  assert_eq!(receipt["pickup_person"]["relationship"], "Uncle");
  assert_eq!(receipt["verified_by"], "Head of School");

  let (status, _) = send(
    &state,
    "POST",
    "/api/v1/verify-authorized-pickup",
    Some(&admin),
    Some(json!({ "qr_code_data": payload })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn code_for_unknown_student_is_404() {
  let state = make_state().await;
  let admin = login(&state, ADMIN_EMAIL).await;
  let gid = create_account(&state, &admin, "parent@school.test", "guardian").await;
  let missing = uuid::Uuid::new_v4();
  let (status, _) = send(
    &state,
    "GET",
    &format!("/api/v1/students/{missing}/guardians/{gid}/qrcode"),
    Some(&admin),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert!(state.store.list_students().await.unwrap().is_empty());
}
