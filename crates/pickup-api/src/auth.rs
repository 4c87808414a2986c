//! Bearer-session authentication.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/auth/register` | Public; always creates a guardian account |
//! | `POST` | `/auth/login` | Public; `{email, password}` |
//! | `GET`  | `/auth/me` | The caller's own account |
//! | `POST` | `/auth/logout` | Revokes the presented token |
//!
//! Tokens are 32 random bytes, hex-encoded. Only their SHA-256 digest is
//! stored.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
  Json,
  extract::{FromRequestParts, State},
  http::{HeaderMap, StatusCode, header, request::Parts},
  response::IntoResponse,
};
use chrono::{DateTime, Duration, Utc};
use pickup_core::{
  Error as CoreError,
  directory,
  guardian::{Guardian, NewGuardian, Principal, Role, Session},
  store::PickupStore,
};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
  AppState, JsonBody,
  error::{ApiError, Result, store_error},
};

pub const MIN_PASSWORD_LEN: usize = 6;

const TOKEN_BYTES: usize = 32;

// ─── Tokens and passwords ────────────────────────────────────────────────────

/// A fresh random session token, hex-encoded.
pub fn generate_session_token() -> String {
  let mut bytes = [0u8; TOKEN_BYTES];
  OsRng.fill_bytes(&mut bytes);
  hex::encode(bytes)
}

/// The digest under which a token is persisted.
pub fn hash_token(token: &str) -> String { hex::encode(Sha256::digest(token.as_bytes())) }

/// Hash a password into an argon2 PHC string.
pub fn hash_password(password: &str) -> Result<String> {
  if password.chars().count() < MIN_PASSWORD_LEN {
    return Err(
      CoreError::InvalidInput(format!(
        "password must be at least {MIN_PASSWORD_LEN} characters"
      ))
      .into(),
    );
  }
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|h| h.to_string())
    .map_err(|e| CoreError::Store(format!("argon2 error: {e}").into()).into())
}

/// Check a password against a stored PHC string. Malformed hashes never match.
pub fn verify_password(password: &str, phc: &str) -> bool {
  PasswordHash::new(phc)
    .map(|parsed| {
      Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
    })
    .unwrap_or(false)
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
  headers
    .get(header::AUTHORIZATION)?
    .to_str()
    .ok()?
    .strip_prefix("Bearer ")
    .map(str::trim)
    .filter(|t| !t.is_empty())
}

// ─── Extractor ───────────────────────────────────────────────────────────────

/// Present in a handler's arguments means the request carried a live session.
pub struct Authenticated {
  pub principal:  Principal,
  pub token_hash: String,
}

impl<S> FromRequestParts<AppState<S>> for Authenticated
where
  S: PickupStore + Clone + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let token = bearer(&parts.headers).ok_or_else(ApiError::unauthenticated)?;
    let token_hash = hash_token(token);

    let session = state
      .store
      .get_session(token_hash.clone())
      .await
      .map_err(store_error)?
      .filter(|s| s.is_live_at(Utc::now()))
      .ok_or_else(ApiError::unauthenticated)?;

    // The account may have been deleted since the session was issued.
    let account = state
      .store
      .get_guardian(session.guardian_id)
      .await
      .map_err(store_error)?
      .ok_or_else(ApiError::unauthenticated)?;

    Ok(Authenticated {
      principal: Principal { id: account.guardian_id, role: account.role },
      token_hash,
    })
  }
}

// ─── Handlers ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct TokenResponse {
  pub token:      String,
  pub expires_at: DateTime<Utc>,
}

async fn open_session<S: PickupStore>(state: &AppState<S>, account: &Guardian) -> Result<TokenResponse> {
  let token = generate_session_token();
  let now = Utc::now();
  let expires_at = now + Duration::hours(state.config.session_ttl_hours);

  state
    .store
    .create_session(Session {
      token_hash: hash_token(&token),
      guardian_id: account.guardian_id,
      created_at: now,
      expires_at,
    })
    .await
    .map_err(store_error)?;

  tracing::info!(guardian = %account.guardian_id, role = %account.role, "session opened");
  Ok(TokenResponse { token, expires_at })
}

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  pub name:     String,
  pub email:    String,
  pub password: String,
  #[serde(default)]
  pub phone:    Option<String>,
}

/// `POST /auth/register`
pub async fn register<S>(
  State(state): State<AppState<S>>,
  JsonBody(body): JsonBody<RegisterBody>,
) -> Result<impl IntoResponse>
where
  S: PickupStore + Clone + 'static,
{
  let password_hash = hash_password(&body.password)?;
  let account = directory::register_guardian(&*state.store, NewGuardian {
    name: body.name,
    email: body.email,
    phone: body.phone,
    role: Role::Guardian,
    photo: None,
    password_hash,
    children: Vec::new(),
  })
  .await?;

  let tokens = open_session(&state, &account).await?;
  Ok((StatusCode::CREATED, Json(tokens)))
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  #[serde(default)]
  pub email:    String,
  #[serde(default)]
  pub password: String,
}

/// `POST /auth/login`
pub async fn login<S>(
  State(state): State<AppState<S>>,
  JsonBody(body): JsonBody<LoginBody>,
) -> Result<Json<TokenResponse>>
where
  S: PickupStore + Clone + 'static,
{
  if body.email.trim().is_empty() || body.password.is_empty() {
    return Err(CoreError::InvalidInput("please provide an email and password".into()).into());
  }

  let email = body.email.trim().to_lowercase();
  let creds = state
    .store
    .get_credentials(email)
    .await
    .map_err(store_error)?
    .ok_or_else(ApiError::invalid_credentials)?;

  if !verify_password(&body.password, &creds.password_hash) {
    return Err(ApiError::invalid_credentials());
  }

  let account = state
    .store
    .get_guardian(creds.guardian_id)
    .await
    .map_err(store_error)?
    .ok_or_else(ApiError::invalid_credentials)?;

  Ok(Json(open_session(&state, &account).await?))
}

/// `GET /auth/me`
pub async fn me<S>(
  State(state): State<AppState<S>>,
  auth: Authenticated,
) -> Result<Json<Guardian>>
where
  S: PickupStore + Clone + 'static,
{
  let account =
    directory::get_guardian(&*state.store, &auth.principal, auth.principal.id).await?;
  Ok(Json(account))
}

/// `POST /auth/logout`
pub async fn logout<S>(
  State(state): State<AppState<S>>,
  auth: Authenticated,
) -> Result<StatusCode>
where
  S: PickupStore + Clone + 'static,
{
  state
    .store
    .delete_session(auth.token_hash)
    .await
    .map_err(store_error)?;
  Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tokens_are_64_hex_chars_and_distinct() {
    let a = generate_session_token();
    let b = generate_session_token();
    assert_eq!(a.len(), 64);
    assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    assert_ne!(a, b);
  }

  #[test]
  fn token_hash_is_stable_and_differs_from_token() {
    let t = generate_session_token();
    assert_eq!(hash_token(&t), hash_token(&t));
    assert_ne!(hash_token(&t), t);
  }

  #[test]
  fn password_hash_verifies_only_the_right_password() {
    let phc = hash_password("secret1").unwrap();
    assert!(verify_password("secret1", &phc));
    assert!(!verify_password("secret2", &phc));
  }

  #[test]
  fn short_passwords_are_rejected() {
    assert!(matches!(
      hash_password("abc"),
      Err(ApiError::Core(CoreError::InvalidInput(_)))
    ));
  }

  #[test]
  fn malformed_hash_never_verifies() {
    assert!(!verify_password("anything", "not-a-phc-string"));
  }

  #[test]
  fn bearer_header_parsing() {
    let mut headers = HeaderMap::new();
    assert_eq!(bearer(&headers), None);
    headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
    assert_eq!(bearer(&headers), None);
    headers.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());
    assert_eq!(bearer(&headers), Some("abc"));
  }
}
