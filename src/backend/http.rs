//! backend::http
//!
//! HTTP backend implementation over reqwest.
//!
//! # Design
//!
//! One `HttpBackend` wraps a reqwest `Client` with a cookie store. The
//! backend pins sessions via cookies, so the client must persist them for
//! stateful mode to work at all.
//!
//! # CSRF
//!
//! Mutating requests require a CSRF token. The token is fetched lazily
//! (a GET with `X-CSRF-Token: fetch`), cached, and sent on every mutating
//! request. If the backend answers 403 with `X-CSRF-Token: required` the
//! cached token is stale: it is dropped, re-fetched, and the request is
//! retried exactly once.
//!
//! # Sessions
//!
//! [`SessionMode::Stateful`] adds the `X-Session-Mode: stateful` header so
//! the backend pins the session; `reset` rebuilds the client, dropping the
//! session cookie and the cached token.
//!
//! # Errors
//!
//! Non-success statuses are mapped to [`BackendError`] variants:
//! 401/403 → `AuthFailed`, 404 → `NotFound`, 409 → `Conflict`,
//! 423 → `LockConflict`, the rest → `Api`.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, Method as HttpMethod, Response, StatusCode};

use super::traits::{Backend, BackendError, Method, RequestSpec, ResponseData, SessionMode};
use crate::core::config::BackendProfile;

/// CSRF token header name.
const CSRF_HEADER: &str = "X-CSRF-Token";

/// Session mode header name.
const SESSION_HEADER: &str = "X-Session-Mode";

/// Path used to fetch a fresh CSRF token.
const CSRF_FETCH_PATH: &str = "discovery";

/// User-Agent header value for backend requests.
const USER_AGENT_VALUE: &str = "stagehand-cli";

/// HTTP backend for a remote versioned-edit service.
pub struct HttpBackend {
    /// Rebuilt on `reset` to drop the pinned session cookie.
    client: Mutex<Client>,
    base_url: String,
    user: String,
    password: String,
    client_id: Option<String>,
    timeout: Duration,
    /// Cached CSRF token; `None` until first mutating request.
    csrf_token: Mutex<Option<String>>,
    session_mode: Mutex<SessionMode>,
}

// Custom Debug to avoid exposing the password
impl std::fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackend")
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .field("client_id", &self.client_id)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpBackend {
    /// Create a backend from a profile and resolved password.
    pub fn new(profile: &BackendProfile, password: impl Into<String>) -> Self {
        let timeout = profile.timeout();
        Self {
            client: Mutex::new(build_client(timeout)),
            base_url: profile.base_url.trim_end_matches('/').to_string(),
            user: profile.user.clone(),
            password: password.into(),
            client_id: profile.client.clone(),
            timeout,
            csrf_token: Mutex::new(None),
            session_mode: Mutex::new(SessionMode::Stateless),
        }
    }

    /// Create a backend against an explicit base URL (tests, ad-hoc use).
    pub fn with_base_url(
        base_url: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let timeout = Duration::from_secs(60);
        Self {
            client: Mutex::new(build_client(timeout)),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user: user.into(),
            password: password.into(),
            client_id: None,
            timeout,
            csrf_token: Mutex::new(None),
            session_mode: Mutex::new(SessionMode::Stateless),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn current_client(&self) -> Client {
        self.client.lock().expect("client lock").clone()
    }

    fn cached_token(&self) -> Option<String> {
        self.csrf_token.lock().expect("csrf lock").clone()
    }

    fn store_token(&self, token: Option<String>) {
        *self.csrf_token.lock().expect("csrf lock") = token;
    }

    /// Common headers for every request.
    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        if let Some(client_id) = &self.client_id {
            if let Ok(value) = HeaderValue::from_str(client_id) {
                headers.insert("X-Backend-Client", value);
            }
        }
        if *self.session_mode.lock().expect("mode lock") == SessionMode::Stateful {
            headers.insert(SESSION_HEADER, HeaderValue::from_static("stateful"));
        }
        headers
    }

    /// Fetch a fresh CSRF token and cache it.
    async fn fetch_csrf_token(&self) -> Result<String, BackendError> {
        let client = self.current_client();
        let response = client
            .get(self.url(CSRF_FETCH_PATH))
            .basic_auth(&self.user, Some(&self.password))
            .headers(self.headers())
            .header(CSRF_HEADER, "fetch")
            .send()
            .await
            .map_err(transport_error)?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(BackendError::AuthFailed(
                "invalid credentials while fetching token".into(),
            ));
        }

        let token = response
            .headers()
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| BackendError::AuthFailed("backend did not issue a token".into()))?;

        self.store_token(Some(token.clone()));
        Ok(token)
    }

    /// Token for a mutating request, fetching on first use.
    async fn mutation_token(&self) -> Result<String, BackendError> {
        match self.cached_token() {
            Some(token) => Ok(token),
            None => self.fetch_csrf_token().await,
        }
    }

    async fn send(&self, spec: &RequestSpec, token: Option<&str>) -> Result<Response, BackendError> {
        let client = self.current_client();
        let method = match spec.method {
            Method::Get => HttpMethod::GET,
            Method::Post => HttpMethod::POST,
            Method::Put => HttpMethod::PUT,
            Method::Delete => HttpMethod::DELETE,
        };

        let mut request = client
            .request(method, self.url(&spec.path))
            .basic_auth(&self.user, Some(&self.password))
            .headers(self.headers())
            .query(&spec.query);

        if let Some(token) = token {
            request = request.header(CSRF_HEADER, token);
        }
        if let (Some(body), Some(content_type)) = (&spec.body, &spec.content_type) {
            request = request
                .header(reqwest::header::CONTENT_TYPE, content_type.clone())
                .body(body.clone());
        }

        request.send().await.map_err(transport_error)
    }

    /// Whether a 403 response signals a stale CSRF token.
    fn is_stale_token(response: &Response) -> bool {
        response.status() == StatusCode::FORBIDDEN
            && response
                .headers()
                .get(CSRF_HEADER)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.eq_ignore_ascii_case("required"))
    }

    async fn into_response_data(response: Response) -> Result<ResponseData, BackendError> {
        let status = response.status();
        let headers: std::collections::HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(transport_error)?;

        if status.is_success() {
            return Ok(ResponseData {
                status: status.as_u16(),
                body,
                headers,
            });
        }

        let message = error_message(&body);
        Err(match status {
            StatusCode::UNAUTHORIZED => BackendError::AuthFailed("invalid credentials".into()),
            StatusCode::FORBIDDEN => BackendError::AuthFailed(message),
            StatusCode::NOT_FOUND => BackendError::NotFound(message),
            StatusCode::CONFLICT => BackendError::Conflict(message),
            StatusCode::LOCKED => BackendError::LockConflict(message),
            _ => BackendError::Api {
                status: status.as_u16(),
                message,
            },
        })
    }
}

#[async_trait]
impl Backend for HttpBackend {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn request(&self, spec: RequestSpec) -> Result<ResponseData, BackendError> {
        let needs_token = !matches!(spec.method, Method::Get);
        let token = if needs_token {
            Some(self.mutation_token().await?)
        } else {
            None
        };

        let response = self.send(&spec, token.as_deref()).await?;

        // Stale token: drop the cache, fetch a fresh one, retry once.
        if needs_token && Self::is_stale_token(&response) {
            self.store_token(None);
            let fresh = self.fetch_csrf_token().await?;
            let retried = self.send(&spec, Some(&fresh)).await?;
            return Self::into_response_data(retried).await;
        }

        Self::into_response_data(response).await
    }

    fn set_session_mode(&self, mode: SessionMode) {
        *self.session_mode.lock().expect("mode lock") = mode;
    }

    fn session_mode(&self) -> SessionMode {
        *self.session_mode.lock().expect("mode lock")
    }

    fn reset(&self) {
        // Rebuilding the client drops the cookie store, which is the only
        // way to discard a pinned session in reqwest.
        *self.client.lock().expect("client lock") = build_client(self.timeout);
        self.store_token(None);
        *self.session_mode.lock().expect("mode lock") = SessionMode::Stateless;
    }
}

fn build_client(timeout: Duration) -> Client {
    Client::builder()
        .cookie_store(true)
        .timeout(timeout)
        .build()
        .expect("reqwest client construction cannot fail with static options")
}

fn transport_error(e: reqwest::Error) -> BackendError {
    BackendError::Transport(e.to_string())
}

/// Pull a human-readable message out of an error body.
///
/// The backend answers JSON `{"message": "..."}` on most errors; fall back
/// to the raw body, truncated so a giant HTML error page does not flood the
/// terminal.
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
            return message.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "no error detail".to_string();
    }
    let mut message: String = trimmed.chars().take(200).collect();
    if trimmed.chars().count() > 200 {
        message.push('…');
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let backend = HttpBackend::with_base_url("http://localhost:8080/", "dev", "secret");
        assert_eq!(backend.url("classes/zcl_demo"), "http://localhost:8080/classes/zcl_demo");
    }

    #[test]
    fn debug_does_not_leak_password() {
        let backend = HttpBackend::with_base_url("http://localhost", "dev", "s3cr3t");
        let rendered = format!("{:?}", backend);
        assert!(!rendered.contains("s3cr3t"));
        assert!(rendered.contains("dev"));
    }

    #[test]
    fn session_mode_round_trip() {
        let backend = HttpBackend::with_base_url("http://localhost", "dev", "pw");
        assert_eq!(backend.session_mode(), SessionMode::Stateless);
        backend.set_session_mode(SessionMode::Stateful);
        assert_eq!(backend.session_mode(), SessionMode::Stateful);
        backend.reset();
        assert_eq!(backend.session_mode(), SessionMode::Stateless);
    }

    #[test]
    fn reset_clears_cached_token() {
        let backend = HttpBackend::with_base_url("http://localhost", "dev", "pw");
        backend.store_token(Some("abc123".into()));
        backend.reset();
        assert!(backend.cached_token().is_none());
    }

    #[test]
    fn error_message_prefers_json_message() {
        assert_eq!(error_message(r#"{"message":"object locked"}"#), "object locked");
    }

    #[test]
    fn error_message_falls_back_to_body() {
        assert_eq!(error_message("plain text failure"), "plain text failure");
        assert_eq!(error_message("   "), "no error detail");
    }

    #[test]
    fn error_message_truncates_long_bodies() {
        let long = "x".repeat(500);
        let message = error_message(&long);
        assert!(message.chars().count() <= 201);
        assert!(message.ends_with('…'));
    }
}
