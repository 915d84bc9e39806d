use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use coursedrill_core::{
    AttemptRequest, AttemptResponse, AuthSession, CartCourse, PracticeApi, SessionEnded,
    SessionStarted, SimError, StartSessionRequest,
};

const START_PATH: &str = "api/practice/start";
const END_PATH: &str = "api/practice/end";
const ATTEMPT_PATH: &str = "api/practice/attempt";
const CART_PATH: &str = "api/cart";

/// JSON-over-HTTP practice backend
pub struct HttpPracticeApi {
    client: reqwest::Client,
    base: Url,
    auth: AuthSession,
    request_timeout_seconds: u64,
}

impl HttpPracticeApi {
    pub fn new(
        base_url: &str,
        auth: AuthSession,
        connect_timeout_seconds: u64,
        request_timeout_seconds: u64,
    ) -> Result<Self, SimError> {
        let base = normalize_base(base_url)?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_seconds))
            .timeout(Duration::from_secs(request_timeout_seconds))
            .build()
            .map_err(|e| SimError::Config(format!("http client: {}", e)))?;

        Ok(Self {
            client,
            base,
            auth,
            request_timeout_seconds,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, SimError> {
        self.base
            .join(path)
            .map_err(|e| SimError::Config(format!("bad endpoint {}: {}", path, e)))
    }

    async fn call<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, SimError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        debug!(url = %url, method = %method, "practice api call");

        let mut request = self.client.request(method, url.clone());
        if let Some(token) = self.auth.bearer().await {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let resp = request.send().await.map_err(|e| {
            warn!(url = %url, error = %e, "practice api transport failure");
            if e.is_timeout() {
                SimError::Timeout(self.request_timeout_seconds)
            } else {
                SimError::Remote { status: None, message: None }
            }
        })?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|_| SimError::Remote { status: Some(status.as_u16()), message: None })?;

        if !status.is_success() {
            return Err(classify_failure(status, &bytes));
        }

        // Endpoints that answer 204 still deserialize into their all-optional shapes.
        let payload: &[u8] = if bytes.is_empty() { b"{}" } else { &bytes };
        serde_json::from_slice(payload).map_err(|e| {
            warn!(url = %url, error = %e, "unexpected practice api payload");
            SimError::Remote { status: Some(status.as_u16()), message: None }
        })
    }
}

#[async_trait]
impl PracticeApi for HttpPracticeApi {
    fn name(&self) -> &str {
        "http"
    }

    async fn start_session(&self, request: &StartSessionRequest) -> Result<SessionStarted, SimError> {
        self.call(Method::POST, START_PATH, Some(request)).await
    }

    async fn end_session(&self) -> Result<SessionEnded, SimError> {
        self.call::<(), _>(Method::POST, END_PATH, None).await
    }

    async fn submit_attempt(&self, request: &AttemptRequest) -> Result<AttemptResponse, SimError> {
        self.call(Method::POST, ATTEMPT_PATH, Some(request)).await
    }

    async fn fetch_cart_courses(&self) -> Result<Vec<CartCourse>, SimError> {
        self.call::<(), _>(Method::GET, CART_PATH, None).await
    }
}

/// Base URLs must end in a slash or `join` drops their last segment.
fn normalize_base(base_url: &str) -> Result<Url, SimError> {
    let mut raw = base_url.trim().to_string();
    if !raw.ends_with('/') {
        raw.push('/');
    }
    Url::parse(&raw).map_err(|e| SimError::Config(format!("invalid server url {}: {}", base_url, e)))
}

fn classify_failure(status: StatusCode, body: &[u8]) -> SimError {
    let message = serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string));

    if status == StatusCode::CONFLICT {
        return SimError::SessionConflict(message.unwrap_or_else(|| "already active".to_string()));
    }

    SimError::remote(Some(status.as_u16()), message.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_keeps_prefix() {
        let base = normalize_base("https://practice.example.edu/v2").unwrap();
        assert_eq!(
            base.join(ATTEMPT_PATH).unwrap().as_str(),
            "https://practice.example.edu/v2/api/practice/attempt"
        );
        assert!(normalize_base("not a url").is_err());
    }

    #[test]
    fn test_conflict_maps_to_session_conflict() {
        let err = classify_failure(StatusCode::CONFLICT, br#"{"message":"session exists"}"#);
        assert!(matches!(err, SimError::SessionConflict(ref m) if m == "session exists"));

        let err = classify_failure(StatusCode::CONFLICT, b"");
        assert!(matches!(err, SimError::SessionConflict(_)));
    }

    #[test]
    fn test_failure_payload_message_is_kept() {
        let err = classify_failure(StatusCode::BAD_REQUEST, br#"{"message":"invalid option"}"#);
        assert_eq!(err.user_message(), "invalid option");

        let err = classify_failure(StatusCode::BAD_GATEWAY, b"<html>oops</html>");
        assert!(matches!(err, SimError::Remote { status: Some(502), message: None }));
    }
}
