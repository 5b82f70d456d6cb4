//! Core auth primitives: the dynamic parameter map and the error taxonomy.

use serde_json::{Value, json};
use thiserror::Error;

use super::http_client::{HttpClientError, HttpResponse};

/// Free-form JSON object used for redirect params, token responses and user data.
pub type Params = serde_json::Map<String, Value>;

/// Every failure the auth core can surface to its caller.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid or missing configuration.
    #[error("{0}")]
    Config(String),
    /// `authenticate` was asked for a provider that is not configured.
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
    /// The backend answered with a status outside 200..=399.
    #[error("HTTP request failed with status {}", .0.status)]
    Http(HttpResponse),
    /// The transport could not complete the request at all.
    #[error("transport error: {0}")]
    Transport(HttpClientError),
    /// The provider redirected back with an `error` parameter.
    #[error("provider returned error: {error}")]
    Provider { error: Value },
    #[error("OAuth 2.0 state parameter mismatch.")]
    StateMismatch,
    #[error("OAuth 2.0 Nonce parameter mismatch.")]
    NonceMismatch,
    #[error("Provider Popup Blocked")]
    PopupBlocked,
    #[error("Provider Popup was closed")]
    PopupClosed,
    #[error("Problem poll popup")]
    PopupProblem,
    #[error("Authorization Failed")]
    AuthorizationFailed,
    /// The application router refused a navigation.
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl AuthError {
    /// Maps the error to the `{error: ...}` / `{data: ...}` descriptor handed to callers.
    ///
    /// A provider `error` parameter is passed through as `{error}`; popup and
    /// handshake failures carry their message as `{data}`.
    pub fn descriptor(&self) -> Value {
        match self {
            AuthError::Provider { error } => json!({ "error": error }),
            AuthError::StateMismatch
            | AuthError::NonceMismatch
            | AuthError::PopupBlocked
            | AuthError::PopupClosed
            | AuthError::PopupProblem
            | AuthError::AuthorizationFailed => json!({ "data": self.to_string() }),
            AuthError::Http(response) => json!({
                "error": "http_error",
                "status": response.status,
                "data": response.body_json().unwrap_or(Value::Null),
            }),
            other => json!({ "error": other.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptors_follow_failure_kind() {
        assert_eq!(
            AuthError::Provider { error: json!("access_denied") }.descriptor(),
            json!({ "error": "access_denied" })
        );
        assert_eq!(
            AuthError::StateMismatch.descriptor(),
            json!({ "data": "OAuth 2.0 state parameter mismatch." })
        );
        assert_eq!(
            AuthError::PopupBlocked.descriptor(),
            json!({ "data": "Provider Popup Blocked" })
        );
        assert_eq!(
            AuthError::UnknownProvider("nope".into()).descriptor(),
            json!({ "error": "Unknown provider: nope" })
        );
    }

    #[test]
    fn descriptor_is_a_stable_mapping() {
        let err = AuthError::NonceMismatch;
        assert_eq!(err.descriptor(), err.descriptor());
        assert_eq!(err.to_string(), "OAuth 2.0 Nonce parameter mismatch.");
    }

    #[test]
    fn http_descriptor_carries_status_and_body() {
        let response = HttpResponse::with_json(401, &json!({ "message": "nope" }));
        let descriptor = AuthError::Http(response).descriptor();
        assert_eq!(descriptor["status"], 401);
        assert_eq!(descriptor["data"]["message"], "nope");
    }
}
