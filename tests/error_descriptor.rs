use serde_json::json;
use starberry_auth::{AuthError, HttpResponse};

#[test]
fn test_auth_error_descriptors() {
    let cases = vec![
        (AuthError::StateMismatch, json!({ "data": "OAuth 2.0 state parameter mismatch." })),
        (AuthError::NonceMismatch, json!({ "data": "OAuth 2.0 Nonce parameter mismatch." })),
        (AuthError::PopupBlocked, json!({ "data": "Provider Popup Blocked" })),
        (AuthError::PopupClosed, json!({ "data": "Provider Popup was closed" })),
        (AuthError::PopupProblem, json!({ "data": "Problem poll popup" })),
        (AuthError::AuthorizationFailed, json!({ "data": "Authorization Failed" })),
        (AuthError::Provider { error: json!("access_denied") }, json!({ "error": "access_denied" })),
        (
            AuthError::Config("Local Storage is disabled or unavailable.".into()),
            json!({ "error": "Local Storage is disabled or unavailable." }),
        ),
    ];

    for (err, expected) in cases {
        assert_eq!(err.descriptor(), expected, "descriptor for {:?}", err);
    }
}

#[test]
fn test_http_failure_keeps_raw_response() {
    let err = AuthError::Http(HttpResponse::new(503, "unavailable"));
    assert_eq!(err.to_string(), "HTTP request failed with status 503");
    let descriptor = err.descriptor();
    assert_eq!(descriptor["status"], 503);
    assert_eq!(descriptor["data"], serde_json::Value::Null);
}
