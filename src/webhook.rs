//! Webhook verification and event classification.
//!
//! Deliveries are authenticated with HMAC-SHA256 over the shared secret
//! (`X-Hub-Signature-256`, `sha256=<hex>`) before any payload parsing.
//! Verified payloads are classified into a typed [`WebhookEvent`] that the
//! HTTP handler matches exhaustively.

use axum::http::HeaderMap;
use serde::Deserialize;

// For signature verification
use hmac::{Hmac, Mac};
use sha2::Sha256;
type HmacSha256 = Hmac<Sha256>;

pub const HEADER_EVENT: &str = "X-GitHub-Event";
pub const HEADER_SIGNATURE: &str = "X-Hub-Signature-256";

/// Event types this service parses. Anything else is rejected at the
/// boundary so upstream knows the delivery was not understood.
const ACCEPTED_EVENTS: [&str; 2] = ["ping", "pull_request"];

/// Why an inbound delivery was refused before any work happened.
#[derive(Debug, thiserror::Error)]
pub enum WebhookRejection {
    #[error("missing X-Hub-Signature-256 header")]
    MissingSignature,

    #[error("signature verification failed")]
    SignatureMismatch,

    #[error("missing X-GitHub-Event header")]
    MissingEventType,

    #[error("unsupported event type '{0}'")]
    UnsupportedEventType(String),

    #[error("could not parse payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// A verified, classified webhook delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    Ping,
    PullRequest(PullRequestEvent),
    /// Accepted but nothing to do for it. Acknowledged with "ok" so the
    /// sender does not retry the delivery.
    Unsupported,
}

/// The fields of a pull request delivery that drive the deployment
/// decision.
#[derive(Debug, Clone, PartialEq)]
pub struct PullRequestEvent {
    pub action: String,
    pub merged: bool,
    pub base_ref: String,
    pub default_branch: String,
    pub repo_name: String,
    pub clone_url: String,
}

impl PullRequestEvent {
    /// A pull request triggers a deployment only when it was closed by
    /// merging into the repository's default branch. Closed-without-merge
    /// (abandoned PRs) and merges into feature branches do not count.
    pub fn is_qualifying_merge(&self) -> bool {
        self.action == "closed" && self.merged && self.base_ref == self.default_branch
    }
}

// Raw payload structures matching GitHub's webhook JSON shape. Only the
// fields the qualifier and synchronizer need are deserialized.

#[derive(Debug, Deserialize)]
struct RawPullRequestPayload {
    action: String,
    pull_request: RawPullRequest,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawPullRequest {
    #[serde(default)]
    merged: bool,
    base: RawBranchRef,
}

#[derive(Debug, Deserialize)]
struct RawBranchRef {
    #[serde(rename = "ref")]
    git_ref: String,
}

#[derive(Debug, Deserialize)]
struct RawRepository {
    name: String,
    default_branch: String,
    clone_url: String,
}

/// Verifies a delivery's signature and classifies its payload.
///
/// Checks run in order: event-type header present and accepted, signature
/// header present, HMAC valid, payload parseable. The first failure wins
/// and nothing past it executes.
pub fn verify_and_classify(
    secret: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<WebhookEvent, WebhookRejection> {
    let event_type = headers
        .get(HEADER_EVENT)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookRejection::MissingEventType)?;

    if !ACCEPTED_EVENTS.contains(&event_type) {
        return Err(WebhookRejection::UnsupportedEventType(
            event_type.to_string(),
        ));
    }

    let signature = headers
        .get(HEADER_SIGNATURE)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookRejection::MissingSignature)?;

    if !verify_webhook_signature(secret, body, signature) {
        return Err(WebhookRejection::SignatureMismatch);
    }

    match event_type {
        "ping" => {
            // The ping payload carries nothing we act on, but a delivery
            // that is not valid JSON is still refused.
            let _: serde_json::Value = serde_json::from_slice(body)?;
            Ok(WebhookEvent::Ping)
        }
        "pull_request" => {
            let raw: RawPullRequestPayload = serde_json::from_slice(body)?;
            Ok(WebhookEvent::PullRequest(PullRequestEvent {
                action: raw.action,
                merged: raw.pull_request.merged,
                base_ref: raw.pull_request.base.git_ref,
                default_branch: raw.repository.default_branch,
                repo_name: raw.repository.name,
                clone_url: raw.repository.clone_url,
            }))
        }
        _ => Ok(WebhookEvent::Unsupported),
    }
}

/// Helper function for verifying a GitHub webhook signature.
/// Expected header format: "sha256=<hex>". Malformed headers fail
/// verification rather than panic.
pub fn verify_webhook_signature(secret: &str, payload: &[u8], signature_header: &str) -> bool {
    let Some(hex_signature) = signature_header.strip_prefix("sha256=") else {
        return false;
    };

    let signature_bytes = match hex::decode(hex_signature) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(payload);

    // Constant-time comparison
    mac.verify_slice(&signature_bytes).is_ok()
}

/// Computes the HMAC-SHA256 signature of a payload. Useful for generating
/// expected signatures in tests.
pub fn compute_signature(secret: &str, payload: &[u8]) -> Vec<u8> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Formats a signature the way GitHub sends it: "sha256=<hex>".
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("sha256={}", hex::encode(signature))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "test-secret";

    fn signed_headers(event: &str, body: &[u8]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_EVENT, HeaderValue::from_str(event).unwrap());
        let signature = format_signature_header(&compute_signature(SECRET, body));
        headers.insert(HEADER_SIGNATURE, HeaderValue::from_str(&signature).unwrap());
        headers
    }

    fn pull_request_body(
        action: &str,
        merged: bool,
        base_ref: &str,
        default_branch: &str,
    ) -> Vec<u8> {
        serde_json::json!({
            "action": action,
            "pull_request": {
                "merged": merged,
                "base": { "ref": base_ref }
            },
            "repository": {
                "name": "server",
                "default_branch": default_branch,
                "clone_url": "https://example.com/org/server.git"
            }
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn verify_accepts_valid_signature() {
        let payload = b"payload bytes";
        let header = format_signature_header(&compute_signature(SECRET, payload));
        assert!(verify_webhook_signature(SECRET, payload, &header));
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let payload = b"payload bytes";
        let header = format_signature_header(&compute_signature("other-secret", payload));
        assert!(!verify_webhook_signature(SECRET, payload, &header));
    }

    #[test]
    fn verify_rejects_modified_payload() {
        let header = format_signature_header(&compute_signature(SECRET, b"original"));
        assert!(!verify_webhook_signature(SECRET, b"tampered", &header));
    }

    #[test]
    fn verify_rejects_malformed_headers() {
        let payload = b"payload";
        assert!(!verify_webhook_signature(SECRET, payload, ""));
        assert!(!verify_webhook_signature(SECRET, payload, "sha256="));
        assert!(!verify_webhook_signature(SECRET, payload, "sha256=zzzz"));
        assert!(!verify_webhook_signature(SECRET, payload, "sha1=abcd12"));
        assert!(!verify_webhook_signature(SECRET, payload, "abcd12"));
    }

    #[test]
    fn classify_ping() {
        let body = br#"{"zen": "Keep it logically awesome."}"#;
        let headers = signed_headers("ping", body);
        let event = verify_and_classify(SECRET, &headers, body).unwrap();
        assert_eq!(event, WebhookEvent::Ping);
    }

    #[test]
    fn classify_pull_request() {
        let body = pull_request_body("closed", true, "master", "master");
        let headers = signed_headers("pull_request", &body);
        let event = verify_and_classify(SECRET, &headers, &body).unwrap();
        match event {
            WebhookEvent::PullRequest(pr) => {
                assert_eq!(pr.action, "closed");
                assert!(pr.merged);
                assert_eq!(pr.base_ref, "master");
                assert_eq!(pr.default_branch, "master");
                assert_eq!(pr.repo_name, "server");
                assert_eq!(pr.clone_url, "https://example.com/org/server.git");
            }
            other => panic!("expected pull request event, got {:?}", other),
        }
    }

    #[test]
    fn rejects_missing_event_header() {
        let body = b"{}";
        let mut headers = HeaderMap::new();
        let signature = format_signature_header(&compute_signature(SECRET, body));
        headers.insert(HEADER_SIGNATURE, HeaderValue::from_str(&signature).unwrap());

        let err = verify_and_classify(SECRET, &headers, body).unwrap_err();
        assert!(matches!(err, WebhookRejection::MissingEventType));
    }

    #[test]
    fn rejects_event_outside_accepted_set() {
        let body = b"{}";
        let headers = signed_headers("push", body);
        let err = verify_and_classify(SECRET, &headers, body).unwrap_err();
        assert!(matches!(err, WebhookRejection::UnsupportedEventType(_)));
    }

    #[test]
    fn rejects_missing_signature() {
        let body = b"{}";
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_EVENT, HeaderValue::from_static("ping"));

        let err = verify_and_classify(SECRET, &headers, body).unwrap_err();
        assert!(matches!(err, WebhookRejection::MissingSignature));
    }

    #[test]
    fn rejects_bad_signature_before_parsing() {
        // Body is not even JSON; the signature check must fail first.
        let body = b"not json";
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_EVENT, HeaderValue::from_static("ping"));
        headers.insert(HEADER_SIGNATURE, HeaderValue::from_static("sha256=00"));

        let err = verify_and_classify(SECRET, &headers, body).unwrap_err();
        assert!(matches!(err, WebhookRejection::SignatureMismatch));
    }

    #[test]
    fn rejects_unparseable_payload() {
        let body = b"not json";
        let headers = signed_headers("pull_request", body);
        let err = verify_and_classify(SECRET, &headers, body).unwrap_err();
        assert!(matches!(err, WebhookRejection::InvalidPayload(_)));
    }

    #[test]
    fn qualifier_requires_all_three_conditions() {
        let event = |action: &str, merged, base_ref: &str| PullRequestEvent {
            action: action.to_string(),
            merged,
            base_ref: base_ref.to_string(),
            default_branch: "master".to_string(),
            repo_name: "web".to_string(),
            clone_url: "https://example.com/org/web.git".to_string(),
        };

        assert!(event("closed", true, "master").is_qualifying_merge());

        // Closed without merging (abandoned PR)
        assert!(!event("closed", false, "master").is_qualifying_merge());
        // Merge into a non-default branch
        assert!(!event("closed", true, "develop").is_qualifying_merge());
        // Not closed at all
        assert!(!event("opened", true, "master").is_qualifying_merge());
        assert!(!event("opened", false, "master").is_qualifying_merge());
        assert!(!event("synchronize", false, "develop").is_qualifying_merge());
    }
}
