//! HTTP boundary: one POST route for webhook deliveries.

use axum::{
    Router,
    body::Bytes,
    extract::State as AxumState,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing,
};
use tracing::{info, warn};

use crate::SharedState;
use crate::webhook::{WebhookEvent, verify_and_classify};

/// Handles a webhook delivery: verify, classify, and either acknowledge or
/// launch a deployment. Everything accepted is answered 200 with a short
/// plain-text body; rejections get 400 and the reason.
pub async fn handle_webhook(
    AxumState(state): AxumState<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let event = match verify_and_classify(state.config.secret(), &headers, &body) {
        Ok(event) => event,
        Err(rejection) => {
            warn!("Rejected webhook delivery: {}", rejection);
            return (StatusCode::BAD_REQUEST, rejection.to_string()).into_response();
        }
    };

    match event {
        WebhookEvent::Ping => "pong".into_response(),

        WebhookEvent::PullRequest(pr) if pr.is_qualifying_merge() => {
            // Launch the deployment and respond right away; the outcome is
            // only observable through logs. Whether the repository maps to
            // a known project is decided inside the run.
            state.deployer.submit(pr);
            "merged".into_response()
        }

        WebhookEvent::PullRequest(pr) => {
            info!(
                "Ignoring pull request event: action '{}', merged {}, base '{}'",
                pr.action, pr.merged, pr.base_ref
            );
            "ok".into_response()
        }

        WebhookEvent::Unsupported => "ok".into_response(),
    }
}

/// Builds the application router. Only POST is routed, so other methods
/// are refused without reaching the handler.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", routing::post(handle_webhook))
        .with_state(state)
}
