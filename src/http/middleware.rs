//! Per-client admission control in front of every route.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use super::response::RETRY_AFTER_HEADER;
use super::state::AppState;
use crate::admission::Admission;

/// Key used when the peer address is not known.
const UNKNOWN_CLIENT: &str = "unknown";

/// Spend one token from the caller's bucket before running the request.
///
/// Exempt paths pass straight through. An exhausted bucket answers 429 with
/// the wait time in [`RETRY_AFTER_HEADER`]; a store failure answers 503.
pub async fn admission_control(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if !state.admission_enabled {
        return next.run(request).await;
    }

    let client = client_key(&request, state.server.trust_forwarded_for);
    let path = request.uri().path().to_string();

    match state.admission.admit(&client, &path).await {
        Admission::Bypassed | Admission::Allowed { .. } => next.run(request).await,
        Admission::Limited { retry_after_secs } => {
            warn!(
                client = %client,
                path = %path,
                retry_after_secs = retry_after_secs,
                "Rate limit exceeded"
            );
            let mut response = (StatusCode::TOO_MANY_REQUESTS, "Too many requests").into_response();
            response
                .headers_mut()
                .insert(RETRY_AFTER_HEADER, HeaderValue::from(retry_after_secs));
            response
        }
        Admission::Unavailable => {
            debug!(client = %client, path = %path, "Admission unavailable, rejecting");
            (StatusCode::SERVICE_UNAVAILABLE, "Service temporarily unavailable").into_response()
        }
    }
}

/// Identify the caller: the first `X-Forwarded-For` hop when trusted,
/// otherwise the peer IP.
fn client_key(request: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        if let Some(ip) = forwarded_for(request.headers()) {
            return ip;
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    let first = headers
        .get("X-Forwarded-For")?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim();
    (!first.is_empty()).then(|| first.to_string())
}
