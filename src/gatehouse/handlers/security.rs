//! Security handler run in front of every document.
//!
//! Flow Overview: normalize the request path, parse the `Authorization`
//! header, compute transport flags, ask the engine for a decision, count it,
//! and either pass the request on or answer with the denial.

use axum::{
    extract::{ConnectInfo, Request},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE},
        HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
    Extension,
};
use std::{net::SocketAddr, sync::Arc};
use tracing::debug;

use crate::{
    gatehouse::SecurityState,
    security::{
        basic_challenge, digest_challenge, AuthScheme, Decision,
        RequestCredentials, RequestFlags,
    },
};

/// Decode percent escapes and resolve `.`, `..` and empty segments.
///
/// `..` never climbs above the root.
pub(crate) fn normalize_path(raw: &str) -> String {
    let decoded = urlencoding::decode(raw).map_or_else(|_| raw.to_string(), |d| d.into_owned());

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split(&['/', '\\'][..]) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut path = format!("/{}", segments.join("/"));
    if decoded.ends_with('/') && !segments.is_empty() {
        path.push('/');
    }
    path
}

/// Transport facts for the request.
///
/// The listener is plain TCP, so only a trusted `X-Forwarded-Proto` can mark
/// the transport secure; an absolute-form `https://` target is client input.
/// Behind a trusted proxy the peer is the proxy, not the caller, so no
/// request counts as local.
fn request_flags(state: &SecurityState, request: &Request, creds: &RequestCredentials) -> RequestFlags {
    let local_origin = !state.trust_forwarded_proto
        && request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .is_some_and(|ConnectInfo(addr)| addr.ip().to_canonical().is_loopback());

    let secure_transport = state.trust_forwarded_proto
        && request
            .headers()
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"));

    RequestFlags {
        secure_transport,
        local_origin,
        digest_requested: creds.auth_scheme == Some(AuthScheme::Digest),
    }
}

fn deny_response(state: &SecurityState, decision: &Decision, flags: RequestFlags) -> Response {
    let (Some(status), Some(message)) = (decision.status(), decision.message()) else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut response = (status, message).into_response();
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );

    if status == StatusCode::UNAUTHORIZED {
        let nonce = (decision.set_digest_challenge() || flags.digest_requested)
            .then(|| state.engine().issue_nonce())
            .flatten();
        let challenge = match nonce {
            Some(nonce) => digest_challenge(state.realm(), &nonce),
            None => basic_challenge(state.realm()),
        };
        if let Ok(value) = HeaderValue::from_str(&challenge) {
            response.headers_mut().insert(WWW_AUTHENTICATE, value);
        }
    }

    response
}

pub async fn security(
    Extension(state): Extension<Arc<SecurityState>>,
    request: Request,
    next: Next,
) -> Response {
    let path = normalize_path(request.uri().path());

    // Absolute-form targets (proxies) are signed in full.
    let target = if request.uri().scheme().is_some() {
        request.uri().to_string()
    } else {
        request
            .uri()
            .path_and_query()
            .map_or_else(|| request.uri().path().to_string(), |pq| pq.as_str().to_string())
    };

    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let creds = RequestCredentials::from_authorization(header, request.method().as_str(), &target)
        .unwrap_or_else(|err| {
            debug!("ignoring authorization header: {err}");
            RequestCredentials::anonymous()
        });

    let flags = request_flags(&state, &request, &creds);

    let decision = state
        .engine
        .authorize(state.resolver.as_ref(), &path, &creds, flags);

    state.stats.record(&decision);

    match decision {
        Decision::Allow => next.run(request).await,
        Decision::Deny { .. } => deny_response(&state, &decision, flags),
    }
}
