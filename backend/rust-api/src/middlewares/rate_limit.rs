use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::handlers::ApiError;
use crate::metrics::RATE_LIMITED_TOTAL;
use crate::services::AppState;

const GENERATE_WINDOW_SECONDS: u64 = 60;
const DEFAULT_WINDOW_SECONDS: u64 = 3600;

/// Client address a limit is keyed on. The socket peer is used unless
/// `trust_proxy_headers` is set, since any client can send forwarding headers.
fn extract_client_ip_from(
    headers: &HeaderMap,
    extensions: &axum::http::Extensions,
    trust_proxy_headers: bool,
) -> String {
    if trust_proxy_headers {
        if let Some(ip) = forwarded_client_ip(headers) {
            return ip;
        }
    }

    if let Some(ci) = extensions.get::<ConnectInfo<SocketAddr>>() {
        return ci.0.ip().to_string();
    }

    "unknown".to_string()
}

// Preferred order: X-Forwarded-For, Forwarded, X-Real-IP
fn forwarded_client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(v) = headers.get("x-forwarded-for") {
        if let Ok(s) = v.to_str() {
            // first hop is the client
            return Some(s.split(',').next().unwrap_or(s).trim().to_string());
        }
    }

    if let Some(v) = headers.get("forwarded") {
        if let Ok(s) = v.to_str() {
            for part in s.split(';') {
                let p = part.trim();
                if let Some(val) = p.strip_prefix("for=") {
                    return Some(val.trim().trim_matches('"').to_string());
                }
            }
        }
    }

    if let Some(v) = headers.get("x-real-ip") {
        if let Ok(s) = v.to_str() {
            return Some(s.trim().to_string());
        }
    }

    None
}

/// Tight per-IP budget for the expensive quiz generation endpoint.
pub async fn generation_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let limit = state.config.rate_limit.generate_per_minute;
    enforce(
        &state,
        request,
        next,
        "generate",
        limit,
        GENERATE_WINDOW_SECONDS,
    )
    .await
}

/// Hourly per-IP budget shared by the remaining session routes.
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let limit = state.config.rate_limit.default_per_hour;
    enforce(&state, request, next, "ip", limit, DEFAULT_WINDOW_SECONDS).await
}

async fn enforce(
    state: &AppState,
    request: Request,
    next: Next,
    scope: &str,
    limit: u32,
    window_seconds: u64,
) -> Response {
    if !state.config.rate_limit.enabled {
        return next.run(request).await;
    }

    let client_ip = extract_client_ip_from(
        request.headers(),
        request.extensions(),
        state.config.rate_limit.trust_proxy_headers,
    );
    let key = format!("ratelimit:{}:{}", scope, client_ip);

    let allowed = match state
        .store
        .check_rate_limit(&key, limit, window_seconds)
        .await
    {
        Ok(allowed) => allowed,
        Err(e) => {
            tracing::error!("Rate limit check failed: {}", e);
            return ApiError::Internal("Rate limit check failed".to_string()).into_response();
        }
    };

    if !allowed {
        tracing::warn!("Rate limit '{}' exceeded for IP: {}", scope, client_ip);
        RATE_LIMITED_TOTAL.with_label_values(&[scope]).inc();
        return ApiError::TooManyRequests(format!(
            "Rate limit exceeded: {} requests per {} seconds",
            limit, window_seconds
        ))
        .into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::ConnectInfo;
    use axum::http::HeaderMap;
    use std::net::SocketAddr;

    fn peer(addr: &str) -> axum::http::Extensions {
        let mut exts = axum::http::Extensions::new();
        exts.insert(ConnectInfo::<SocketAddr>(addr.parse().unwrap()));
        exts
    }

    #[test]
    fn test_extract_client_ip_x_forwarded_for_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "1.2.3.4, 10.0.0.1".parse().unwrap());
        let exts = peer("10.0.0.1:443");
        assert_eq!(extract_client_ip_from(&headers, &exts, true), "1.2.3.4");
    }

    #[test]
    fn test_extract_client_ip_forwarded() {
        let mut headers = HeaderMap::new();
        headers.insert("forwarded", "for=\"5.6.7.8\";proto=http".parse().unwrap());
        let exts = axum::http::Extensions::new();
        assert_eq!(extract_client_ip_from(&headers, &exts, true), "5.6.7.8");
    }

    #[test]
    fn test_extract_client_ip_x_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", " 9.9.9.9 ".parse().unwrap());
        let exts = axum::http::Extensions::new();
        assert_eq!(extract_client_ip_from(&headers, &exts, true), "9.9.9.9");
    }

    #[test]
    fn test_extract_client_ip_ignores_forwarding_headers_by_default() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "1.2.3.4".parse().unwrap());
        headers.insert("forwarded", "for=5.6.7.8".parse().unwrap());
        headers.insert("x-real-ip", "9.9.9.9".parse().unwrap());
        let exts = peer("7.7.7.7:1234");
        assert_eq!(extract_client_ip_from(&headers, &exts, false), "7.7.7.7");
    }

    #[test]
    fn test_extract_client_ip_trusted_falls_back_to_connectinfo() {
        let headers = HeaderMap::new();
        let exts = peer("7.7.7.7:1234");
        assert_eq!(extract_client_ip_from(&headers, &exts, true), "7.7.7.7");
    }

    #[test]
    fn test_extract_client_ip_unknown_without_any_source() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "1.2.3.4".parse().unwrap());
        let exts = axum::http::Extensions::new();
        assert_eq!(extract_client_ip_from(&headers, &exts, false), "unknown");
    }
}
