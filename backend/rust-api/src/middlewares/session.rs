use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};
use std::sync::Arc;
use uuid::Uuid;

use crate::services::AppState;

/// Identifier of the caller's server-side session, resolved from the signed
/// cookie by [`session_middleware`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Resolves the signed session cookie into a [`SessionId`] extension. A
/// missing, tampered or malformed cookie starts a new session, and the new
/// cookie is attached to the response.
///
/// The cookie carries no Max-Age, so it ends when the browser closes.
pub async fn session_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let cookie_name = state.config.session.cookie_name.clone();
    let jar = SignedCookieJar::from_headers(request.headers(), state.cookie_key.clone());

    let existing = jar
        .get(&cookie_name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| Uuid::parse_str(value).is_ok());

    let (session_id, is_new) = match existing {
        Some(id) => (id, false),
        None => (Uuid::new_v4().to_string(), true),
    };

    request
        .extensions_mut()
        .insert(SessionId(session_id.clone()));

    let response = next.run(request).await;

    if !is_new {
        return response;
    }

    tracing::debug!("Issuing new session cookie");
    let cookie = Cookie::build((cookie_name, session_id))
        .path("/")
        .http_only(true)
        .secure(state.config.session.cookie_secure)
        .same_site(SameSite::Lax)
        .build();

    (jar.add(cookie), response).into_response()
}
