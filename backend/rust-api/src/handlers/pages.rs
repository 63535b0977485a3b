use axum::{extract::State, response::Html, Extension};
use std::sync::Arc;

use super::{load_session, ApiError};
use crate::middlewares::session::SessionId;
use crate::services::AppState;

const INDEX_HTML: &str = include_str!("../../static/index.html");
const LANG_PLACEHOLDER: &str = "{{lang}}";

/// GET / - the quiz page, tagged with the session's language
pub async fn home(
    State(state): State<Arc<AppState>>,
    Extension(session_id): Extension<SessionId>,
) -> Result<Html<String>, ApiError> {
    let session = load_session(&state, &session_id).await?;
    Ok(Html(render_index(session.language())))
}

fn render_index(language: &str) -> String {
    INDEX_HTML.replace(LANG_PLACEHOLDER, &escape_attribute(language))
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
