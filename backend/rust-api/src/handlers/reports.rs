use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Extension,
};
use std::sync::Arc;

use super::{load_session, ApiError};
use crate::metrics::REPORTS_RENDERED_TOTAL;
use crate::middlewares::session::SessionId;
use crate::services::report_pdf::{render_pdf, QuizReport};
use crate::services::scorecard::{render_scorecard, Scorecard};
use crate::services::AppState;

pub const PDF_FILENAME: &str = "quiz_results_watermarked.pdf";

/// GET /download_pdf - watermarked results document for the session's quiz
pub async fn download_pdf(
    State(state): State<Arc<AppState>>,
    Extension(session_id): Extension<SessionId>,
) -> Result<Response, ApiError> {
    let session = load_session(&state, &session_id).await.inspect_err(|_| {
        REPORTS_RENDERED_TOTAL.with_label_values(&["pdf", "error"]).inc();
    })?;

    let bytes = render_pdf(
        &QuizReport::from_session(&session),
        &state.config.report.watermark_text,
        &state.pdf_fonts,
    );
    REPORTS_RENDERED_TOTAL.with_label_values(&["pdf", "success"]).inc();
    tracing::debug!("Rendered results PDF ({} bytes)", bytes.len());

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", PDF_FILENAME),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// GET /scorecard.png - shareable score image
pub async fn scorecard_png(
    State(state): State<Arc<AppState>>,
    Extension(session_id): Extension<SessionId>,
) -> Result<Response, ApiError> {
    let session = load_session(&state, &session_id).await.inspect_err(|_| {
        REPORTS_RENDERED_TOTAL.with_label_values(&["png", "error"]).inc();
    })?;

    let card = Scorecard::from_session(&session);
    let bytes = render_scorecard(&card, &state.fonts, &state.config.report).map_err(|e| {
        tracing::error!("Failed to encode scorecard PNG: {}", e);
        REPORTS_RENDERED_TOTAL.with_label_values(&["png", "error"]).inc();
        ApiError::Internal("Failed to render scorecard".to_string())
    })?;
    REPORTS_RENDERED_TOTAL.with_label_values(&["png", "success"]).inc();

    Ok((
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CONTENT_DISPOSITION, "inline; filename=\"scorecard.png\""),
        ],
        bytes,
    )
        .into_response())
}
