use axum::{extract::State, Extension, Json};
use std::sync::Arc;
use validator::Validate;

use super::{load_session, ApiError};
use crate::extractors::AppJson;
use crate::metrics::{QUIZ_GENERATIONS_TOTAL, QUIZ_SUBMISSIONS_TOTAL};
use crate::middlewares::session::SessionId;
use crate::models::{
    GenerateQuizRequest, GenerateQuizResponse, SetLanguageRequest, SetLanguageResponse,
    SubmitQuizRequest, SubmitQuizResponse,
};
use crate::services::grader::grade;
use crate::services::quiz_generator::{QuizGenerator, QuizRequest};
use crate::services::AppState;

/// POST /ask-gemini - generate a quiz and make it the session's active quiz
pub async fn ask_gemini(
    State(state): State<Arc<AppState>>,
    Extension(session_id): Extension<SessionId>,
    AppJson(req): AppJson<GenerateQuizRequest>,
) -> Result<Json<GenerateQuizResponse>, ApiError> {
    req.validate()
        .map_err(|e| ApiError::bad_request(format!("Validation error: {}", e)))?;

    let max_questions = state.config.generation.max_questions;
    if req.num_questions > max_questions {
        return Err(ApiError::bad_request(format!(
            "num_questions must be between 1 and {}",
            max_questions
        )));
    }

    let topic = req.topic.trim();
    if topic.is_empty() {
        return Err(ApiError::bad_request("topic must not be blank"));
    }

    // held for the whole generation so quiz and answer key are swapped together
    let _guard = state.session_locks.acquire(session_id.as_str()).await;
    let mut session = load_session(&state, &session_id).await?;

    let language = session.language().to_string();
    let request = QuizRequest {
        topic,
        difficulty: req.difficulty,
        language: &language,
        num_questions: req.num_questions as usize,
    };

    tracing::info!(
        "Generating {} {} questions on '{}' in '{}'",
        request.num_questions,
        request.difficulty,
        topic,
        language
    );

    let generated = QuizGenerator::new(state.generator.as_ref(), &state.config.generation)
        .generate(&request)
        .await;

    if generated.questions.is_empty() {
        if let Some(e) = &generated.last_error {
            tracing::error!("Quiz generation failed for topic '{}': {}", topic, e);
            QUIZ_GENERATIONS_TOTAL.with_label_values(&["failed"]).inc();
            return Err(ApiError::BadGateway(format!(
                "Quiz generation failed: {}",
                e
            )));
        }
    }

    let outcome = if generated.is_complete(request.num_questions) {
        "complete"
    } else {
        tracing::warn!(
            "Returning partial quiz: {}/{} questions after {} failed batches",
            generated.questions.len(),
            request.num_questions,
            generated.failed_batches
        );
        "partial"
    };
    QUIZ_GENERATIONS_TOTAL.with_label_values(&[outcome]).inc();

    let quiz = generated.questions;
    session.replace_quiz(
        topic.to_string(),
        req.difficulty,
        req.num_questions,
        quiz.clone(),
        generated.answers,
    );
    state.store.save(session_id.as_str(), &session).await?;

    Ok(Json(GenerateQuizResponse { quiz }))
}

/// POST /submit-quiz - grade the submitted letters against the stored key
pub async fn submit_quiz(
    State(state): State<Arc<AppState>>,
    Extension(session_id): Extension<SessionId>,
    AppJson(req): AppJson<SubmitQuizRequest>,
) -> Result<Json<SubmitQuizResponse>, ApiError> {
    let _guard = state.session_locks.acquire(session_id.as_str()).await;

    let result = async {
        let mut session = load_session(&state, &session_id).await?;
        let report = grade(&req.answers, &session.answers, &session.quiz);

        session.record_submission(report.user_answers, report.score);
        state.store.save(session_id.as_str(), &session).await?;

        Ok::<_, ApiError>(SubmitQuizResponse {
            score: report.score,
            total: report.total,
            feedback: report.feedback,
            topic: session.topic_label().to_string(),
            difficulty: session.difficulty_label().to_string(),
        })
    }
    .await;

    match result {
        Ok(response) => {
            QUIZ_SUBMISSIONS_TOTAL.with_label_values(&["success"]).inc();
            tracing::info!("Quiz graded: {}/{}", response.score, response.total);
            Ok(Json(response))
        }
        Err(e) => {
            QUIZ_SUBMISSIONS_TOTAL.with_label_values(&["error"]).inc();
            Err(e)
        }
    }
}

/// POST /set-language - store the preferred quiz language
pub async fn set_language(
    State(state): State<Arc<AppState>>,
    Extension(session_id): Extension<SessionId>,
    AppJson(req): AppJson<SetLanguageRequest>,
) -> Result<Json<SetLanguageResponse>, ApiError> {
    req.validate()
        .map_err(|e| ApiError::bad_request(format!("Validation error: {}", e)))?;

    let language = req.language.trim().to_string();
    if language.is_empty() {
        return Err(ApiError::bad_request("language must not be blank"));
    }

    let _guard = state.session_locks.acquire(session_id.as_str()).await;
    let mut session = load_session(&state, &session_id).await?;
    session.language = Some(language.clone());
    state.store.save(session_id.as_str(), &session).await?;

    tracing::debug!("Session language set to '{}'", language);

    Ok(Json(SetLanguageResponse {
        status: "ok".to_string(),
        language,
    }))
}
