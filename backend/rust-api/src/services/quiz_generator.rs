use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::config::GenerationConfig;
use crate::metrics::{QUESTIONS_GENERATED_TOTAL, QUIZ_BATCHES_TOTAL};
use crate::models::{Difficulty, OptionLabel, Question};
use crate::services::generation_client::{GenerationClient, GenerationError};

lazy_static! {
    static ref CODE_FENCE: Regex = Regex::new(r"```(?:json)?").expect("valid fence regex");
}

/// Parameters of one quiz generation request.
#[derive(Debug, Clone)]
pub struct QuizRequest<'a> {
    pub topic: &'a str,
    pub difficulty: Difficulty,
    pub language: &'a str,
    pub num_questions: usize,
}

#[derive(Debug, Default)]
pub struct GeneratedQuiz {
    pub questions: Vec<Question>,
    pub answers: Vec<OptionLabel>,
    pub failed_batches: usize,
    /// Last transport/API failure, kept so callers can report an outright
    /// outage instead of an empty quiz.
    pub last_error: Option<GenerationError>,
}

impl GeneratedQuiz {
    pub fn is_complete(&self, requested: usize) -> bool {
        self.questions.len() == requested
    }
}

#[derive(Debug, Deserialize)]
struct RawItem {
    question: String,
    options: Vec<String>,
    answer: String,
}

pub struct QuizGenerator<'a> {
    client: &'a dyn GenerationClient,
    batch_size: usize,
    max_failed_batches: usize,
}

impl<'a> QuizGenerator<'a> {
    pub fn new(client: &'a dyn GenerationClient, config: &GenerationConfig) -> Self {
        Self {
            client,
            batch_size: config.batch_size.max(1),
            max_failed_batches: config.max_failed_batches.max(1),
        }
    }

    /// Fills the quiz batch by batch. Every round either adds at least one
    /// question or counts as a failed batch, so the loop always terminates.
    pub async fn generate(&self, request: &QuizRequest<'_>) -> GeneratedQuiz {
        let target = request.num_questions;
        let mut result = GeneratedQuiz::default();

        while result.questions.len() < target {
            if result.failed_batches >= self.max_failed_batches {
                tracing::warn!(
                    "Giving up after {} failed batches: {}/{} questions for topic '{}'",
                    result.failed_batches,
                    result.questions.len(),
                    target,
                    request.topic
                );
                break;
            }

            let remaining = target - result.questions.len();
            let count = remaining.min(self.batch_size);
            let prompt = build_prompt(request, count);

            let raw = match self.client.generate(&prompt).await {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!("Generation call failed: {}", e);
                    QUIZ_BATCHES_TOTAL.with_label_values(&["error"]).inc();
                    result.failed_batches += 1;
                    result.last_error = Some(e);
                    continue;
                }
            };

            let items = match parse_batch(&raw) {
                Ok(items) => items,
                Err(e) => {
                    tracing::warn!("Batch JSON parsing failed ({}), raw response was: {}", e, raw);
                    QUIZ_BATCHES_TOTAL.with_label_values(&["parse_error"]).inc();
                    result.failed_batches += 1;
                    continue;
                }
            };

            if items.is_empty() {
                tracing::warn!("Batch contained no usable questions");
                QUIZ_BATCHES_TOTAL.with_label_values(&["empty"]).inc();
                result.failed_batches += 1;
                continue;
            }

            QUIZ_BATCHES_TOTAL.with_label_values(&["success"]).inc();
            tracing::debug!("Batch returned {} of {} requested questions", items.len(), count);

            for (question, answer) in items {
                result.questions.push(question);
                result.answers.push(answer);
            }
        }

        // keep only the requested amount in case the model overshot
        result.questions.truncate(target);
        result.answers.truncate(target);
        QUESTIONS_GENERATED_TOTAL.inc_by(result.questions.len() as u64);

        result
    }
}

pub fn build_prompt(request: &QuizRequest<'_>, count: usize) -> String {
    format!(
        r#"Generate exactly {count} multiple-choice questions on the topic "{topic}".
Difficulty: {difficulty}. The quiz must be strictly in language {language}.
Each question must have 4 options labeled A-D, and the correct answer in a separate field.

Respond strictly in this JSON format:
[
  {{
    "question": "...",
    "options": ["A. ...", "B. ...", "C. ...", "D. ..."],
    "answer": "B"
  }}
]"#,
        count = count,
        topic = request.topic,
        difficulty = request.difficulty,
        language = request.language,
    )
}

pub fn strip_code_fences(raw: &str) -> String {
    CODE_FENCE.replace_all(raw.trim(), "").trim().to_string()
}

/// Parses one model response. A response that is not a JSON array fails as a
/// whole; inside the array each malformed item is skipped on its own.
pub fn parse_batch(raw: &str) -> Result<Vec<(Question, OptionLabel)>, serde_json::Error> {
    let cleaned = strip_code_fences(raw);
    let values: Vec<serde_json::Value> = serde_json::from_str(&cleaned)?;

    let mut items = Vec::with_capacity(values.len());
    for (idx, value) in values.into_iter().enumerate() {
        match sanitize_item(value) {
            Some(item) => items.push(item),
            None => tracing::warn!("Dropping malformed question at batch index {}", idx),
        }
    }
    Ok(items)
}

fn sanitize_item(value: serde_json::Value) -> Option<(Question, OptionLabel)> {
    let raw: RawItem = serde_json::from_value(value).ok()?;

    let question = raw.question.trim().to_string();
    if question.is_empty() || raw.options.len() != OptionLabel::ALL.len() {
        return None;
    }

    let answer = OptionLabel::from_answer(&raw.answer)?;
    let options = raw
        .options
        .iter()
        .map(|opt| opt.trim().to_string())
        .collect();

    Some((Question { question, options }, answer))
}
