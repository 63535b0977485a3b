use crate::models::quiz::normalize_answer;
use crate::models::{FeedbackEntry, OptionLabel, Question};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeReport {
    pub score: u32,
    pub total: usize,
    pub feedback: Vec<FeedbackEntry>,
    /// Normalized submitted letters, one per feedback entry; empty when unanswered.
    pub user_answers: Vec<String>,
}

/// Position-aligned grading of submitted letters against the answer key.
///
/// Feedback covers `max(submitted, key)` indices: a missing key yields an
/// empty `correct_answer`, a missing submission an empty `user_answer`, and
/// neither can ever match.
pub fn grade(submitted: &[Option<String>], key: &[OptionLabel], quiz: &[Question]) -> GradeReport {
    let len = submitted.len().max(key.len());
    let mut score = 0;
    let mut feedback = Vec::with_capacity(len);
    let mut user_answers = Vec::with_capacity(len);

    for idx in 0..len {
        let user_answer = submitted
            .get(idx)
            .and_then(|answer| answer.as_deref())
            .map(normalize_answer)
            .unwrap_or_default();
        let correct_answer = key
            .get(idx)
            .map(|label| label.as_str().to_string())
            .unwrap_or_default();
        let is_correct = !correct_answer.is_empty() && user_answer == correct_answer;
        if is_correct {
            score += 1;
        }

        feedback.push(FeedbackEntry {
            question_number: idx + 1,
            question: quiz
                .get(idx)
                .map(|q| q.question.clone())
                .unwrap_or_default(),
            user_answer: user_answer.clone(),
            correct_answer,
            is_correct,
        });
        user_answers.push(user_answer);
    }

    GradeReport {
        score,
        total: key.len(),
        feedback,
        user_answers,
    }
}
