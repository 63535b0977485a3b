use serde::{Deserialize, Serialize};

use super::quiz::{Difficulty, OptionLabel, Question};

pub const UNKNOWN_LABEL: &str = "Unknown";
pub const DEFAULT_LANGUAGE: &str = "en";

/// Everything kept server-side for one browser session.
///
/// Every field defaults, so a session that was never written (or was written
/// by an older build) deserializes to an empty quiz rather than failing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionData {
    pub language: Option<String>,
    pub quiz: Vec<Question>,
    pub answers: Vec<OptionLabel>,
    pub topic: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub num_questions: Option<u32>,
    pub user_answers: Vec<String>,
    pub score: u32,
}

impl SessionData {
    pub fn language(&self) -> &str {
        self.language.as_deref().unwrap_or(DEFAULT_LANGUAGE)
    }

    pub fn topic_label(&self) -> &str {
        self.topic.as_deref().unwrap_or(UNKNOWN_LABEL)
    }

    pub fn difficulty_label(&self) -> &str {
        self.difficulty
            .as_ref()
            .map(Difficulty::as_str)
            .unwrap_or(UNKNOWN_LABEL)
    }

    pub fn difficulty_title(&self) -> &str {
        self.difficulty
            .as_ref()
            .map(Difficulty::title)
            .unwrap_or(UNKNOWN_LABEL)
    }

    /// Total shown on the scorecard: quiz length, else the requested count.
    pub fn display_total(&self) -> usize {
        if self.quiz.is_empty() {
            self.num_questions.unwrap_or(0) as usize
        } else {
            self.quiz.len()
        }
    }

    /// Installs a freshly generated quiz; previous answers and score no
    /// longer apply to it.
    pub fn replace_quiz(
        &mut self,
        topic: String,
        difficulty: Difficulty,
        num_questions: u32,
        quiz: Vec<Question>,
        answers: Vec<OptionLabel>,
    ) {
        self.topic = Some(topic);
        self.difficulty = Some(difficulty);
        self.num_questions = Some(num_questions);
        self.quiz = quiz;
        self.answers = answers;
        self.user_answers.clear();
        self.score = 0;
    }

    pub fn record_submission(&mut self, user_answers: Vec<String>, score: u32) {
        self.user_answers = user_answers;
        self.score = score;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_session_uses_placeholders() {
        let session = SessionData::default();
        assert_eq!(session.language(), "en");
        assert_eq!(session.topic_label(), "Unknown");
        assert_eq!(session.difficulty_title(), "Unknown");
        assert_eq!(session.display_total(), 0);
    }

    #[test]
    fn test_partial_json_deserializes() {
        let session: SessionData = serde_json::from_str(r#"{"language":"de"}"#).unwrap();
        assert_eq!(session.language(), "de");
        assert!(session.quiz.is_empty());
    }

    #[test]
    fn test_replace_quiz_resets_previous_submission() {
        let mut session = SessionData::default();
        session.record_submission(vec!["A".into()], 1);
        session.replace_quiz(
            "History".into(),
            Difficulty::Easy,
            1,
            vec![Question {
                question: "Q".into(),
                options: vec!["A. 1".into(), "B. 2".into(), "C. 3".into(), "D. 4".into()],
            }],
            vec![OptionLabel::B],
        );
        assert!(session.user_answers.is_empty());
        assert_eq!(session.score, 0);
        assert_eq!(session.difficulty_title(), "Easy");
        assert_eq!(session.display_total(), 1);
    }

    #[test]
    fn test_display_total_falls_back_to_requested_count() {
        let session = SessionData {
            num_questions: Some(7),
            ..Default::default()
        };
        assert_eq!(session.display_total(), 7);
    }
}
