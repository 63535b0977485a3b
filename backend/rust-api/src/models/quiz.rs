use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

/// Fixed option labels of a four-option question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionLabel {
    A,
    B,
    C,
    D,
}

impl OptionLabel {
    pub const ALL: [OptionLabel; 4] = [OptionLabel::A, OptionLabel::B, OptionLabel::C, OptionLabel::D];

    pub fn as_str(&self) -> &'static str {
        match self {
            OptionLabel::A => "A",
            OptionLabel::B => "B",
            OptionLabel::C => "C",
            OptionLabel::D => "D",
        }
    }

    /// Reads a label the way answers are normalized everywhere: trim,
    /// uppercase, keep the first character.
    pub fn from_answer(raw: &str) -> Option<Self> {
        match normalize_answer(raw).as_str() {
            "A" => Some(OptionLabel::A),
            "B" => Some(OptionLabel::B),
            "C" => Some(OptionLabel::C),
            "D" => Some(OptionLabel::D),
            _ => None,
        }
    }
}

impl fmt::Display for OptionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uppercased first character of the trimmed input, or an empty string.
pub fn normalize_answer(raw: &str) -> String {
    raw.trim()
        .chars()
        .next()
        .map(|c| c.to_uppercase().collect())
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    /// Always four entries, prefixed "A. " .. "D. " by the model.
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_topic() -> String {
    "General Knowledge".to_string()
}

fn default_num_questions() -> u32 {
    10
}

fn default_language() -> String {
    "en".to_string()
}

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateQuizRequest {
    #[serde(default = "default_topic")]
    #[validate(length(min = 1, max = 200, message = "topic must be 1-200 characters"))]
    pub topic: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default = "default_num_questions")]
    #[validate(range(min = 1, message = "num_questions must be positive"))]
    pub num_questions: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateQuizResponse {
    pub quiz: Vec<Question>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmitQuizRequest {
    /// Unanswered questions may arrive as `null`.
    #[serde(default)]
    pub answers: Vec<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub question_number: usize,
    pub question: String,
    pub user_answer: String,
    pub correct_answer: String,
    pub is_correct: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitQuizResponse {
    pub score: u32,
    pub total: usize,
    pub feedback: Vec<FeedbackEntry>,
    pub topic: String,
    pub difficulty: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetLanguageRequest {
    #[serde(default = "default_language")]
    #[validate(length(min = 1, max = 16, message = "language must be 1-16 characters"))]
    pub language: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SetLanguageResponse {
    pub status: String,
    pub language: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_parsing_is_lenient_on_case_and_whitespace() {
        assert_eq!(OptionLabel::from_answer("b"), Some(OptionLabel::B));
        assert_eq!(OptionLabel::from_answer(" B "), Some(OptionLabel::B));
        assert_eq!(OptionLabel::from_answer("b "), Some(OptionLabel::B));
        assert_eq!(OptionLabel::from_answer("C. Paris"), Some(OptionLabel::C));
        assert_eq!(OptionLabel::from_answer("E"), None);
        assert_eq!(OptionLabel::from_answer(""), None);
    }

    #[test]
    fn test_normalize_answer() {
        assert_eq!(normalize_answer("  d"), "D");
        assert_eq!(normalize_answer("   "), "");
    }

    #[test]
    fn test_generate_request_defaults() {
        let req: GenerateQuizRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.topic, "General Knowledge");
        assert_eq!(req.difficulty, Difficulty::Medium);
        assert_eq!(req.num_questions, 10);
    }

    #[test]
    fn test_unknown_difficulty_is_rejected() {
        let parsed = serde_json::from_str::<GenerateQuizRequest>(r#"{"difficulty":"insane"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_zero_questions_fails_validation() {
        let req: GenerateQuizRequest = serde_json::from_str(r#"{"num_questions":0}"#).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_null_answers_are_accepted() {
        let req: SubmitQuizRequest = serde_json::from_str(r#"{"answers":["A",null]}"#).unwrap();
        assert_eq!(req.answers, vec![Some("A".to_string()), None]);
    }
}
