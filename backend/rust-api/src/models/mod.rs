pub mod quiz;
pub mod session;

pub use quiz::{
    Difficulty, FeedbackEntry, GenerateQuizRequest, GenerateQuizResponse, OptionLabel, Question,
    SetLanguageRequest, SetLanguageResponse, SubmitQuizRequest, SubmitQuizResponse,
};
pub use session::SessionData;
