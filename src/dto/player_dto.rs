use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::services::answer_store::InitOutcome;
use crate::services::reveal::QuizView;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountSessionResponse {
    pub session_id: uuid::Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecordChoiceRequest {
    #[validate(length(min = 1, max = 1000))]
    pub option: String,
}

/// Length is capped by `PLAYER_MAX_TEXT_LEN` in the handler; empty text is
/// allowed and reads as unanswered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordTextRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationResponse {
    pub applied: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadOutcome {
    Created,
    Unchanged,
    Replaced,
}

impl From<&InitOutcome> for LoadOutcome {
    fn from(outcome: &InitOutcome) -> Self {
        match outcome {
            InitOutcome::Created => LoadOutcome::Created,
            InitOutcome::Unchanged => LoadOutcome::Unchanged,
            InitOutcome::Replaced { .. } => LoadOutcome::Replaced,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadQuizResponse {
    pub outcome: LoadOutcome,
    pub previous_quiz_id: Option<String>,
    pub view: QuizView,
}
