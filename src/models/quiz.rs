use serde::{Deserialize, Serialize};

/// Quiz definition as returned by the tutoring backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizDefinition {
    pub quiz_info: QuizInfo,
    #[serde(default)]
    pub quiz_questions: Vec<QuestionDefinition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizInfo {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub settings: RawQuizSettings,
}

/// Settings exactly as the backend sends them. Every field may be absent;
/// `AttemptSettings::resolve` is the only place defaults are applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuizSettings {
    pub shuffle_questions: Option<bool>,
    pub show_correct_answers_after_submit: Option<bool>,
    pub time_limit_minutes: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDefinition {
    pub id: String,
    #[serde(default)]
    pub question: String,
    #[serde(default = "default_points")]
    pub points: f64,
    pub explanation: Option<String>,
    #[serde(flatten)]
    pub kind: QuestionKindDefinition,
}

fn default_points() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "questionType", rename_all = "camelCase")]
pub enum QuestionKindDefinition {
    MultipleChoice {
        options: Vec<String>,
        #[serde(rename = "correctOptions", default)]
        correct_options: Vec<String>,
    },
    ShortAnswer {
        #[serde(rename = "acceptedAnswers", default)]
        accepted_answers: Vec<String>,
        #[serde(rename = "caseSensitive", default)]
        case_sensitive: bool,
    },
}

/// Settings snapshot captured once when an attempt starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttemptSettings {
    pub shuffle_questions: bool,
    pub show_correct_answers_after_submit: bool,
    pub time_limit_minutes: Option<u32>,
}

impl Default for AttemptSettings {
    fn default() -> Self {
        Self {
            shuffle_questions: false,
            show_correct_answers_after_submit: true,
            time_limit_minutes: None,
        }
    }
}

impl AttemptSettings {
    /// A non-positive limit means the quiz is untimed.
    pub fn resolve(raw: &RawQuizSettings) -> Self {
        let defaults = Self::default();
        Self {
            shuffle_questions: raw.shuffle_questions.unwrap_or(defaults.shuffle_questions),
            show_correct_answers_after_submit: raw
                .show_correct_answers_after_submit
                .unwrap_or(defaults.show_correct_answers_after_submit),
            time_limit_minutes: raw
                .time_limit_minutes
                .filter(|m| *m > 0)
                .map(|m| u32::try_from(m).unwrap_or(u32::MAX)),
        }
    }

    pub fn time_limit_secs(&self) -> Option<u64> {
        self.time_limit_minutes.map(|m| u64::from(m) * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_backend_definition() {
        let raw = json!({
            "quizInfo": {
                "title": "Capitals",
                "settings": { "timeLimitMinutes": 5, "shuffleQuestions": true }
            },
            "quizQuestions": [
                {
                    "id": "q1",
                    "questionType": "multipleChoice",
                    "question": "Pick the capital of France",
                    "points": 2,
                    "options": ["Lyon", "Paris"],
                    "correctOptions": ["Paris"]
                },
                {
                    "id": "q2",
                    "questionType": "shortAnswer",
                    "question": "Capital of Italy?",
                    "acceptedAnswers": ["Rome"],
                    "explanation": "Rome has been the capital since 1871."
                }
            ]
        });

        let def: QuizDefinition = serde_json::from_value(raw).unwrap();
        assert_eq!(def.quiz_info.title, "Capitals");
        assert_eq!(def.quiz_questions.len(), 2);
        assert_eq!(def.quiz_questions[0].points, 2.0);
        assert_eq!(def.quiz_questions[1].points, 1.0);
        match &def.quiz_questions[1].kind {
            QuestionKindDefinition::ShortAnswer {
                accepted_answers,
                case_sensitive,
            } => {
                assert_eq!(accepted_answers, &vec!["Rome".to_string()]);
                assert!(!case_sensitive);
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn settings_defaults_are_resolved_once() {
        let resolved = AttemptSettings::resolve(&RawQuizSettings::default());
        assert_eq!(resolved, AttemptSettings::default());
        assert_eq!(resolved.time_limit_secs(), None);

        let untimed = AttemptSettings::resolve(&RawQuizSettings {
            time_limit_minutes: Some(0),
            ..Default::default()
        });
        assert_eq!(untimed.time_limit_minutes, None);

        let negative = AttemptSettings::resolve(&RawQuizSettings {
            time_limit_minutes: Some(-3),
            ..Default::default()
        });
        assert_eq!(negative.time_limit_minutes, None);

        let timed = AttemptSettings::resolve(&RawQuizSettings {
            time_limit_minutes: Some(2),
            show_correct_answers_after_submit: Some(false),
            ..Default::default()
        });
        assert_eq!(timed.time_limit_secs(), Some(120));
        assert!(!timed.show_correct_answers_after_submit);
    }
}
