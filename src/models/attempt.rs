use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::quiz::{AttemptSettings, QuestionDefinition, QuestionKindDefinition};

/// One student's in-progress (or finished) run through a quiz.
#[derive(Debug, Clone)]
pub struct QuizAttempt {
    pub attempt_id: Uuid,
    pub quiz_id: String,
    pub title: String,
    pub settings: AttemptSettings,
    pub questions: Vec<QuestionState>,
    pub submitted: bool,
    pub started_at: DateTime<Utc>,
}

impl QuizAttempt {
    pub fn question(&self, question_id: &str) -> Option<&QuestionState> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    pub fn question_mut(&mut self, question_id: &str) -> Option<&mut QuestionState> {
        self.questions.iter_mut().find(|q| q.id == question_id)
    }

    pub fn answered_count(&self) -> usize {
        self.questions.iter().filter(|q| q.is_answered()).count()
    }

    pub fn reveal_enabled(&self) -> bool {
        self.submitted && self.settings.show_correct_answers_after_submit
    }
}

#[derive(Debug, Clone)]
pub struct QuestionState {
    pub id: String,
    pub question: String,
    pub points: Decimal,
    pub explanation: Option<String>,
    pub kind: QuestionKind,
}

#[derive(Debug, Clone)]
pub enum QuestionKind {
    /// Option sets hold indices into `options`, so answers keep display order.
    MultipleChoice {
        options: Vec<String>,
        selected: BTreeSet<usize>,
        correct: BTreeSet<usize>,
    },
    ShortAnswer {
        answer_text: String,
        accepted_answers: Vec<String>,
        case_sensitive: bool,
    },
}

impl QuestionState {
    pub fn from_definition(def: QuestionDefinition) -> Result<Self> {
        if def.id.trim().is_empty() {
            return Err(Error::InvalidQuiz("question without an id".to_string()));
        }
        if !def.points.is_finite() || def.points < 0.0 {
            return Err(Error::InvalidQuiz(format!(
                "question {} has invalid points {}",
                def.id, def.points
            )));
        }
        let points = Decimal::from_f64(def.points).ok_or_else(|| {
            Error::InvalidQuiz(format!("question {} has invalid points", def.id))
        })?;

        let kind = match def.kind {
            QuestionKindDefinition::MultipleChoice {
                options,
                correct_options,
            } => {
                if options.is_empty() {
                    return Err(Error::InvalidQuiz(format!(
                        "question {} has no options",
                        def.id
                    )));
                }
                let mut seen = HashSet::new();
                if let Some(dup) = options.iter().find(|o| !seen.insert(o.as_str())) {
                    return Err(Error::InvalidQuiz(format!(
                        "question {} lists option {:?} twice",
                        def.id, dup
                    )));
                }
                let mut correct = BTreeSet::new();
                for option in &correct_options {
                    let idx = options.iter().position(|o| o == option).ok_or_else(|| {
                        Error::InvalidQuiz(format!(
                            "question {} marks unknown option {:?} as correct",
                            def.id, option
                        ))
                    })?;
                    correct.insert(idx);
                }
                QuestionKind::MultipleChoice {
                    options,
                    selected: BTreeSet::new(),
                    correct,
                }
            }
            QuestionKindDefinition::ShortAnswer {
                accepted_answers,
                case_sensitive,
            } => QuestionKind::ShortAnswer {
                answer_text: String::new(),
                accepted_answers,
                case_sensitive,
            },
        };

        Ok(Self {
            id: def.id,
            question: def.question,
            points,
            explanation: def.explanation.filter(|e| !e.trim().is_empty()),
            kind,
        })
    }

    pub fn is_answered(&self) -> bool {
        match &self.kind {
            QuestionKind::MultipleChoice { selected, .. } => !selected.is_empty(),
            QuestionKind::ShortAnswer { answer_text, .. } => !answer_text.trim().is_empty(),
        }
    }

    pub fn selected_options(&self) -> Vec<&str> {
        match &self.kind {
            QuestionKind::MultipleChoice {
                options, selected, ..
            } => selected.iter().map(|&i| options[i].as_str()).collect(),
            QuestionKind::ShortAnswer { .. } => Vec::new(),
        }
    }
}

/// Builds the ordered question list, rejecting duplicate ids and point
/// totals that do not fit a `Decimal`.
pub fn build_questions(defs: Vec<QuestionDefinition>) -> Result<Vec<QuestionState>> {
    let mut ids = HashSet::new();
    let mut questions = Vec::with_capacity(defs.len());
    let mut total = Decimal::ZERO;
    for def in defs {
        if !ids.insert(def.id.clone()) {
            return Err(Error::InvalidQuiz(format!(
                "question id {} appears more than once",
                def.id
            )));
        }
        let question = QuestionState::from_definition(def)?;
        total = total.checked_add(question.points).ok_or_else(|| {
            Error::InvalidQuiz(format!(
                "total points overflow at question {}",
                question.id
            ))
        })?;
        questions.push(question);
    }
    Ok(questions)
}
