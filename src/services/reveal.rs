use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::attempt::{QuestionKind, QuestionState, QuizAttempt};

/// Everything the student can observe about the attempt. Correct options,
/// accepted answers and explanations only exist in the `Revealed` variant.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum QuizView {
    Empty,
    Unavailable {
        message: String,
    },
    InProgress {
        quiz_id: String,
        title: String,
        locked: bool,
        questions: Vec<QuestionView>,
    },
    Submitted {
        quiz_id: String,
        title: String,
        questions: Vec<QuestionView>,
    },
    Revealed {
        quiz_id: String,
        title: String,
        score: ScoreSummary,
        questions: Vec<RevealedQuestion>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub index: usize,
    pub id: String,
    pub question: String,
    pub points: f64,
    #[serde(flatten)]
    pub body: AnswerBody,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnswerBody {
    MultipleChoice { options: Vec<OptionView> },
    ShortAnswer { answer_text: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct OptionView {
    pub text: String,
    pub selected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionOutcome {
    CorrectSelected,
    CorrectUnselected,
    IncorrectSelected,
    IncorrectUnselected,
}

impl OptionOutcome {
    pub fn classify(is_correct: bool, is_selected: bool) -> Self {
        match (is_correct, is_selected) {
            (true, true) => OptionOutcome::CorrectSelected,
            (true, false) => OptionOutcome::CorrectUnselected,
            (false, true) => OptionOutcome::IncorrectSelected,
            (false, false) => OptionOutcome::IncorrectUnselected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    Correct,
    Wrong,
    Unanswered,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevealedOption {
    pub text: String,
    pub selected: bool,
    pub correct: bool,
    pub outcome: OptionOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevealedQuestion {
    pub index: usize,
    pub id: String,
    pub question: String,
    pub points: f64,
    pub points_earned: f64,
    pub outcome: AnswerOutcome,
    pub explanation: Option<String>,
    #[serde(flatten)]
    pub body: RevealedBody,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RevealedBody {
    MultipleChoice {
        options: Vec<RevealedOption>,
    },
    ShortAnswer {
        answer_text: String,
        accepted_answers: Vec<String>,
        case_sensitive: bool,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreSummary {
    pub earned_points: f64,
    pub max_points: f64,
    pub percentage: f64,
    pub correct: usize,
    pub wrong: usize,
    pub unanswered: usize,
}

pub fn render(attempt: &QuizAttempt, locked: bool) -> QuizView {
    let quiz_id = attempt.quiz_id.clone();
    let title = attempt.title.clone();

    if attempt.reveal_enabled() {
        let questions: Vec<RevealedQuestion> = attempt
            .questions
            .iter()
            .enumerate()
            .map(|(index, q)| reveal_question(index, q))
            .collect();
        let score = summarize(attempt, &questions);
        return QuizView::Revealed {
            quiz_id,
            title,
            score,
            questions,
        };
    }

    let questions = attempt
        .questions
        .iter()
        .enumerate()
        .map(|(index, q)| question_view(index, q))
        .collect();
    if attempt.submitted {
        QuizView::Submitted {
            quiz_id,
            title,
            questions,
        }
    } else {
        QuizView::InProgress {
            quiz_id,
            title,
            locked,
            questions,
        }
    }
}

fn question_view(index: usize, q: &QuestionState) -> QuestionView {
    let body = match &q.kind {
        QuestionKind::MultipleChoice {
            options, selected, ..
        } => AnswerBody::MultipleChoice {
            options: options
                .iter()
                .enumerate()
                .map(|(i, text)| OptionView {
                    text: text.clone(),
                    selected: selected.contains(&i),
                })
                .collect(),
        },
        QuestionKind::ShortAnswer { answer_text, .. } => AnswerBody::ShortAnswer {
            answer_text: answer_text.clone(),
        },
    };
    QuestionView {
        index,
        id: q.id.clone(),
        question: q.question.clone(),
        points: to_f64(q.points),
        body,
    }
}

fn reveal_question(index: usize, q: &QuestionState) -> RevealedQuestion {
    let outcome = grade(q);
    let body = match &q.kind {
        QuestionKind::MultipleChoice {
            options,
            selected,
            correct,
        } => RevealedBody::MultipleChoice {
            options: options
                .iter()
                .enumerate()
                .map(|(i, text)| {
                    let is_correct = correct.contains(&i);
                    let is_selected = selected.contains(&i);
                    RevealedOption {
                        text: text.clone(),
                        selected: is_selected,
                        correct: is_correct,
                        outcome: OptionOutcome::classify(is_correct, is_selected),
                    }
                })
                .collect(),
        },
        QuestionKind::ShortAnswer {
            answer_text,
            accepted_answers,
            case_sensitive,
        } => RevealedBody::ShortAnswer {
            answer_text: answer_text.clone(),
            accepted_answers: accepted_answers.clone(),
            case_sensitive: *case_sensitive,
        },
    };
    let earned = if outcome == AnswerOutcome::Correct {
        q.points
    } else {
        Decimal::ZERO
    };
    RevealedQuestion {
        index,
        id: q.id.clone(),
        question: q.question.clone(),
        points: to_f64(q.points),
        points_earned: to_f64(earned),
        outcome,
        explanation: q.explanation.clone(),
        body,
    }
}

/// Outcome of a single question. MCQ is all-or-nothing: the selected set
/// must equal the correct set.
pub fn grade(q: &QuestionState) -> AnswerOutcome {
    match &q.kind {
        QuestionKind::MultipleChoice {
            selected, correct, ..
        } => {
            if selected.is_empty() {
                AnswerOutcome::Unanswered
            } else if selected == correct {
                AnswerOutcome::Correct
            } else {
                AnswerOutcome::Wrong
            }
        }
        QuestionKind::ShortAnswer {
            answer_text,
            accepted_answers,
            case_sensitive,
        } => short_answer_outcome(answer_text, accepted_answers, *case_sensitive),
    }
}

pub fn short_answer_outcome(
    answer_text: &str,
    accepted_answers: &[String],
    case_sensitive: bool,
) -> AnswerOutcome {
    let given = answer_text.trim();
    if given.is_empty() {
        return AnswerOutcome::Unanswered;
    }
    let matched = if case_sensitive {
        accepted_answers.iter().any(|a| a.trim() == given)
    } else {
        let given = given.to_lowercase();
        accepted_answers
            .iter()
            .any(|a| a.trim().to_lowercase() == given)
    };
    if matched {
        AnswerOutcome::Correct
    } else {
        AnswerOutcome::Wrong
    }
}

/// Saturates instead of panicking on overflow.
fn total_points<'a>(points: impl Iterator<Item = &'a Decimal>) -> Decimal {
    points.fold(Decimal::ZERO, |acc, p| {
        acc.checked_add(*p).unwrap_or(Decimal::MAX)
    })
}

fn summarize(attempt: &QuizAttempt, revealed: &[RevealedQuestion]) -> ScoreSummary {
    let max = total_points(attempt.questions.iter().map(|q| &q.points));
    let earned = total_points(
        attempt
            .questions
            .iter()
            .zip(revealed)
            .filter(|(_, r)| r.outcome == AnswerOutcome::Correct)
            .map(|(q, _)| &q.points),
    );
    let percentage = if max > Decimal::ZERO {
        (earned / max * Decimal::ONE_HUNDRED).round_dp(2)
    } else {
        Decimal::ZERO
    };
    let count = |o: AnswerOutcome| revealed.iter().filter(|r| r.outcome == o).count();

    ScoreSummary {
        earned_points: to_f64(earned),
        max_points: to_f64(max),
        percentage: to_f64(percentage),
        correct: count(AnswerOutcome::Correct),
        wrong: count(AnswerOutcome::Wrong),
        unanswered: count(AnswerOutcome::Unanswered),
    }
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}
