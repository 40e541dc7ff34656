use rand::seq::SliceRandom;
use rand::Rng;
use uuid::Uuid;

use crate::error::Result;
use crate::models::attempt::{build_questions, QuestionKind, QuizAttempt};
use crate::models::quiz::{AttemptSettings, QuestionDefinition};
use crate::models::submission::{AnswerValue, SubmissionPayload, SubmittedAnswer};
use crate::utils::time;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    Created,
    /// An attempt for this quiz already exists; nothing was touched.
    Unchanged,
    Replaced { previous_quiz_id: String },
}

/// Holds the answer state of the active attempt. Pure in-memory state, no I/O.
#[derive(Debug, Default)]
pub struct AnswerStore {
    attempt: Option<QuizAttempt>,
}

impl AnswerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempt(&self) -> Option<&QuizAttempt> {
        self.attempt.as_ref()
    }

    pub fn attempt_id(&self) -> Option<Uuid> {
        self.attempt.as_ref().map(|a| a.attempt_id)
    }

    pub fn quiz_id(&self) -> Option<&str> {
        self.attempt.as_ref().map(|a| a.quiz_id.as_str())
    }

    pub fn is_submitted(&self) -> bool {
        self.attempt.as_ref().map(|a| a.submitted).unwrap_or(false)
    }

    pub fn answered_count(&self) -> usize {
        self.attempt.as_ref().map(|a| a.answered_count()).unwrap_or(0)
    }

    pub fn initialize(
        &mut self,
        quiz_id: &str,
        title: &str,
        questions: Vec<QuestionDefinition>,
        settings: AttemptSettings,
    ) -> Result<InitOutcome> {
        self.initialize_with_rng(quiz_id, title, questions, settings, &mut rand::thread_rng())
    }

    pub fn initialize_with_rng<R: Rng + ?Sized>(
        &mut self,
        quiz_id: &str,
        title: &str,
        questions: Vec<QuestionDefinition>,
        settings: AttemptSettings,
        rng: &mut R,
    ) -> Result<InitOutcome> {
        if self.quiz_id() == Some(quiz_id) {
            tracing::debug!(quiz_id, "attempt already initialized, ignoring re-init");
            return Ok(InitOutcome::Unchanged);
        }

        let mut questions = build_questions(questions)?;
        if settings.shuffle_questions {
            questions.shuffle(rng);
        }

        let attempt = QuizAttempt {
            attempt_id: Uuid::new_v4(),
            quiz_id: quiz_id.to_string(),
            title: title.to_string(),
            settings,
            questions,
            submitted: false,
            started_at: time::now(),
        };
        tracing::info!(
            quiz_id,
            attempt_id = %attempt.attempt_id,
            questions = attempt.questions.len(),
            "attempt initialized"
        );

        Ok(match self.attempt.replace(attempt) {
            Some(previous) => InitOutcome::Replaced {
                previous_quiz_id: previous.quiz_id,
            },
            None => InitOutcome::Created,
        })
    }

    /// Toggles `option` in the selection of a multiple-choice question.
    pub fn record_choice(&mut self, question_id: &str, option: &str) -> bool {
        let Some(attempt) = self.open_attempt() else {
            return false;
        };
        match attempt.question_mut(question_id).map(|q| &mut q.kind) {
            Some(QuestionKind::MultipleChoice {
                options, selected, ..
            }) => match options.iter().position(|o| o == option) {
                Some(idx) => {
                    if !selected.remove(&idx) {
                        selected.insert(idx);
                    }
                    true
                }
                None => {
                    tracing::debug!(question_id, option, "unknown option ignored");
                    false
                }
            },
            _ => {
                tracing::debug!(question_id, "choice for non-MCQ or unknown question ignored");
                false
            }
        }
    }

    pub fn record_text(&mut self, question_id: &str, text: &str) -> bool {
        let Some(attempt) = self.open_attempt() else {
            return false;
        };
        match attempt.question_mut(question_id).map(|q| &mut q.kind) {
            Some(QuestionKind::ShortAnswer { answer_text, .. }) => {
                *answer_text = text.to_string();
                true
            }
            _ => {
                tracing::debug!(question_id, "text for non-SAQ or unknown question ignored");
                false
            }
        }
    }

    pub fn clear_answer(&mut self, question_id: &str) -> bool {
        let Some(attempt) = self.open_attempt() else {
            return false;
        };
        match attempt.question_mut(question_id).map(|q| &mut q.kind) {
            Some(QuestionKind::MultipleChoice { selected, .. }) => {
                selected.clear();
                true
            }
            Some(QuestionKind::ShortAnswer { answer_text, .. }) => {
                answer_text.clear();
                true
            }
            None => false,
        }
    }

    /// Irreversible for the lifetime of the attempt.
    pub fn mark_submitted(&mut self) -> bool {
        match self.attempt.as_mut() {
            Some(attempt) if !attempt.submitted => {
                attempt.submitted = true;
                tracing::info!(quiz_id = %attempt.quiz_id, "attempt marked submitted");
                true
            }
            _ => false,
        }
    }

    pub fn build_submission_payload(&self) -> Option<SubmissionPayload> {
        let attempt = self.attempt.as_ref()?;
        let answers = attempt
            .questions
            .iter()
            .map(|q| SubmittedAnswer {
                question_id: q.id.clone(),
                answer: match &q.kind {
                    QuestionKind::MultipleChoice { .. } => AnswerValue::Choices(
                        q.selected_options().into_iter().map(str::to_string).collect(),
                    ),
                    QuestionKind::ShortAnswer { answer_text, .. } => {
                        AnswerValue::Text(answer_text.clone())
                    }
                },
            })
            .collect();
        Some(SubmissionPayload {
            quiz_id: attempt.quiz_id.clone(),
            answers,
        })
    }

    pub fn reset(&mut self) {
        if let Some(previous) = self.attempt.take() {
            tracing::debug!(quiz_id = %previous.quiz_id, "answer store reset");
        }
    }

    fn open_attempt(&mut self) -> Option<&mut QuizAttempt> {
        match self.attempt.as_mut() {
            Some(attempt) if !attempt.submitted => Some(attempt),
            Some(_) => {
                tracing::debug!("mutation after submit ignored");
                None
            }
            None => None,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::quiz::QuestionKindDefinition;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    pub(crate) fn mcq(id: &str, options: &[&str], correct: &[&str]) -> QuestionDefinition {
        QuestionDefinition {
            id: id.to_string(),
            question: format!("Question {}", id),
            points: 1.0,
            explanation: Some(format!("Because of {}", id)),
            kind: QuestionKindDefinition::MultipleChoice {
                options: options.iter().map(|s| s.to_string()).collect(),
                correct_options: correct.iter().map(|s| s.to_string()).collect(),
            },
        }
    }

    pub(crate) fn saq(id: &str, accepted: &[&str], case_sensitive: bool) -> QuestionDefinition {
        QuestionDefinition {
            id: id.to_string(),
            question: format!("Question {}", id),
            points: 2.0,
            explanation: None,
            kind: QuestionKindDefinition::ShortAnswer {
                accepted_answers: accepted.iter().map(|s| s.to_string()).collect(),
                case_sensitive,
            },
        }
    }

    pub(crate) fn sample_questions() -> Vec<QuestionDefinition> {
        vec![
            mcq("q1", &["Lyon", "Paris", "Nice"], &["Paris"]),
            saq("q2", &["Paris", "paris"], false),
            mcq("q3", &["2", "3", "5", "6"], &["2", "3", "5"]),
        ]
    }

    fn store_with_sample() -> AnswerStore {
        let mut store = AnswerStore::new();
        store
            .initialize("quiz-1", "Sample", sample_questions(), AttemptSettings::default())
            .unwrap();
        store
    }

    #[test]
    fn record_choice_toggles_membership() {
        let mut store = store_with_sample();
        assert!(store.record_choice("q3", "5"));
        assert!(store.record_choice("q3", "2"));
        assert_eq!(
            store.attempt().unwrap().question("q3").unwrap().selected_options(),
            vec!["2", "5"]
        );
        assert!(store.record_choice("q3", "5"));
        assert_eq!(
            store.attempt().unwrap().question("q3").unwrap().selected_options(),
            vec!["2"]
        );
        assert!(!store.record_choice("q3", "7"));
        assert!(!store.record_choice("q2", "Paris"));
        assert!(!store.record_choice("missing", "Paris"));
    }

    #[test]
    fn reinitializing_same_quiz_keeps_answers() {
        let mut store = store_with_sample();
        store.record_text("q2", "paris");
        let attempt_id = store.attempt_id();

        let outcome = store
            .initialize("quiz-1", "Sample", sample_questions(), AttemptSettings::default())
            .unwrap();

        assert_eq!(outcome, InitOutcome::Unchanged);
        assert_eq!(store.attempt_id(), attempt_id);
        assert_eq!(store.attempt().unwrap().questions.len(), 3);
        assert_eq!(store.answered_count(), 1);
    }

    #[test]
    fn reinitializing_submitted_quiz_is_noop() {
        let mut store = store_with_sample();
        store.mark_submitted();
        let outcome = store
            .initialize("quiz-1", "Sample", sample_questions(), AttemptSettings::default())
            .unwrap();
        assert_eq!(outcome, InitOutcome::Unchanged);
        assert!(store.is_submitted());
    }

    #[test]
    fn different_quiz_replaces_attempt() {
        let mut store = store_with_sample();
        store.record_choice("q1", "Paris");
        let outcome = store
            .initialize("quiz-2", "Other", vec![saq("s1", &["x"], true)], AttemptSettings::default())
            .unwrap();
        assert_eq!(
            outcome,
            InitOutcome::Replaced {
                previous_quiz_id: "quiz-1".into()
            }
        );
        assert_eq!(store.quiz_id(), Some("quiz-2"));
        assert_eq!(store.answered_count(), 0);
    }

    #[test]
    fn invalid_definition_keeps_previous_attempt() {
        let mut store = store_with_sample();
        let result = store.initialize(
            "quiz-2",
            "Broken",
            vec![mcq("b1", &["a"], &["z"])],
            AttemptSettings::default(),
        );
        assert!(result.is_err());
        assert_eq!(store.quiz_id(), Some("quiz-1"));
    }

    #[test]
    fn nothing_changes_after_submit() {
        let mut store = store_with_sample();
        store.record_choice("q1", "Paris");
        store.record_text("q2", "Paris");
        assert!(store.mark_submitted());
        let before = store.build_submission_payload();

        assert!(!store.record_choice("q1", "Lyon"));
        assert!(!store.record_choice("q3", "2"));
        assert!(!store.record_text("q2", "Rome"));
        assert!(!store.clear_answer("q1"));
        assert!(!store.clear_answer("q2"));
        assert!(!store.mark_submitted());

        assert_eq!(store.build_submission_payload(), before);
        assert!(store.is_submitted());
    }

    #[test]
    fn payload_lists_every_question_in_attempt_order() {
        let mut store = store_with_sample();
        store.record_choice("q1", "Paris");
        store.record_choice("q3", "5");
        store.record_choice("q3", "2");
        store.record_text("q2", "PARIS");

        let payload = store.build_submission_payload().unwrap();
        assert!(!store.is_submitted());
        assert_eq!(payload.quiz_id, "quiz-1");
        assert_eq!(
            payload.answers,
            vec![
                SubmittedAnswer {
                    question_id: "q1".into(),
                    answer: AnswerValue::Choices(vec!["Paris".into()]),
                },
                SubmittedAnswer {
                    question_id: "q2".into(),
                    answer: AnswerValue::Text("PARIS".into()),
                },
                SubmittedAnswer {
                    question_id: "q3".into(),
                    answer: AnswerValue::Choices(vec!["2".into(), "5".into()]),
                },
            ]
        );

        let wire = serde_json::to_value(&payload).unwrap();
        assert_eq!(wire["quizId"], "quiz-1");
        assert_eq!(wire["answers"][0]["questionId"], "q1");
        assert_eq!(wire["answers"][1]["answer"], "PARIS");
    }

    #[test]
    fn clear_answer_empties_both_kinds() {
        let mut store = store_with_sample();
        store.record_choice("q1", "Nice");
        store.record_text("q2", "Lyon");
        assert_eq!(store.answered_count(), 2);
        assert!(store.clear_answer("q1"));
        assert!(store.clear_answer("q2"));
        assert_eq!(store.answered_count(), 0);
        assert!(!store.clear_answer("nope"));
    }

    #[test]
    fn shuffle_permutes_once_and_keeps_questions() {
        let settings = AttemptSettings {
            shuffle_questions: true,
            ..AttemptSettings::default()
        };
        let defs: Vec<_> = (0..12)
            .map(|i| saq(&format!("s{}", i), &["x"], false))
            .collect();
        let mut store = AnswerStore::new();
        let mut rng = StdRng::seed_from_u64(7);
        store
            .initialize_with_rng("quiz-s", "Shuffled", defs.clone(), settings, &mut rng)
            .unwrap();
        let order: Vec<String> = store
            .attempt()
            .unwrap()
            .questions
            .iter()
            .map(|q| q.id.clone())
            .collect();

        let mut sorted = order.clone();
        sorted.sort();
        let mut expected: Vec<String> = defs.iter().map(|d| d.id.clone()).collect();
        expected.sort();
        assert_eq!(sorted, expected);

        store
            .initialize_with_rng("quiz-s", "Shuffled", defs, settings, &mut rng)
            .unwrap();
        let again: Vec<String> = store
            .attempt()
            .unwrap()
            .questions
            .iter()
            .map(|q| q.id.clone())
            .collect();
        assert_eq!(order, again);
    }

    #[test]
    fn reset_clears_everything() {
        let mut store = store_with_sample();
        store.reset();
        assert!(store.attempt().is_none());
        assert!(store.build_submission_payload().is_none());
        assert!(!store.record_text("q2", "x"));
    }
}
