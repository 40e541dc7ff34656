use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::submission::SubmissionReceipt;
use crate::services::answer_store::AnswerStore;
use crate::services::backend::QuizBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SubmissionPhase {
    NotStarted = 0,
    Submitting = 1,
    Submitted = 2,
    Failed = 3,
}

impl SubmissionPhase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => SubmissionPhase::NotStarted,
            1 => SubmissionPhase::Submitting,
            2 => SubmissionPhase::Submitted,
            _ => SubmissionPhase::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Manual,
    TimerExpiry,
}

/// Proof of having won the race for an attempt. Not `Clone`: only one exists
/// per guard, and `submit` consumes it.
#[derive(Debug)]
pub struct SubmissionTicket {
    attempt_id: Uuid,
    source: TriggerSource,
}

impl SubmissionTicket {
    pub fn source(&self) -> TriggerSource {
        self.source
    }
}

/// Arbitrates between manual submit and timer expiry for one attempt.
///
/// `NotStarted -> Submitting` is a compare-and-set, taken synchronously
/// before any await, so exactly one trigger ever gets a ticket. The latch is
/// never re-armed: `Failed` is terminal for the attempt.
#[derive(Debug)]
pub struct SubmissionGuard {
    attempt_id: Uuid,
    phase: AtomicU8,
    winner: OnceLock<TriggerSource>,
    failure: OnceLock<String>,
}

impl SubmissionGuard {
    pub fn new(attempt_id: Uuid) -> Self {
        Self {
            attempt_id,
            phase: AtomicU8::new(SubmissionPhase::NotStarted as u8),
            winner: OnceLock::new(),
            failure: OnceLock::new(),
        }
    }

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn phase(&self) -> SubmissionPhase {
        SubmissionPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// True from the instant a trigger wins, before the network call starts.
    pub fn is_latched(&self) -> bool {
        self.phase() != SubmissionPhase::NotStarted
    }

    pub fn winner(&self) -> Option<TriggerSource> {
        self.winner.get().copied()
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.get().map(String::as_str)
    }

    pub fn try_begin(&self, source: TriggerSource) -> Option<SubmissionTicket> {
        match self.phase.compare_exchange(
            SubmissionPhase::NotStarted as u8,
            SubmissionPhase::Submitting as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                let _ = self.winner.set(source);
                tracing::info!(attempt_id = %self.attempt_id, ?source, "submission latched");
                Some(SubmissionTicket {
                    attempt_id: self.attempt_id,
                    source,
                })
            }
            Err(current) => {
                tracing::debug!(
                    attempt_id = %self.attempt_id,
                    ?source,
                    phase = ?SubmissionPhase::from_u8(current),
                    "submission trigger dropped"
                );
                None
            }
        }
    }

    /// Sends the attempt once and records the outcome.
    pub async fn submit(
        &self,
        ticket: SubmissionTicket,
        store: &RwLock<AnswerStore>,
        backend: &dyn QuizBackend,
    ) -> Result<SubmissionReceipt> {
        if ticket.attempt_id != self.attempt_id {
            return Err(Error::Internal(
                "submission ticket belongs to another attempt".to_string(),
            ));
        }

        let payload = {
            let store = store.read().await;
            if store.attempt_id() != Some(ticket.attempt_id) {
                None
            } else {
                store.build_submission_payload()
            }
        };
        let Some(payload) = payload else {
            return Err(self.fail("attempt is no longer active".to_string()));
        };

        tracing::info!(
            attempt_id = %self.attempt_id,
            quiz_id = %payload.quiz_id,
            source = ?ticket.source,
            answers = payload.answers.len(),
            "sending submission"
        );

        match backend.submit_attempt(&payload).await {
            Ok(receipt) => {
                {
                    let mut store = store.write().await;
                    if store.attempt_id() == Some(ticket.attempt_id) {
                        store.mark_submitted();
                    }
                }
                self.phase
                    .store(SubmissionPhase::Submitted as u8, Ordering::Release);
                Ok(receipt)
            }
            Err(err) => Err(self.fail(err.to_string())),
        }
    }

    /// `try_begin` followed by `submit`. `Ok(None)` means another trigger
    /// already owns the submission.
    pub async fn trigger(
        &self,
        source: TriggerSource,
        store: &RwLock<AnswerStore>,
        backend: &dyn QuizBackend,
    ) -> Result<Option<SubmissionReceipt>> {
        match self.try_begin(source) {
            Some(ticket) => self.submit(ticket, store, backend).await.map(Some),
            None => Ok(None),
        }
    }

    fn fail(&self, message: String) -> Error {
        tracing::warn!(attempt_id = %self.attempt_id, "submission failed: {}", message);
        let _ = self.failure.set(message.clone());
        self.phase.store(SubmissionPhase::Failed as u8, Ordering::Release);
        Error::Submission(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quiz::AttemptSettings;
    use crate::models::submission::AnswerValue;
    use crate::services::answer_store::tests::sample_questions;
    use crate::services::backend::MockQuizBackend;
    use chrono::Utc;
    use std::sync::Arc;

    fn ready_store() -> (Arc<RwLock<AnswerStore>>, Uuid) {
        let mut store = AnswerStore::new();
        store
            .initialize("quiz-1", "Sample", sample_questions(), AttemptSettings::default())
            .unwrap();
        store.record_choice("q1", "Paris");
        let id = store.attempt_id().unwrap();
        (Arc::new(RwLock::new(store)), id)
    }

    fn receipt() -> SubmissionReceipt {
        SubmissionReceipt {
            submitted_at: Utc::now(),
            response: serde_json::json!({ "ok": true }),
        }
    }

    #[test]
    fn only_first_trigger_gets_a_ticket() {
        let guard = SubmissionGuard::new(Uuid::new_v4());
        assert!(!guard.is_latched());
        let ticket = guard.try_begin(TriggerSource::TimerExpiry);
        assert!(ticket.is_some());
        assert!(guard.try_begin(TriggerSource::Manual).is_none());
        assert!(guard.try_begin(TriggerSource::TimerExpiry).is_none());
        assert!(guard.is_latched());
        assert_eq!(guard.phase(), SubmissionPhase::Submitting);
        assert_eq!(guard.winner(), Some(TriggerSource::TimerExpiry));
    }

    #[tokio::test]
    async fn concurrent_triggers_submit_once() {
        let (store, attempt_id) = ready_store();
        let mut backend = MockQuizBackend::new();
        backend
            .expect_submit_attempt()
            .times(1)
            .withf(|p| {
                p.quiz_id == "quiz-1"
                    && p.answers[0].answer == AnswerValue::Choices(vec!["Paris".into()])
            })
            .returning(|_| Ok(receipt()));
        let backend: Arc<dyn QuizBackend> = Arc::new(backend);
        let guard = Arc::new(SubmissionGuard::new(attempt_id));

        let mut tasks = Vec::new();
        for i in 0..16 {
            let (guard, store, backend) = (guard.clone(), store.clone(), backend.clone());
            let source = if i % 2 == 0 {
                TriggerSource::Manual
            } else {
                TriggerSource::TimerExpiry
            };
            tasks.push(tokio::spawn(async move {
                guard.trigger(source, &store, backend.as_ref()).await
            }));
        }

        let mut sent = 0;
        for task in tasks {
            if task.await.unwrap().unwrap().is_some() {
                sent += 1;
            }
        }
        assert_eq!(sent, 1);
        assert_eq!(guard.phase(), SubmissionPhase::Submitted);
        assert!(store.read().await.is_submitted());
    }

    #[tokio::test]
    async fn latched_while_waiting_for_the_store() {
        let (store, attempt_id) = ready_store();
        let mut backend = MockQuizBackend::new();
        backend
            .expect_submit_attempt()
            .times(1)
            .returning(|_| Ok(receipt()));
        let guard = SubmissionGuard::new(attempt_id);

        let held = store.write().await;
        let mut submit = tokio_test::task::spawn(guard.trigger(
            TriggerSource::TimerExpiry,
            &store,
            &backend,
        ));
        tokio_test::assert_pending!(submit.poll());
        assert_eq!(guard.phase(), SubmissionPhase::Submitting);
        assert!(guard.try_begin(TriggerSource::Manual).is_none());

        drop(held);
        assert!(submit.is_woken());
        let sent = tokio_test::assert_ready!(submit.poll()).unwrap();
        assert!(sent.is_some());
        assert_eq!(guard.phase(), SubmissionPhase::Submitted);
    }

    #[tokio::test]
    async fn failure_keeps_latch_and_store_unsubmitted() {
        let (store, attempt_id) = ready_store();
        let mut backend = MockQuizBackend::new();
        backend
            .expect_submit_attempt()
            .times(1)
            .returning(|_| Err(Error::Submission("backend down".into())));
        let guard = SubmissionGuard::new(attempt_id);

        let err = guard
            .trigger(TriggerSource::Manual, &store, &backend)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Submission(_)));
        assert_eq!(guard.phase(), SubmissionPhase::Failed);
        assert!(guard.is_latched());
        assert!(guard.failure().unwrap().contains("backend down"));
        assert!(!store.read().await.is_submitted());

        let retry = guard
            .trigger(TriggerSource::Manual, &store, &backend)
            .await
            .unwrap();
        assert!(retry.is_none());
    }

    #[tokio::test]
    async fn stale_ticket_does_not_touch_new_attempt() {
        let (store, attempt_id) = ready_store();
        let guard = SubmissionGuard::new(attempt_id);
        let ticket = guard.try_begin(TriggerSource::TimerExpiry).unwrap();

        store
            .write()
            .await
            .initialize("quiz-2", "Next", sample_questions(), AttemptSettings::default())
            .unwrap();

        let mut backend = MockQuizBackend::new();
        backend.expect_submit_attempt().times(0);
        let err = guard.submit(ticket, &store, &backend).await.unwrap_err();
        assert!(matches!(err, Error::Submission(_)));
        assert!(!store.read().await.is_submitted());
    }
}
