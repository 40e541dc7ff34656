use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::quiz::AttemptSettings;
use crate::models::submission::SubmissionReceipt;
use crate::services::answer_store::{AnswerStore, InitOutcome};
use crate::services::backend::QuizBackend;
use crate::services::countdown::{CountdownTimer, TimerState};
use crate::services::navigation::{NavigationController, PanelEntry, ScrollTarget};
use crate::services::reveal::{self, QuizView};
use crate::services::submission_guard::{
    SubmissionGuard, SubmissionPhase, SubmissionTicket, TriggerSource,
};
use crate::utils::time::format_countdown;

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub tick: Duration,
    pub header_offset_px: u32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            header_offset_px: 80,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptProgress {
    pub quiz_id: Option<String>,
    pub phase: SubmissionPhase,
    pub triggered_by: Option<TriggerSource>,
    pub submitted: bool,
    pub answered: usize,
    pub total: usize,
    pub timer: TimerState,
    pub remaining_seconds: Option<u64>,
    pub countdown: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    /// False when another trigger already owned the submission.
    pub accepted: bool,
    pub phase: SubmissionPhase,
    pub receipt: Option<SubmissionReceipt>,
}

/// Runtime pieces whose lifetime is exactly one attempt.
struct AttemptRuntime {
    guard: Arc<SubmissionGuard>,
    timer: CountdownTimer,
}

/// A mounted quiz page: one active attempt, its timer, guard and
/// navigation state. Dropping or tearing down the session cancels the timer.
pub struct QuizSession {
    id: Uuid,
    me: Weak<QuizSession>,
    backend: Arc<dyn QuizBackend>,
    options: SessionOptions,
    store: Arc<RwLock<AnswerStore>>,
    runtime: Mutex<Option<AttemptRuntime>>,
    navigation: Mutex<NavigationController>,
    load_error: Mutex<Option<String>>,
}

impl QuizSession {
    pub fn new(backend: Arc<dyn QuizBackend>, options: SessionOptions) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            id: Uuid::new_v4(),
            me: me.clone(),
            backend,
            options,
            store: Arc::new(RwLock::new(AnswerStore::new())),
            runtime: Mutex::new(None),
            navigation: Mutex::new(NavigationController::new(options.header_offset_px)),
            load_error: Mutex::new(None),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Loads `quiz_id` into the page. Re-loading the quiz that is already
    /// active does not refetch and leaves the attempt untouched.
    pub async fn load(&self, quiz_id: &str) -> Result<InitOutcome> {
        if self.store.read().await.quiz_id() == Some(quiz_id) {
            tracing::debug!(session_id = %self.id, quiz_id, "quiz already loaded");
            return Ok(InitOutcome::Unchanged);
        }

        self.teardown().await;

        let definition = match self.backend.fetch_quiz(quiz_id).await {
            Ok(def) => def,
            Err(err) => {
                tracing::warn!(session_id = %self.id, quiz_id, error = %err, "quiz could not be loaded");
                *self.load_error.lock().await = Some(err.to_string());
                return Err(err);
            }
        };
        let settings = AttemptSettings::resolve(&definition.quiz_info.settings);

        let mut store = self.store.write().await;
        let mut runtime = self.runtime.lock().await;
        let outcome = match store.initialize(
            quiz_id,
            &definition.quiz_info.title,
            definition.quiz_questions,
            settings,
        ) {
            Ok(outcome) => outcome,
            Err(err) => {
                *self.load_error.lock().await = Some(err.to_string());
                return Err(err);
            }
        };
        if outcome == InitOutcome::Unchanged {
            // a concurrent load of the same quiz won
            return Ok(outcome);
        }
        *self.load_error.lock().await = None;

        let attempt_id = store
            .attempt_id()
            .ok_or_else(|| Error::Internal("attempt missing after initialize".to_string()))?;
        let guard = Arc::new(SubmissionGuard::new(attempt_id));
        let mut timer = CountdownTimer::new(self.options.tick);

        let held = guard.clone();
        let expiring = guard.clone();
        let session = self.me.clone();
        timer.start(
            settings.time_limit_secs().map(Duration::from_secs),
            move || held.is_latched(),
            move || {
                let Some(ticket) = expiring.try_begin(TriggerSource::TimerExpiry) else {
                    return;
                };
                if let Some(session) = session.upgrade() {
                    drop(session.spawn_submission(expiring, ticket));
                }
            },
        );

        *runtime = Some(AttemptRuntime { guard, timer });
        tracing::info!(
            session_id = %self.id,
            quiz_id,
            time_limit_minutes = ?settings.time_limit_minutes,
            "quiz attempt started"
        );
        Ok(outcome)
    }

    pub async fn record_choice(&self, question_id: &str, option: &str) -> bool {
        self.mutate(|store| store.record_choice(question_id, option)).await
    }

    pub async fn record_text(&self, question_id: &str, text: &str) -> bool {
        self.mutate(|store| store.record_text(question_id, text)).await
    }

    pub async fn clear_answer(&self, question_id: &str) -> bool {
        self.mutate(|store| store.clear_answer(question_id)).await
    }

    /// The latch is checked under the store write lock, so a mutation either
    /// lands before the payload is built or not at all.
    async fn mutate<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut AnswerStore) -> bool,
    {
        let mut store = self.store.write().await;
        if self.current_guard().await.map(|g| g.is_latched()).unwrap_or(true) {
            tracing::debug!(session_id = %self.id, "answer change ignored, attempt locked");
            return false;
        }
        f(&mut store)
    }

    /// Manual submit. The request runs in its own task so a dropped caller
    /// cannot abort a latched submission.
    pub async fn submit(&self) -> Result<SubmitOutcome> {
        let guard = self
            .current_guard()
            .await
            .ok_or_else(|| Error::BadRequest("no quiz is loaded".to_string()))?;

        let Some(ticket) = guard.try_begin(TriggerSource::Manual) else {
            return Ok(SubmitOutcome {
                accepted: false,
                phase: guard.phase(),
                receipt: None,
            });
        };

        let receipt = self
            .spawn_submission(guard.clone(), ticket)
            .await
            .map_err(|e| Error::Internal(format!("submission task failed: {}", e)))??;
        Ok(SubmitOutcome {
            accepted: true,
            phase: guard.phase(),
            receipt: Some(receipt),
        })
    }

    fn spawn_submission(
        &self,
        guard: Arc<SubmissionGuard>,
        ticket: SubmissionTicket,
    ) -> tokio::task::JoinHandle<Result<SubmissionReceipt>> {
        let store = self.store.clone();
        let backend = self.backend.clone();
        let session = self.me.clone();
        tokio::spawn(async move {
            let result = guard.submit(ticket, &store, backend.as_ref()).await;
            if let Some(session) = session.upgrade() {
                session.stop_timer(&guard).await;
            }
            result
        })
    }

    /// Submitted or failed, the attempt has no use for its clock anymore.
    async fn stop_timer(&self, guard: &Arc<SubmissionGuard>) {
        if let Some(runtime) = self.runtime.lock().await.as_mut() {
            if Arc::ptr_eq(&runtime.guard, guard) {
                runtime.timer.stop();
            }
        }
    }

    /// True while a timed attempt is still counting down.
    pub async fn is_counting_down(&self) -> bool {
        self.runtime
            .lock()
            .await
            .as_ref()
            .map(|r| r.timer.state() == TimerState::Running)
            .unwrap_or(false)
    }

    pub async fn scroll_to_question(&self, index: i64) -> Option<ScrollTarget> {
        let store = self.store.read().await;
        let attempt = store.attempt()?;
        self.navigation
            .lock()
            .await
            .scroll_to_question(attempt, index)
    }

    pub async fn panel(&self) -> Vec<PanelEntry> {
        let store = self.store.read().await;
        match store.attempt() {
            Some(attempt) => self.navigation.lock().await.panel(attempt),
            None => Vec::new(),
        }
    }

    pub async fn view(&self) -> QuizView {
        let store = self.store.read().await;
        match store.attempt() {
            Some(attempt) => {
                let locked = self
                    .current_guard()
                    .await
                    .map(|g| g.is_latched())
                    .unwrap_or(false);
                reveal::render(attempt, locked)
            }
            None => match self.load_error.lock().await.clone() {
                Some(message) => QuizView::Unavailable { message },
                None => QuizView::Empty,
            },
        }
    }

    pub async fn progress(&self) -> AttemptProgress {
        let store = self.store.read().await;
        let runtime = self.runtime.lock().await;
        let guard = runtime.as_ref().map(|r| &r.guard);
        let remaining = runtime.as_ref().and_then(|r| r.timer.remaining());
        let last_error = match guard.and_then(|g| g.failure()) {
            Some(msg) => Some(msg.to_string()),
            None => self.load_error.lock().await.clone(),
        };

        AttemptProgress {
            quiz_id: store.quiz_id().map(str::to_string),
            phase: guard.map(|g| g.phase()).unwrap_or(SubmissionPhase::NotStarted),
            triggered_by: guard.and_then(|g| g.winner()),
            submitted: store.is_submitted(),
            answered: store.answered_count(),
            total: store.attempt().map(|a| a.questions.len()).unwrap_or(0),
            timer: runtime
                .as_ref()
                .map(|r| r.timer.state())
                .unwrap_or(TimerState::Idle),
            remaining_seconds: remaining.map(|d| d.as_secs()),
            countdown: remaining.map(format_countdown),
            started_at: store.attempt().map(|a| a.started_at),
            last_error,
        }
    }

    /// Unmount: cancels the timer and forgets the attempt. A submission that
    /// is already in flight still completes against the backend.
    pub async fn teardown(&self) {
        let mut store = self.store.write().await;
        if let Some(mut runtime) = self.runtime.lock().await.take() {
            runtime.timer.cancel();
        }
        store.reset();
        self.navigation.lock().await.reset();
        *self.load_error.lock().await = None;
        tracing::debug!(session_id = %self.id, "session torn down");
    }

    async fn current_guard(&self) -> Option<Arc<SubmissionGuard>> {
        self.runtime.lock().await.as_ref().map(|r| r.guard.clone())
    }
}
