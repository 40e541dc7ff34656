use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::services::backend::QuizBackend;
use crate::services::quiz_session::{QuizSession, SessionOptions};

struct MountedSession {
    session: Arc<QuizSession>,
    last_seen: Instant,
}

/// Mounted quiz pages, keyed by session id.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, MountedSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn mount(
        &self,
        backend: Arc<dyn QuizBackend>,
        options: SessionOptions,
    ) -> Arc<QuizSession> {
        let session = QuizSession::new(backend, options);
        self.sessions.write().await.insert(
            session.id(),
            MountedSession {
                session: session.clone(),
                last_seen: Instant::now(),
            },
        );
        tracing::info!(session_id = %session.id(), "quiz page mounted");
        session
    }

    /// Looks a session up and marks it as seen.
    pub async fn get(&self, id: Uuid) -> Result<Arc<QuizSession>> {
        let mut sessions = self.sessions.write().await;
        let mounted = sessions
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("session {} is not mounted", id)))?;
        mounted.last_seen = Instant::now();
        Ok(mounted.session.clone())
    }

    pub async fn unmount(&self, id: Uuid) -> Result<()> {
        let mounted = self
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| Error::NotFound(format!("session {} is not mounted", id)))?;
        mounted.session.teardown().await;
        tracing::info!(session_id = %id, "quiz page unmounted");
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Unmounts pages nobody has touched for `max_idle`. A page whose timer
    /// is still counting down is kept so its expiry can still submit.
    pub async fn sweep_idle(&self, max_idle: Duration) -> usize {
        let candidates: Vec<(Uuid, Arc<QuizSession>)> = {
            let now = Instant::now();
            self.sessions
                .read()
                .await
                .iter()
                .filter(|(_, m)| now.duration_since(m.last_seen) >= max_idle)
                .map(|(id, m)| (*id, m.session.clone()))
                .collect()
        };

        let mut evicted = Vec::new();
        for (id, session) in candidates {
            if session.is_counting_down().await {
                continue;
            }
            let mut sessions = self.sessions.write().await;
            let still_idle = sessions
                .get(&id)
                .map(|m| Instant::now().duration_since(m.last_seen) >= max_idle)
                .unwrap_or(false);
            if still_idle {
                if let Some(mounted) = sessions.remove(&id) {
                    evicted.push(mounted.session);
                }
            }
        }

        for session in &evicted {
            session.teardown().await;
            tracing::info!(session_id = %session.id(), "idle quiz page evicted");
        }
        evicted.len()
    }

    pub fn spawn_sweeper(&self, every: Duration, max_idle: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = registry.sweep_idle(max_idle).await;
                if evicted > 0 {
                    tracing::debug!(evicted, "session sweep finished");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quiz::{QuizDefinition, QuizInfo, RawQuizSettings};
    use crate::services::answer_store::tests::sample_questions;
    use crate::services::backend::MockQuizBackend;

    fn timed_backend() -> Arc<dyn QuizBackend> {
        let mut backend = MockQuizBackend::new();
        backend.expect_fetch_quiz().returning(|_| {
            Ok(QuizDefinition {
                quiz_info: QuizInfo {
                    title: "Sample".into(),
                    description: None,
                    settings: RawQuizSettings {
                        time_limit_minutes: Some(90),
                        ..Default::default()
                    },
                },
                quiz_questions: sample_questions(),
            })
        });
        Arc::new(backend)
    }

    #[tokio::test]
    async fn mount_get_unmount() {
        let registry = SessionRegistry::new();
        let backend: Arc<dyn QuizBackend> = Arc::new(MockQuizBackend::new());
        let session = registry.mount(backend, SessionOptions::default()).await;

        assert_eq!(registry.get(session.id()).await.unwrap().id(), session.id());
        assert_eq!(registry.len().await, 1);

        registry.unmount(session.id()).await.unwrap();
        assert_eq!(registry.len().await, 0);
        assert!(matches!(
            registry.get(session.id()).await,
            Err(Error::NotFound(_))
        ));
        assert!(registry.unmount(session.id()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_evicts_only_idle_pages() {
        let registry = SessionRegistry::new();
        let backend: Arc<dyn QuizBackend> = Arc::new(MockQuizBackend::new());
        let abandoned = registry.mount(backend.clone(), SessionOptions::default()).await;
        let active = registry.mount(backend, SessionOptions::default()).await;

        tokio::time::sleep(Duration::from_secs(20 * 60)).await;
        registry.get(active.id()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(15 * 60)).await;

        assert_eq!(registry.sweep_idle(Duration::from_secs(30 * 60)).await, 1);
        assert!(registry.get(abandoned.id()).await.is_err());
        assert!(registry.get(active.id()).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn running_countdown_survives_the_sweep() {
        let registry = SessionRegistry::new();
        let session = registry
            .mount(timed_backend(), SessionOptions::default())
            .await;
        session.load("quiz-1").await.unwrap();

        tokio::time::sleep(Duration::from_millis(45 * 60 * 1000 + 500)).await;
        assert_eq!(registry.sweep_idle(Duration::from_secs(30 * 60)).await, 0);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_task_evicts_in_the_background() {
        let registry = SessionRegistry::new();
        let backend: Arc<dyn QuizBackend> = Arc::new(MockQuizBackend::new());
        registry.mount(backend, SessionOptions::default()).await;

        let sweeper = registry.spawn_sweeper(Duration::from_secs(60), Duration::from_secs(300));
        tokio::time::sleep(Duration::from_secs(400)).await;
        assert_eq!(registry.len().await, 0);
        sweeper.abort();
    }
}
