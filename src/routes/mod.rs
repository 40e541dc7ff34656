pub mod health;
pub mod player;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

pub fn router(state: AppState) -> Router {
    let player_api = Router::new()
        .route("/api/player/sessions", post(player::mount_session))
        .route(
            "/api/player/sessions/:session_id",
            get(player::get_view).delete(player::unmount_session),
        )
        .route(
            "/api/player/sessions/:session_id/quizzes/:quiz_id",
            post(player::load_quiz),
        )
        .route(
            "/api/player/sessions/:session_id/questions/:question_id/choice",
            put(player::record_choice),
        )
        .route(
            "/api/player/sessions/:session_id/questions/:question_id/text",
            put(player::record_text),
        )
        .route(
            "/api/player/sessions/:session_id/questions/:question_id/answer",
            delete(player::clear_answer),
        )
        .route(
            "/api/player/sessions/:session_id/submit",
            post(player::submit),
        )
        .route(
            "/api/player/sessions/:session_id/progress",
            get(player::get_progress),
        )
        .route(
            "/api/player/sessions/:session_id/navigation",
            get(player::get_panel),
        )
        .route(
            "/api/player/sessions/:session_id/navigation/:index",
            get(player::scroll_to_question),
        );

    Router::new()
        .route("/health", get(health::health))
        .merge(player_api)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
