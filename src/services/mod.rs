pub mod answer_store;
pub mod backend;
pub mod countdown;
pub mod navigation;
pub mod quiz_session;
pub mod reveal;
pub mod session_registry;
pub mod submission_guard;
