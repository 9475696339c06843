//! HTTP boundary for the scribe job orchestrator.

pub mod api;
pub mod metrics;
pub mod state;

pub use api::create_router;
pub use state::AppState;
