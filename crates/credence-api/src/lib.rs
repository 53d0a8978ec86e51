//! JSON REST API for the credence belief graph.
//!
//! Exposes an axum [`Router`] backed by a shared
//! [`BeliefEngine`](credence_core::engine::BeliefEngine) over any
//! [`BeliefStore`]. Auth, TLS, and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", credence_api::api_router(engine.clone()))
//! ```

pub mod beliefs;
pub mod edges;
pub mod error;
pub mod maintenance;
pub mod outcomes;
pub mod strength;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use credence_core::{context::ContextKey, engine::BeliefEngine, store::BeliefStore};

pub use error::ApiError;

/// Build a fully-materialised API router for `engine`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(engine: Arc<BeliefEngine<S>>) -> Router<()>
where
  S: BeliefStore + 'static,
{
  Router::new()
    // Beliefs
    .route("/beliefs", get(beliefs::list::<S>).post(beliefs::create::<S>))
    .route("/beliefs/{id}", get(beliefs::get_one::<S>))
    .route("/beliefs/{id}/audit", get(beliefs::audit::<S>))
    .route("/beliefs/{id}/archive", post(beliefs::archive::<S>))
    .route("/beliefs/{id}/supersede", post(beliefs::supersede::<S>))
    // Outcomes
    .route("/beliefs/{id}/outcomes", post(outcomes::record::<S>))
    .route("/beliefs/{id}/outcomes/batch", post(outcomes::record_batch::<S>))
    // Reads
    .route("/beliefs/{id}/events", get(outcomes::list::<S>))
    .route("/beliefs/{id}/strength", get(strength::current::<S>))
    .route("/beliefs/{id}/history", get(strength::as_of::<S>))
    // Graph
    .route("/edges", post(edges::create::<S>))
    // Maintenance
    .route("/maintenance/prune", post(maintenance::prune::<S>))
    .route("/maintenance/rebuild", post(maintenance::rebuild::<S>))
    .with_state(engine)
}

/// Parse a `?context=` value, defaulting to the all-wildcard key.
pub(crate) fn context_or_global<S: BeliefStore>(
  engine: &BeliefEngine<S>,
  context: Option<&str>,
) -> ContextKey {
  match context {
    Some(s) => ContextKey::parse(s),
    None => ContextKey::global(engine.config().arity()),
  }
}
