//! JSON REST API for qcboard.
//!
//! Exposes an axum [`Router`] backed by any [`qcboard_core::store::MachineStore`].
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", qcboard_api::api_router(store.clone()))
//! ```

pub mod due;
pub mod error;
pub mod machines;
pub mod qc;

use std::sync::Arc;

use axum::{
  Json, Router,
  routing::get,
};
use qcboard_core::store::MachineStore;
use serde_json::{Value, json};

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: MachineStore + 'static,
{
  Router::new()
    .route("/health", get(health))
    // Machines
    .route("/machines", get(machines::list::<S>).post(machines::create::<S>))
    .route(
      "/machines/{id}",
      get(machines::get_one::<S>).patch(machines::update::<S>),
    )
    // QC log
    .route("/machines/{id}/qc", get(qc::history::<S>).post(qc::record::<S>))
    // Due status
    .route("/machines/{id}/due", get(due::machine::<S>))
    .route("/due", get(due::board::<S>))
    .with_state(store)
}

/// `GET /health`
async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }

// ─── Router tests ─────────────────────────────────────────────────────────────
