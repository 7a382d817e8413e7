//! Handlers for `/machines` endpoints.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/machines` | Optional `type`, `status`, `building`, `due_on_or_before`, `limit`, `offset` |
//! | `POST`  | `/machines` | Body: [`NewMachine`]; returns 201 + stored machine |
//! | `GET`   | `/machines/{id}` | 404 if not found |
//! | `PATCH` | `/machines/{id}` | Body: [`MachinePatch`] |

use std::sync::Arc;

use axum::{
  Json,
  extract::{
    Path, Query, State,
    rejection::{JsonRejection, QueryRejection},
  },
  http::StatusCode,
  response::IntoResponse,
};
use chrono::NaiveDate;
use qcboard_core::{
  machine::{Machine, MachinePatch, MachineStatus, MachineType, NewMachine},
  store::{MachineFilter, MachineStore},
};
use serde::Deserialize;

use crate::error::ApiError;

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
  #[serde(rename = "type")]
  pub machine_type:     Option<MachineType>,
  pub status:           Option<MachineStatus>,
  pub building:         Option<String>,
  /// Only machines whose `nextQCDue` is on or before this date.
  pub due_on_or_before: Option<NaiveDate>,
  pub limit:            Option<usize>,
  pub offset:           Option<usize>,
}

impl From<ListParams> for MachineFilter {
  fn from(p: ListParams) -> Self {
    MachineFilter {
      machine_type:     p.machine_type,
      status:           p.status,
      building:         p.building,
      due_on_or_before: p.due_on_or_before,
      limit:            p.limit,
      offset:           p.offset,
    }
  }
}

/// `GET /machines[?type=...][&status=...][&building=...][&due_on_or_before=...]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<Machine>>, ApiError>
where
  S: MachineStore,
{
  let Query(params) = params?;
  let machines = store
    .list_machines(&MachineFilter::from(params))
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(machines))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /machines`: returns 201 + the stored [`Machine`].
pub async fn create<S>(
  State(store): State<Arc<S>>,
  body: Result<Json<NewMachine>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: MachineStore,
{
  let Json(body) = body?;
  let machine = store
    .create_machine(body)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(machine)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /machines/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<String>,
) -> Result<Json<Machine>, ApiError>
where
  S: MachineStore,
{
  let machine = store
    .get_machine(&id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("machine {id} not found")))?;
  Ok(Json(machine))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PATCH /machines/{id}`: merges the supplied fields.
pub async fn update<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<String>,
  body: Result<Json<MachinePatch>, JsonRejection>,
) -> Result<Json<Machine>, ApiError>
where
  S: MachineStore,
{
  let Json(patch) = body?;
  let machine = store
    .update_machine(&id, patch)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(machine))
}
