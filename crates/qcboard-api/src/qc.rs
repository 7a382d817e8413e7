//! Handlers for a machine's QC log.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/machines/{id}/qc` | Optional `?since=YYYY-MM-DD`; newest first |
//! | `POST` | `/machines/{id}/qc` | Body: [`QcEvent`]; returns 201 + record and updated machine |

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
use qcboard_core::{
  due::parse_date,
  machine::Machine,
  qc::{QcEvent, QcRecord},
  store::MachineStore,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
  pub since: Option<String>,
}

/// `GET /machines/{id}/qc[?since=...]`
pub async fn history<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<String>,
  params: Result<Query<HistoryParams>, QueryRejection>,
) -> Result<Json<Vec<QcRecord>>, ApiError>
where
  S: MachineStore,
{
  let Query(params) = params?;
  let since = params.since.as_deref().map(parse_date).transpose()?;
  let records = store
    .qc_history(&id, since)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(records))
}

/// Response body for a logged QC event.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecordedQc {
  pub record:  QcRecord,
  pub machine: Machine,
}

/// `POST /machines/{id}/qc`
pub async fn record<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<String>,
  body: Result<Json<QcEvent>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: MachineStore,
{
  let Json(event) = body?;
  let (record, machine) = store
    .record_qc(&id, event)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(RecordedQc { record, machine })))
}
