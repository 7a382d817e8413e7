//! Due-status handlers.
//!
//! The store only loads data; classification is done here by the pure
//! evaluator in [`qcboard_core::due`].

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State, rejection::QueryRejection},
};
use chrono::{NaiveDate, Utc};
use qcboard_core::{
  due::{DueStatus, MachineDueReport, evaluate_machine, parse_date},
  qc::group_history,
  store::{MachineFilter, MachineStore},
};
use serde::Deserialize;

use crate::error::ApiError;

const PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
pub struct DueParams {
  /// Evaluation date; defaults to the current UTC date.
  pub today: Option<String>,
}

impl DueParams {
  fn today(&self) -> Result<NaiveDate, ApiError> {
    match self.today.as_deref() {
      Some(raw) => Ok(parse_date(raw)?),
      None => Ok(Utc::now().date_naive()),
    }
  }
}

/// `GET /machines/{id}/due[?today=...]`
pub async fn machine<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<String>,
  params: Result<Query<DueParams>, QueryRejection>,
) -> Result<Json<MachineDueReport>, ApiError>
where
  S: MachineStore,
{
  let Query(params) = params?;
  let today = params.today()?;

  let machine = store
    .get_machine(&id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("machine {id} not found")))?;
  let log = store
    .qc_history(&id, None)
    .await
    .map_err(ApiError::from_store)?;

  Ok(Json(evaluate_machine(&machine, &group_history(&log), today)))
}

/// `GET /due[?today=...]`: every machine that is due today or overdue,
/// overdue first.
pub async fn board<S>(
  State(store): State<Arc<S>>,
  params: Result<Query<DueParams>, QueryRejection>,
) -> Result<Json<Vec<MachineDueReport>>, ApiError>
where
  S: MachineStore,
{
  let Query(params) = params?;
  let today = params.today()?;

  let mut reports = Vec::new();
  let mut offset = 0;
  loop {
    let filter = MachineFilter {
      limit: Some(PAGE_SIZE),
      offset: Some(offset),
      ..Default::default()
    };
    let page = store
      .list_machines(&filter)
      .await
      .map_err(ApiError::from_store)?;

    for machine in &page {
      let log = store
        .qc_history(&machine.machine_id, None)
        .await
        .map_err(ApiError::from_store)?;
      let report = evaluate_machine(machine, &group_history(&log), today);
      if report.status != DueStatus::OnTrack {
        reports.push(report);
      }
    }

    if page.len() < PAGE_SIZE {
      break;
    }
    offset += PAGE_SIZE;
  }

  reports.sort_by(|a, b| {
    b.status
      .cmp(&a.status)
      .then_with(|| a.first_missing_date.cmp(&b.first_missing_date))
      .then_with(|| a.machine_id.cmp(&b.machine_id))
  });
  tracing::debug!(%today, flagged = reports.len(), "due board evaluated");
  Ok(Json(reports))
}
