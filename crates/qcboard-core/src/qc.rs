//! QC events: the append-only log that drives a machine's derived fields.
//!
//! Logging an event never edits earlier events. It re-derives `lastQC`,
//! `status` and `nextQCDue` on the machine from the full log, so recording
//! the same event twice leaves those fields where one recording put them.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  cadence::Cadence,
  due::{QcHistory, QcHistoryEntry},
  machine::{LastQc, Machine, MachineStatus, QcResult, QcSchedule},
};

/// Input to [`crate::store::MachineStore::record_qc`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QcEvent {
  pub cadence:      Cadence,
  pub date:         NaiveDate,
  pub result:       QcResult,
  pub performed_by: String,
  #[serde(default)]
  pub notes:        Option<String>,
}

impl QcEvent {
  /// Check the event against the machine it is being logged for.
  pub fn validate(&self, machine: &Machine) -> Result<()> {
    if self.performed_by.trim().is_empty() {
      return Err(Error::validation("performedBy is required"));
    }
    if !machine.qc_schedule.is_enabled(self.cadence) {
      return Err(Error::Validation(format!(
        "{} QC is not scheduled for machine {}",
        self.cadence, machine.machine_id
      )));
    }
    Ok(())
  }
}

/// A logged QC event. Never updated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QcRecord {
  pub event_id:     Uuid,
  pub machine_id:   String,
  pub cadence:      Cadence,
  pub date:         NaiveDate,
  pub result:       QcResult,
  pub performed_by: String,
  pub notes:        Option<String>,
  /// Server-assigned.
  pub recorded_at:  DateTime<Utc>,
}

impl QcRecord {
  pub fn new(machine_id: &str, event: QcEvent, recorded_at: DateTime<Utc>) -> Self {
    Self {
      event_id: Uuid::new_v4(),
      machine_id: machine_id.to_owned(),
      cadence: event.cadence,
      date: event.date,
      result: event.result,
      performed_by: event.performed_by,
      notes: event.notes,
      recorded_at,
    }
  }

  /// Every logged check counts as performed, whatever its result.
  pub fn history_entry(&self) -> QcHistoryEntry { QcHistoryEntry::completed(self.date) }
}

/// Bucket a log into per-cadence history, most recent first.
pub fn group_history(records: &[QcRecord]) -> QcHistory {
  let mut history = QcHistory::new();
  for record in records {
    history
      .entry(record.cadence)
      .or_default()
      .push(record.history_entry());
  }
  for entries in history.values_mut() {
    entries.sort_by(|a, b| b.date.cmp(&a.date));
  }
  history
}

/// Earliest unsatisfied deadline on or after `from` across the enabled
/// cadences.
pub fn next_qc_due(
  schedule: &QcSchedule,
  history: &QcHistory,
  from: NaiveDate,
) -> Option<NaiveDate> {
  schedule
    .cadences()
    .filter_map(|cadence| {
      let completions: BTreeSet<NaiveDate> = history
        .get(&cadence)
        .into_iter()
        .flatten()
        .filter(|e| e.completed)
        .map(|e| e.date)
        .collect();
      cadence.next_deadline(&completions, from)
    })
    .min()
}

/// Re-derive `lastQC`, `status` and `nextQCDue` after `record` has been
/// appended to `log` (which must already contain it).
///
/// Only an event dated on or after the current `lastQC` moves `lastQC` and
/// `status`; a back-dated event still counts toward `nextQCDue`.
pub fn apply_record(
  machine: &mut Machine,
  record: &QcRecord,
  log: &[QcRecord],
  now: DateTime<Utc>,
) {
  let is_latest = machine
    .last_qc
    .as_ref()
    .is_none_or(|last| record.date >= last.date);
  if is_latest {
    machine.last_qc = Some(LastQc {
      date:         record.date,
      result:       record.result,
      performed_by: record.performed_by.clone(),
      notes:        record.notes.clone(),
    });
    machine.status = match (record.result, machine.status) {
      (QcResult::Fail, _) => MachineStatus::Critical,
      (QcResult::Pass, MachineStatus::Critical) => MachineStatus::Operational,
      (_, status) => status,
    };
  }

  refresh_next_due(machine, log, record.date);
  machine.updated_at = now;
}

/// Recompute `nextQCDue` from `log` under the machine's current schedule,
/// starting at the latest logged date, or at `fallback` when the log is
/// empty. Leaves the field alone if no enabled cadence has a deadline.
pub fn refresh_next_due(machine: &mut Machine, log: &[QcRecord], fallback: NaiveDate) {
  let from = log.iter().map(|r| r.date).max().unwrap_or(fallback);
  if let Some(due) = next_qc_due(&machine.qc_schedule, &group_history(log), from) {
    machine.next_qc_due = due;
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;
  use crate::machine::MachineType;

  fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
  }

  fn now() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 6, 5, 9, 0, 0).unwrap() }

  fn machine(schedule: QcSchedule) -> Machine {
    Machine {
      machine_id:        "PET-2".into(),
      name:              "PET".into(),
      machine_type:      MachineType::Pet,
      manufacturer:      "Philips".into(),
      model:             "Vereos".into(),
      serial_number:     "P2".into(),
      location:          None,
      installation_date: d(2022, 1, 3),
      status:            MachineStatus::Operational,
      last_qc:           None,
      next_qc_due:       d(2024, 6, 3),
      qc_schedule:       schedule,
      created_at:        now(),
      updated_at:        now(),
    }
  }

  fn event(cadence: Cadence, date: NaiveDate, result: QcResult) -> QcEvent {
    QcEvent {
      cadence,
      date,
      result,
      performed_by: "J. Tech".into(),
      notes: None,
    }
  }

  fn log_one(m: &mut Machine, log: &mut Vec<QcRecord>, e: QcEvent) {
    let record = QcRecord::new(&m.machine_id, e, now());
    log.push(record.clone());
    apply_record(m, &record, log, now());
  }

  #[test]
  fn event_must_match_an_enabled_cadence() {
    let m = machine(QcSchedule::only(Cadence::Daily));
    let e = event(Cadence::Weekly, d(2024, 6, 3), QcResult::Pass);
    assert!(matches!(e.validate(&m), Err(Error::Validation(_))));

    let mut e = event(Cadence::Daily, d(2024, 6, 3), QcResult::Pass);
    e.performed_by = " ".into();
    assert!(matches!(e.validate(&m), Err(Error::Validation(_))));
  }

  #[test]
  fn daily_pass_moves_next_due_to_next_business_day() {
    let mut m = machine(QcSchedule::only(Cadence::Daily));
    let mut log = Vec::new();
    // Friday 2024-06-07.
    log_one(&mut m, &mut log, event(Cadence::Daily, d(2024, 6, 7), QcResult::Pass));

    assert_eq!(m.next_qc_due, d(2024, 6, 10));
    assert_eq!(m.last_qc.as_ref().unwrap().date, d(2024, 6, 7));
    assert_eq!(m.status, MachineStatus::Operational);
  }

  #[test]
  fn next_due_is_earliest_across_cadences() {
    let schedule = QcSchedule { daily: true, monthly: true, ..Default::default() };
    let mut m = machine(schedule);
    let mut log = Vec::new();
    log_one(&mut m, &mut log, event(Cadence::Monthly, d(2024, 6, 3), QcResult::Pass));
    // Monthly covered for June; daily for Monday is still open.
    assert_eq!(m.next_qc_due, d(2024, 6, 3));

    log_one(&mut m, &mut log, event(Cadence::Daily, d(2024, 6, 3), QcResult::Pass));
    assert_eq!(m.next_qc_due, d(2024, 6, 4));
  }

  #[test]
  fn fail_marks_critical_and_pass_recovers() {
    let mut m = machine(QcSchedule::only(Cadence::Daily));
    let mut log = Vec::new();
    log_one(&mut m, &mut log, event(Cadence::Daily, d(2024, 6, 3), QcResult::Fail));
    assert_eq!(m.status, MachineStatus::Critical);

    log_one(&mut m, &mut log, event(Cadence::Daily, d(2024, 6, 4), QcResult::Conditional));
    assert_eq!(m.status, MachineStatus::Critical);

    log_one(&mut m, &mut log, event(Cadence::Daily, d(2024, 6, 5), QcResult::Pass));
    assert_eq!(m.status, MachineStatus::Operational);
  }

  #[test]
  fn pass_does_not_clear_manual_maintenance() {
    let mut m = machine(QcSchedule::only(Cadence::Daily));
    m.status = MachineStatus::Maintenance;
    let mut log = Vec::new();
    log_one(&mut m, &mut log, event(Cadence::Daily, d(2024, 6, 3), QcResult::Pass));
    assert_eq!(m.status, MachineStatus::Maintenance);
  }

  #[test]
  fn backdated_event_does_not_replace_last_qc_or_regress_next_due() {
    let mut m = machine(QcSchedule::only(Cadence::Daily));
    let mut log = Vec::new();
    log_one(&mut m, &mut log, event(Cadence::Daily, d(2024, 6, 5), QcResult::Pass));
    log_one(&mut m, &mut log, event(Cadence::Daily, d(2024, 6, 3), QcResult::Pass));

    assert_eq!(m.last_qc.as_ref().unwrap().date, d(2024, 6, 5));
    assert_eq!(m.next_qc_due, d(2024, 6, 6));
  }

  #[test]
  fn backdated_fail_does_not_override_newer_pass() {
    let mut m = machine(QcSchedule::only(Cadence::Daily));
    let mut log = Vec::new();
    log_one(&mut m, &mut log, event(Cadence::Daily, d(2024, 6, 5), QcResult::Pass));
    log_one(&mut m, &mut log, event(Cadence::Daily, d(2024, 6, 3), QcResult::Fail));

    let last = m.last_qc.as_ref().unwrap();
    assert_eq!((last.date, last.result), (d(2024, 6, 5), QcResult::Pass));
    assert_eq!(m.status, MachineStatus::Operational);
  }

  #[test]
  fn backdated_pass_does_not_clear_newer_fail() {
    let mut m = machine(QcSchedule::only(Cadence::Daily));
    let mut log = Vec::new();
    log_one(&mut m, &mut log, event(Cadence::Daily, d(2024, 6, 5), QcResult::Fail));
    log_one(&mut m, &mut log, event(Cadence::Daily, d(2024, 6, 4), QcResult::Pass));
    assert_eq!(m.status, MachineStatus::Critical);
  }

  #[test]
  fn refresh_next_due_follows_schedule_change() {
    let schedule = QcSchedule { daily: true, annual: true, ..Default::default() };
    let mut m = machine(schedule);
    let mut log = Vec::new();
    log_one(&mut m, &mut log, event(Cadence::Daily, d(2024, 6, 5), QcResult::Pass));
    assert_eq!(m.next_qc_due, d(2024, 6, 6));

    m.qc_schedule = QcSchedule::only(Cadence::Annual);
    refresh_next_due(&mut m, &log, d(2024, 6, 1));
    // Last business day of 2024.
    assert_eq!(m.next_qc_due, d(2024, 12, 31));
  }

  #[test]
  fn refresh_next_due_uses_fallback_for_empty_log() {
    let mut m = machine(QcSchedule::only(Cadence::Weekly));
    // Wednesday; the ISO week ends on Friday 2024-06-07.
    refresh_next_due(&mut m, &[], d(2024, 6, 5));
    assert_eq!(m.next_qc_due, d(2024, 6, 7));
  }

  #[test]
  fn recording_twice_is_idempotent_for_derived_fields() {
    let mut m = machine(QcSchedule::only(Cadence::Daily));
    let mut log = Vec::new();
    let e = event(Cadence::Daily, d(2024, 6, 4), QcResult::Pass);
    log_one(&mut m, &mut log, e.clone());
    let once = m.clone();
    log_one(&mut m, &mut log, e);
    assert_eq!(m, once);
  }

  #[test]
  fn group_history_buckets_by_cadence_newest_first() {
    let records: Vec<_> = [
      event(Cadence::Daily, d(2024, 6, 3), QcResult::Pass),
      event(Cadence::Weekly, d(2024, 6, 4), QcResult::Pass),
      event(Cadence::Daily, d(2024, 6, 5), QcResult::Fail),
    ]
    .into_iter()
    .map(|e| QcRecord::new("PET-2", e, now()))
    .collect();

    let history = group_history(&records);
    assert_eq!(
      history[&Cadence::Daily],
      vec![
        QcHistoryEntry::completed(d(2024, 6, 5)),
        QcHistoryEntry::completed(d(2024, 6, 3)),
      ]
    );
    assert_eq!(history[&Cadence::Weekly].len(), 1);
  }
}
