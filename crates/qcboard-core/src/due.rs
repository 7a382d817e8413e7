//! Due-status evaluation.
//!
//! [`evaluate`] is a pure function of a cadence, that cadence's QC history,
//! and the current date. It walks backward from today over a lookback window
//! and classifies the machine as on track, due today, or overdue. Days that
//! are not applicable to the cadence are skipped entirely.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, cadence::Cadence, machine::Machine};

// ─── History ─────────────────────────────────────────────────────────────────

/// One day of QC history for one cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QcHistoryEntry {
  pub date:      NaiveDate,
  pub completed: bool,
}

impl QcHistoryEntry {
  pub fn completed(date: NaiveDate) -> Self { Self { date, completed: true } }

  pub fn missed(date: NaiveDate) -> Self { Self { date, completed: false } }
}

/// Per-cadence history; each cadence carries its own entries.
pub type QcHistory = BTreeMap<Cadence, Vec<QcHistoryEntry>>;

// ─── Result types ────────────────────────────────────────────────────────────

/// Classification of QC compliance. Ordered by severity.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum DueStatus {
  OnTrack,
  DueToday,
  Overdue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DueReport {
  pub status:             DueStatus,
  /// Earliest uncovered applicable day: `None` when on track, today when due
  /// today.
  pub first_missing_date: Option<NaiveDate>,
}

impl DueReport {
  pub const ON_TRACK: Self = Self { status: DueStatus::OnTrack, first_missing_date: None };
}

// ─── Query ───────────────────────────────────────────────────────────────────

/// Input to [`evaluate`] besides the history itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueQuery {
  pub cadence:       Cadence,
  pub today:         NaiveDate,
  /// Lookback length in calendar days including today. Defaults to
  /// [`Cadence::default_window_days`].
  pub window_days:   Option<u32>,
  /// Applicable days before this date are skipped. Defaults to the earliest
  /// history entry; with an empty history the window is unbounded.
  ///
  /// The default assumes the history is complete from its first entry on.
  /// Callers holding a sparse or truncated history must pass an explicit
  /// start, or misses before the first entry are not reported.
  pub tracked_since: Option<NaiveDate>,
}

impl DueQuery {
  pub fn new(cadence: Cadence, today: NaiveDate) -> Self {
    Self { cadence, today, window_days: None, tracked_since: None }
  }

  pub fn with_window_days(mut self, days: u32) -> Self {
    self.window_days = Some(days);
    self
  }

  pub fn with_tracked_since(mut self, date: NaiveDate) -> Self {
    self.tracked_since = Some(date);
    self
  }
}

// ─── Evaluation ──────────────────────────────────────────────────────────────

/// Classify one cadence. History may be in any order; duplicate dates are
/// fine and any completed entry covers its date.
pub fn evaluate(query: &DueQuery, history: &[QcHistoryEntry]) -> DueReport {
  let today = query.today;
  let window = query
    .window_days
    .unwrap_or_else(|| query.cadence.default_window_days(today));
  if window == 0 {
    return DueReport::ON_TRACK;
  }

  let window_start = today
    .checked_sub_days(Days::new(u64::from(window - 1)))
    .unwrap_or(NaiveDate::MIN);
  let tracked_since = query
    .tracked_since
    .or_else(|| history.iter().map(|e| e.date).min());
  let floor = tracked_since.map_or(window_start, |d| d.max(window_start));

  let completions: BTreeSet<NaiveDate> = history
    .iter()
    .filter(|e| e.completed)
    .map(|e| e.date)
    .collect();

  let mut due_today = false;
  let mut first_missing = None;
  let mut day = today;
  while day >= floor {
    if query.cadence.is_applicable(day)
      && !query
        .cadence
        .period_containing(day)
        .is_covered(&completions, today)
    {
      if day == today {
        due_today = true;
      } else {
        // Walking backward, so the last hit is the earliest.
        first_missing = Some(day);
      }
    }
    match day.pred_opt() {
      Some(prev) => day = prev,
      None => break,
    }
  }

  match (first_missing, due_today) {
    (Some(date), _) => DueReport {
      status:             DueStatus::Overdue,
      first_missing_date: Some(date),
    },
    (None, true) => DueReport {
      status:             DueStatus::DueToday,
      first_missing_date: Some(today),
    },
    (None, false) => DueReport::ON_TRACK,
  }
}

/// Parse a caller-supplied date. Accepts `YYYY-MM-DD` or an RFC 3339
/// timestamp (whose calendar date is used).
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
  let trimmed = raw.trim();
  if let Ok(date) = trimmed.parse::<NaiveDate>() {
    return Ok(date);
  }
  DateTime::parse_from_rfc3339(trimmed)
    .map(|dt| dt.date_naive())
    .map_err(|_| Error::InvalidDate(raw.to_owned()))
}

/// [`evaluate`] with an unparsed `today` and default window.
pub fn evaluate_at(
  cadence: Cadence,
  history: &[QcHistoryEntry],
  today: &str,
) -> Result<DueReport> {
  let today = parse_date(today)?;
  Ok(evaluate(&DueQuery::new(cadence, today), history))
}

// ─── Machine-level roll-up ───────────────────────────────────────────────────

/// Due status across every cadence enabled on a machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineDueReport {
  pub machine_id:         String,
  pub today:              NaiveDate,
  /// Worst status across cadences.
  pub status:             DueStatus,
  /// Earliest missing date among cadences sharing the worst status.
  pub first_missing_date: Option<NaiveDate>,
  pub cadences:           BTreeMap<Cadence, DueReport>,
}

/// Evaluate every enabled cadence of `machine`, tracking from its
/// installation date.
pub fn evaluate_machine(
  machine: &Machine,
  history: &QcHistory,
  today: NaiveDate,
) -> MachineDueReport {
  let cadences: BTreeMap<Cadence, DueReport> = machine
    .qc_schedule
    .cadences()
    .map(|cadence| {
      let entries = history.get(&cadence).map(Vec::as_slice).unwrap_or(&[]);
      let query = DueQuery::new(cadence, today)
        .with_tracked_since(machine.installation_date);
      (cadence, evaluate(&query, entries))
    })
    .collect();

  let status = cadences
    .values()
    .map(|r| r.status)
    .max()
    .unwrap_or(DueStatus::OnTrack);
  let first_missing_date = cadences
    .values()
    .filter(|r| r.status == status)
    .filter_map(|r| r.first_missing_date)
    .min();

  tracing::debug!(
    machine_id = %machine.machine_id,
    %today,
    ?status,
    "evaluated due status"
  );

  MachineDueReport {
    machine_id: machine.machine_id.clone(),
    today,
    status,
    first_missing_date,
    cadences,
  }
}
