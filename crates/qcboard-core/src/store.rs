//! The `MachineStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `qcboard-store-sqlite`).
//! Higher layers (`qcboard-api`) depend on this abstraction, not on any
//! concrete backend. Callers hold the store explicitly; nothing here is
//! global.

use std::future::Future;

use chrono::NaiveDate;

use crate::{
  Error,
  machine::{Machine, MachinePatch, MachineStatus, MachineType, NewMachine},
  qc::{QcEvent, QcRecord},
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`MachineStore::list_machines`]. All filters are ANDed.
#[derive(Debug, Clone, Default)]
pub struct MachineFilter {
  pub machine_type:     Option<MachineType>,
  pub status:           Option<MachineStatus>,
  /// Exact match on `location.building`.
  pub building:         Option<String>,
  /// Only machines whose `nextQCDue` is on or before this date.
  pub due_on_or_before: Option<NaiveDate>,
  pub limit:            Option<usize>,
  pub offset:           Option<usize>,
}

// ─── Error seam ──────────────────────────────────────────────────────────────

/// Backend errors expose the domain error behind them, if any, so callers
/// can tell a rejected write from a storage failure.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn as_core(&self) -> Option<&Error>;
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a machine record store.
///
/// Machines are never deleted. Concurrent updates to the same machine are
/// last-write-wins; there are no cross-machine transactions.
pub trait MachineStore: Send + Sync {
  type Error: StoreError;

  // ── Machines ──────────────────────────────────────────────────────────

  /// Validate and persist a new machine.
  ///
  /// Fails with [`Error::Validation`] on a bad field or a `machineId` that
  /// is already registered.
  fn create_machine(
    &self,
    input: NewMachine,
  ) -> impl Future<Output = Result<Machine, Self::Error>> + Send + '_;

  /// Merge `patch` into an existing machine and re-validate.
  ///
  /// Fails with [`Error::NotFound`] if no such machine exists.
  fn update_machine<'a>(
    &'a self,
    machine_id: &'a str,
    patch: MachinePatch,
  ) -> impl Future<Output = Result<Machine, Self::Error>> + Send + 'a;

  /// Retrieve a machine. Returns `None` if not found.
  fn get_machine<'a>(
    &'a self,
    machine_id: &'a str,
  ) -> impl Future<Output = Result<Option<Machine>, Self::Error>> + Send + 'a;

  /// List machines matching `filter`, ordered by `machineId`.
  fn list_machines<'a>(
    &'a self,
    filter: &'a MachineFilter,
  ) -> impl Future<Output = Result<Vec<Machine>, Self::Error>> + Send + 'a;

  // ── QC log ────────────────────────────────────────────────────────────

  /// Append a QC event and re-derive the machine's `lastQC`, `status` and
  /// `nextQCDue`. Returns the logged record and the updated machine.
  fn record_qc<'a>(
    &'a self,
    machine_id: &'a str,
    event: QcEvent,
  ) -> impl Future<Output = Result<(QcRecord, Machine), Self::Error>> + Send + 'a;

  /// Logged QC events for a machine, most recent first, optionally limited
  /// to events dated on or after `since`.
  fn qc_history<'a>(
    &'a self,
    machine_id: &'a str,
    since: Option<NaiveDate>,
  ) -> impl Future<Output = Result<Vec<QcRecord>, Self::Error>> + Send + 'a;
}
