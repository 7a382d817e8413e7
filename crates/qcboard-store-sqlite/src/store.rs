//! [`SqliteStore`]: the SQLite implementation of [`MachineStore`].

use std::path::Path;

use chrono::{NaiveDate, Utc};
use rusqlite::OptionalExtension as _;

use qcboard_core::{
  machine::{Machine, MachinePatch, NewMachine},
  qc::{self, QcEvent, QcRecord},
  store::{MachineFilter, MachineStore},
};

use crate::{
  Error, Result,
  encode::{MACHINE_COLUMNS, QC_COLUMNS, RawMachine, RawQcRecord, encode_date},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A machine store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` in one transaction on the connection thread. The transaction
  /// commits only when `f` returns `Ok`; otherwise it is rolled back on drop.
  async fn transact<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Connection) -> Result<T> + Send + 'static,
  {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let outcome = f(&tx);
        if outcome.is_ok() {
          tx.commit()?;
        }
        Ok(outcome)
      })
      .await?
  }
}

// ─── Row access ──────────────────────────────────────────────────────────────
//
// These run on the connection thread, inside `transact`.

fn select_machine(conn: &rusqlite::Connection, machine_id: &str) -> Result<Option<Machine>> {
  let raw = conn
    .query_row(
      &format!("SELECT {MACHINE_COLUMNS} FROM machines WHERE machine_id = ?1"),
      rusqlite::params![machine_id],
      RawMachine::from_row,
    )
    .optional()?;
  raw.map(RawMachine::into_machine).transpose()
}

fn require_machine(conn: &rusqlite::Connection, machine_id: &str) -> Result<Machine> {
  select_machine(conn, machine_id)?
    .ok_or_else(|| qcboard_core::Error::NotFound(machine_id.to_owned()).into())
}

/// Insert a machine row. Returns `false` if the `machine_id` is taken.
fn insert_machine(conn: &rusqlite::Connection, machine: &Machine) -> Result<bool> {
  let raw = RawMachine::from_machine(machine)?;
  let changed = conn.execute(
    &format!(
      "INSERT OR IGNORE INTO machines ({MACHINE_COLUMNS})
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
    ),
    rusqlite::params![
      raw.machine_id,
      raw.name,
      raw.machine_type,
      raw.manufacturer,
      raw.model,
      raw.serial_number,
      raw.location,
      raw.installation_date,
      raw.status,
      raw.last_qc,
      raw.next_qc_due,
      raw.qc_schedule,
      raw.created_at,
      raw.updated_at,
    ],
  )?;
  Ok(changed == 1)
}

/// Overwrite every mutable column of an existing machine row.
fn write_machine(conn: &rusqlite::Connection, machine: &Machine) -> Result<()> {
  let raw = RawMachine::from_machine(machine)?;
  conn.execute(
    "UPDATE machines SET
       name = ?2, machine_type = ?3, manufacturer = ?4, model = ?5,
       serial_number = ?6, location = ?7, installation_date = ?8,
       status = ?9, last_qc = ?10, next_qc_due = ?11, qc_schedule = ?12,
       updated_at = ?13
     WHERE machine_id = ?1",
    rusqlite::params![
      raw.machine_id,
      raw.name,
      raw.machine_type,
      raw.manufacturer,
      raw.model,
      raw.serial_number,
      raw.location,
      raw.installation_date,
      raw.status,
      raw.last_qc,
      raw.next_qc_due,
      raw.qc_schedule,
      raw.updated_at,
    ],
  )?;
  Ok(())
}

fn insert_qc_record(conn: &rusqlite::Connection, record: &QcRecord) -> Result<()> {
  let raw = RawQcRecord::from_record(record);
  conn.execute(
    &format!(
      "INSERT INTO qc_events ({QC_COLUMNS})
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
    ),
    rusqlite::params![
      raw.event_id,
      raw.machine_id,
      raw.cadence,
      raw.date,
      raw.result,
      raw.performed_by,
      raw.notes,
      raw.recorded_at,
    ],
  )?;
  Ok(())
}

fn select_qc_records(
  conn: &rusqlite::Connection,
  machine_id: &str,
  since: Option<NaiveDate>,
) -> Result<Vec<QcRecord>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {QC_COLUMNS} FROM qc_events
     WHERE machine_id = ?1
       AND (?2 IS NULL OR date >= ?2)
     ORDER BY date DESC, recorded_at DESC"
  ))?;
  let raws = stmt
    .query_map(
      rusqlite::params![machine_id, since.map(encode_date)],
      RawQcRecord::from_row,
    )?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawQcRecord::into_record).collect()
}

// ─── MachineStore impl ───────────────────────────────────────────────────────

impl MachineStore for SqliteStore {
  type Error = Error;

  // ── Machines ──────────────────────────────────────────────────────────────

  async fn create_machine(&self, input: NewMachine) -> Result<Machine> {
    let machine = input.into_machine(Utc::now())?;

    let row = machine.clone();
    if !self.transact(move |conn| insert_machine(conn, &row)).await? {
      return Err(
        qcboard_core::Error::Validation(format!(
          "machineId {:?} is already registered",
          machine.machine_id
        ))
        .into(),
      );
    }

    tracing::info!(
      machine_id = %machine.machine_id,
      machine_type = %machine.machine_type,
      "machine registered"
    );
    Ok(machine)
  }

  async fn update_machine(
    &self,
    machine_id: &str,
    patch: MachinePatch,
  ) -> Result<Machine> {
    let id = machine_id.to_owned();
    let now = Utc::now();

    let machine = self
      .transact(move |conn| {
        let mut machine = require_machine(conn, &id)?;
        let reschedules = patch.reschedules(&machine);
        machine.apply(patch, now)?;
        if reschedules {
          let log = select_qc_records(conn, &id, None)?;
          qc::refresh_next_due(&mut machine, &log, now.date_naive());
        }
        write_machine(conn, &machine)?;
        Ok(machine)
      })
      .await?;

    tracing::info!(
      machine_id = %machine.machine_id,
      status = %machine.status,
      next_qc_due = %machine.next_qc_due,
      "machine updated"
    );
    Ok(machine)
  }

  async fn get_machine(&self, machine_id: &str) -> Result<Option<Machine>> {
    let id = machine_id.to_owned();
    self
      .transact(move |conn| select_machine(conn, &id))
      .await
  }

  async fn list_machines(&self, filter: &MachineFilter) -> Result<Vec<Machine>> {
    let type_str = filter
      .machine_type
      .map(|t| <&'static str>::from(t).to_owned());
    let status_str = filter.status.map(|s| <&'static str>::from(s).to_owned());
    let building = filter.building.clone();
    let due_str = filter.due_on_or_before.map(encode_date);
    let limit_val = filter.limit.unwrap_or(100) as i64;
    let offset_val = filter.offset.unwrap_or(0) as i64;

    let raws: Vec<RawMachine> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {MACHINE_COLUMNS} FROM machines
           WHERE (?1 IS NULL OR machine_type = ?1)
             AND (?2 IS NULL OR status = ?2)
             AND (?3 IS NULL OR json_extract(location, '$.building') = ?3)
             AND (?4 IS NULL OR next_qc_due <= ?4)
           ORDER BY machine_id
           LIMIT ?5 OFFSET ?6"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![
              type_str, status_str, building, due_str, limit_val, offset_val,
            ],
            RawMachine::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMachine::into_machine).collect()
  }

  // ── QC log ────────────────────────────────────────────────────────────────

  /// Appends the event and re-derives the machine's fields in a single
  /// transaction, so the log and the record never disagree.
  async fn record_qc(
    &self,
    machine_id: &str,
    event: QcEvent,
  ) -> Result<(QcRecord, Machine)> {
    let id = machine_id.to_owned();
    let now = Utc::now();

    let (record, machine) = self
      .transact(move |conn| {
        let mut machine = require_machine(conn, &id)?;
        event.validate(&machine)?;

        let record = QcRecord::new(&id, event, now);
        insert_qc_record(conn, &record)?;

        let log = select_qc_records(conn, &id, None)?;
        qc::apply_record(&mut machine, &record, &log, now);
        write_machine(conn, &machine)?;
        Ok((record, machine))
      })
      .await?;

    tracing::info!(
      machine_id,
      cadence = %record.cadence,
      result = %record.result,
      next_qc_due = %machine.next_qc_due,
      "qc recorded"
    );
    Ok((record, machine))
  }

  async fn qc_history(
    &self,
    machine_id: &str,
    since: Option<NaiveDate>,
  ) -> Result<Vec<QcRecord>> {
    let id = machine_id.to_owned();
    self
      .transact(move |conn| {
        require_machine(conn, &id)?;
        select_qc_records(conn, &id, since)
      })
      .await
  }
}
