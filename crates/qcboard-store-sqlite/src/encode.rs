//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings and calendar dates are `YYYY-MM-DD`.
//! Enumerations use their wire names. Sub-structures (location, last QC,
//! schedule) are compact JSON.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use qcboard_core::{
  machine::{LastQc, Location, Machine, QcSchedule},
  qc::QcRecord,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("timestamp {s:?}: {e}")))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::Decode(format!("date {s:?}: {e}")))
}

/// Enumerations are written with `<&'static str>::from` (strum) and read
/// back through `FromStr`.
pub fn decode_enum<T: FromStr>(field: &str, s: &str) -> Result<T> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown {field}: {s:?}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawMachine::from_row`].
pub const MACHINE_COLUMNS: &str = "machine_id, name, machine_type, manufacturer, model,
  serial_number, location, installation_date, status, last_qc, next_qc_due,
  qc_schedule, created_at, updated_at";

/// Raw strings read directly from a `machines` row.
pub struct RawMachine {
  pub machine_id:        String,
  pub name:              String,
  pub machine_type:      String,
  pub manufacturer:      String,
  pub model:             String,
  pub serial_number:     String,
  pub location:          Option<String>,
  pub installation_date: String,
  pub status:            String,
  pub last_qc:           Option<String>,
  pub next_qc_due:       String,
  pub qc_schedule:       String,
  pub created_at:        String,
  pub updated_at:        String,
}

impl RawMachine {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      machine_id:        row.get(0)?,
      name:              row.get(1)?,
      machine_type:      row.get(2)?,
      manufacturer:      row.get(3)?,
      model:             row.get(4)?,
      serial_number:     row.get(5)?,
      location:          row.get(6)?,
      installation_date: row.get(7)?,
      status:            row.get(8)?,
      last_qc:           row.get(9)?,
      next_qc_due:       row.get(10)?,
      qc_schedule:       row.get(11)?,
      created_at:        row.get(12)?,
      updated_at:        row.get(13)?,
    })
  }

  /// Encode a domain record for writing.
  pub fn from_machine(m: &Machine) -> Result<Self> {
    Ok(Self {
      machine_id:        m.machine_id.clone(),
      name:              m.name.clone(),
      machine_type:      <&'static str>::from(m.machine_type).to_owned(),
      manufacturer:      m.manufacturer.clone(),
      model:             m.model.clone(),
      serial_number:     m.serial_number.clone(),
      location:          m.location.as_ref().map(serde_json::to_string).transpose()?,
      installation_date: encode_date(m.installation_date),
      status:            <&'static str>::from(m.status).to_owned(),
      last_qc:           m.last_qc.as_ref().map(serde_json::to_string).transpose()?,
      next_qc_due:       encode_date(m.next_qc_due),
      qc_schedule:       serde_json::to_string(&m.qc_schedule)?,
      created_at:        encode_dt(m.created_at),
      updated_at:        encode_dt(m.updated_at),
    })
  }

  pub fn into_machine(self) -> Result<Machine> {
    let location: Option<Location> = self
      .location
      .as_deref()
      .map(serde_json::from_str)
      .transpose()?;
    let last_qc: Option<LastQc> = self
      .last_qc
      .as_deref()
      .map(serde_json::from_str)
      .transpose()?;
    let qc_schedule: QcSchedule = serde_json::from_str(&self.qc_schedule)?;

    Ok(Machine {
      machine_id: self.machine_id,
      name: self.name,
      machine_type: decode_enum("machine type", &self.machine_type)?,
      manufacturer: self.manufacturer,
      model: self.model,
      serial_number: self.serial_number,
      location,
      installation_date: decode_date(&self.installation_date)?,
      status: decode_enum("status", &self.status)?,
      last_qc,
      next_qc_due: decode_date(&self.next_qc_due)?,
      qc_schedule,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// Column list matching [`RawQcRecord::from_row`].
pub const QC_COLUMNS: &str =
  "event_id, machine_id, cadence, date, result, performed_by, notes, recorded_at";

/// Raw strings read directly from a `qc_events` row.
pub struct RawQcRecord {
  pub event_id:     String,
  pub machine_id:   String,
  pub cadence:      String,
  pub date:         String,
  pub result:       String,
  pub performed_by: String,
  pub notes:        Option<String>,
  pub recorded_at:  String,
}

impl RawQcRecord {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      event_id:     row.get(0)?,
      machine_id:   row.get(1)?,
      cadence:      row.get(2)?,
      date:         row.get(3)?,
      result:       row.get(4)?,
      performed_by: row.get(5)?,
      notes:        row.get(6)?,
      recorded_at:  row.get(7)?,
    })
  }

  pub fn from_record(r: &QcRecord) -> Self {
    Self {
      event_id:     r.event_id.hyphenated().to_string(),
      machine_id:   r.machine_id.clone(),
      cadence:      <&'static str>::from(r.cadence).to_owned(),
      date:         encode_date(r.date),
      result:       <&'static str>::from(r.result).to_owned(),
      performed_by: r.performed_by.clone(),
      notes:        r.notes.clone(),
      recorded_at:  encode_dt(r.recorded_at),
    }
  }

  pub fn into_record(self) -> Result<QcRecord> {
    Ok(QcRecord {
      event_id:     Uuid::parse_str(&self.event_id)?,
      machine_id:   self.machine_id,
      cadence:      decode_enum("cadence", &self.cadence)?,
      date:         decode_date(&self.date)?,
      result:       decode_enum("result", &self.result)?,
      performed_by: self.performed_by,
      notes:        self.notes,
      recorded_at:  decode_dt(&self.recorded_at)?,
    })
  }
}
