//! Machine records, one per physical imaging device.
//!
//! A machine is created when it is registered and is never removed;
//! decommissioning is a transition to [`MachineStatus::Offline`]. The
//! enumerated fields are closed Rust enums, so an out-of-range value can only
//! arrive through deserialisation or [`std::str::FromStr`], both of which
//! reject it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::{Error, Result, cadence::Cadence};

// ─── Enumerations ────────────────────────────────────────────────────────────

/// Imaging modality.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
pub enum MachineType {
  #[serde(rename = "MRI")]
  #[strum(serialize = "MRI")]
  Mri,
  #[serde(rename = "CT")]
  #[strum(serialize = "CT")]
  Ct,
  #[serde(rename = "PET")]
  #[strum(serialize = "PET")]
  Pet,
  #[serde(rename = "PET-CT")]
  #[strum(serialize = "PET-CT")]
  PetCt,
  #[serde(rename = "X-Ray")]
  #[strum(serialize = "X-Ray")]
  XRay,
  #[serde(rename = "Ultrasound")]
  #[strum(serialize = "Ultrasound")]
  Ultrasound,
}

/// Current operational state of a machine.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MachineStatus {
  #[default]
  Operational,
  Maintenance,
  Offline,
  Critical,
}

/// Outcome of a QC check.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum QcResult {
  Pass,
  Fail,
  Conditional,
}

// ─── Sub-structures ──────────────────────────────────────────────────────────

/// Where a machine is installed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Location {
  pub building: Option<String>,
  pub floor:    Option<String>,
  pub room:     Option<String>,
}

/// The most recent QC check performed on a machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LastQc {
  pub date:         NaiveDate,
  pub result:       QcResult,
  pub performed_by: String,
  #[serde(default)]
  pub notes:        Option<String>,
}

/// Which QC cadences apply to a machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QcSchedule {
  pub daily:     bool,
  pub weekly:    bool,
  pub monthly:   bool,
  pub quarterly: bool,
  pub annual:    bool,
}

impl QcSchedule {
  /// A schedule with exactly one cadence enabled.
  pub fn only(cadence: Cadence) -> Self {
    let mut schedule = Self::default();
    schedule.set(cadence, true);
    schedule
  }

  pub fn is_enabled(&self, cadence: Cadence) -> bool {
    match cadence {
      Cadence::Daily => self.daily,
      Cadence::Weekly => self.weekly,
      Cadence::Monthly => self.monthly,
      Cadence::Quarterly => self.quarterly,
      Cadence::Annual => self.annual,
    }
  }

  pub fn set(&mut self, cadence: Cadence, enabled: bool) {
    match cadence {
      Cadence::Daily => self.daily = enabled,
      Cadence::Weekly => self.weekly = enabled,
      Cadence::Monthly => self.monthly = enabled,
      Cadence::Quarterly => self.quarterly = enabled,
      Cadence::Annual => self.annual = enabled,
    }
  }

  /// Enabled cadences, shortest period first.
  pub fn cadences(&self) -> impl Iterator<Item = Cadence> + '_ {
    Cadence::ALL.into_iter().filter(|c| self.is_enabled(*c))
  }
}

// ─── Machine ─────────────────────────────────────────────────────────────────

/// The durable record for one physical device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
  /// Globally unique; never changes after registration.
  pub machine_id:        String,
  pub name:              String,
  #[serde(rename = "type")]
  pub machine_type:      MachineType,
  pub manufacturer:      String,
  pub model:             String,
  pub serial_number:     String,
  pub location:          Option<Location>,
  pub installation_date: NaiveDate,
  pub status:            MachineStatus,
  #[serde(rename = "lastQC")]
  pub last_qc:           Option<LastQc>,
  /// Earliest outstanding cadence deadline.
  #[serde(rename = "nextQCDue")]
  pub next_qc_due:       NaiveDate,
  pub qc_schedule:       QcSchedule,
  /// Server-assigned.
  pub created_at:        DateTime<Utc>,
  /// Server-assigned; bumped on every write.
  pub updated_at:        DateTime<Utc>,
}

/// Characters that would split or truncate a `/machines/{id}` path.
const RESERVED_ID_CHARS: &[char] = &['/', '?', '#', '%'];

fn require(field: &str, value: &str) -> Result<()> {
  if value.trim().is_empty() {
    return Err(Error::Validation(format!("{field} is required")));
  }
  Ok(())
}

impl Machine {
  /// Check every write-time invariant that the type system does not already
  /// enforce.
  pub fn validate(&self) -> Result<()> {
    require("machineId", &self.machine_id)?;
    if self.machine_id.trim() != self.machine_id {
      return Err(Error::validation(
        "machineId must not have leading or trailing whitespace",
      ));
    }
    if let Some(c) = self.machine_id.chars().find(|c| RESERVED_ID_CHARS.contains(c)) {
      return Err(Error::Validation(format!(
        "machineId must not contain {c:?}"
      )));
    }
    require("name", &self.name)?;
    require("manufacturer", &self.manufacturer)?;
    require("model", &self.model)?;
    require("serialNumber", &self.serial_number)?;
    if let Some(last) = &self.last_qc {
      require("lastQC.performedBy", &last.performed_by)?;
    }
    if self.qc_schedule.cadences().next().is_none() {
      return Err(Error::validation(
        "qcSchedule must enable at least one cadence",
      ));
    }
    Ok(())
  }

  /// Merge `patch` into this record and re-validate. On error the record is
  /// left untouched.
  pub fn apply(&mut self, patch: MachinePatch, now: DateTime<Utc>) -> Result<()> {
    let mut next = self.clone();
    if let Some(v) = patch.name {
      next.name = v;
    }
    if let Some(v) = patch.machine_type {
      next.machine_type = v;
    }
    if let Some(v) = patch.manufacturer {
      next.manufacturer = v;
    }
    if let Some(v) = patch.model {
      next.model = v;
    }
    if let Some(v) = patch.serial_number {
      next.serial_number = v;
    }
    if let Some(v) = patch.location {
      next.location = Some(v);
    }
    if let Some(v) = patch.installation_date {
      next.installation_date = v;
    }
    if let Some(v) = patch.status {
      next.status = v;
    }
    if let Some(v) = patch.last_qc {
      next.last_qc = Some(v);
    }
    if let Some(v) = patch.next_qc_due {
      next.next_qc_due = v;
    }
    if let Some(v) = patch.qc_schedule {
      next.qc_schedule = v;
    }
    next.validate()?;
    next.updated_at = now;
    *self = next;
    Ok(())
  }
}

// ─── NewMachine ──────────────────────────────────────────────────────────────

/// Input to [`crate::store::MachineStore::create_machine`].
/// Timestamps are always set by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewMachine {
  pub machine_id:        String,
  pub name:              String,
  #[serde(rename = "type")]
  pub machine_type:      MachineType,
  pub manufacturer:      String,
  pub model:             String,
  pub serial_number:     String,
  #[serde(default)]
  pub location:          Option<Location>,
  pub installation_date: NaiveDate,
  #[serde(default)]
  pub status:            MachineStatus,
  #[serde(rename = "lastQC", default)]
  pub last_qc:           Option<LastQc>,
  #[serde(rename = "nextQCDue")]
  pub next_qc_due:       NaiveDate,
  pub qc_schedule:       QcSchedule,
}

impl NewMachine {
  /// Build and validate the stored record.
  pub fn into_machine(self, now: DateTime<Utc>) -> Result<Machine> {
    let machine = Machine {
      machine_id:        self.machine_id.trim().to_owned(),
      name:              self.name,
      machine_type:      self.machine_type,
      manufacturer:      self.manufacturer,
      model:             self.model,
      serial_number:     self.serial_number,
      location:          self.location,
      installation_date: self.installation_date,
      status:            self.status,
      last_qc:           self.last_qc,
      next_qc_due:       self.next_qc_due,
      qc_schedule:       self.qc_schedule,
      created_at:        now,
      updated_at:        now,
    };
    machine.validate()?;
    Ok(machine)
  }
}

// ─── MachinePatch ────────────────────────────────────────────────────────────

/// A partial update. Absent fields are left unchanged. `machineId` is not a
/// field, so a patch that names it fails to deserialise.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MachinePatch {
  pub name:              Option<String>,
  #[serde(rename = "type")]
  pub machine_type:      Option<MachineType>,
  pub manufacturer:      Option<String>,
  pub model:             Option<String>,
  pub serial_number:     Option<String>,
  pub location:          Option<Location>,
  pub installation_date: Option<NaiveDate>,
  pub status:            Option<MachineStatus>,
  #[serde(rename = "lastQC")]
  pub last_qc:           Option<LastQc>,
  #[serde(rename = "nextQCDue")]
  pub next_qc_due:       Option<NaiveDate>,
  pub qc_schedule:       Option<QcSchedule>,
}

impl MachinePatch {
  /// Whether applying this patch to `machine` changes its schedule without
  /// also supplying a new `nextQCDue`, so the deadline has to be re-derived.
  pub fn reschedules(&self, machine: &Machine) -> bool {
    self.next_qc_due.is_none()
      && self
        .qc_schedule
        .is_some_and(|schedule| schedule != machine.qc_schedule)
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn new_machine() -> NewMachine {
    NewMachine {
      machine_id:        "MRI-001".into(),
      name:              "Main MRI".into(),
      machine_type:      MachineType::Mri,
      manufacturer:      "Siemens".into(),
      model:             "Magnetom".into(),
      serial_number:     "SN-1".into(),
      location:          None,
      installation_date: NaiveDate::from_ymd_opt(2020, 1, 6).unwrap(),
      status:            MachineStatus::default(),
      last_qc:           None,
      next_qc_due:       NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
      qc_schedule:       QcSchedule::only(Cadence::Daily),
    }
  }

  fn now() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap() }

  #[test]
  fn machine_type_wire_names() {
    assert_eq!(
      serde_json::to_value(MachineType::PetCt).unwrap(),
      serde_json::json!("PET-CT")
    );
    assert_eq!(MachineType::XRay.to_string(), "X-Ray");
    assert_eq!("Ultrasound".parse::<MachineType>().unwrap(), MachineType::Ultrasound);
    assert!("Xray".parse::<MachineType>().is_err());
  }

  #[test]
  fn out_of_enum_values_are_rejected() {
    assert!("broken".parse::<MachineStatus>().is_err());
    assert!(serde_json::from_value::<MachineStatus>(serde_json::json!("broken")).is_err());

    let json = serde_json::json!({
      "date": "2024-06-03",
      "result": "maybe",
      "performedBy": "tech"
    });
    assert!(serde_json::from_value::<LastQc>(json).is_err());
  }

  #[test]
  fn status_defaults_to_operational() {
    let json = serde_json::json!({
      "machineId": "CT-7",
      "name": "ER CT",
      "type": "CT",
      "manufacturer": "GE",
      "model": "Revolution",
      "serialNumber": "X1",
      "installationDate": "2021-03-01",
      "nextQCDue": "2024-06-03",
      "qcSchedule": { "weekly": true }
    });
    let input: NewMachine = serde_json::from_value(json).unwrap();
    assert_eq!(input.status, MachineStatus::Operational);
    assert!(input.qc_schedule.weekly);
    assert!(!input.qc_schedule.daily);
  }

  #[test]
  fn into_machine_requires_fields() {
    let mut input = new_machine();
    input.serial_number = "  ".into();
    let err = input.into_machine(now()).unwrap_err();
    assert!(matches!(err, Error::Validation(m) if m.contains("serialNumber")));
  }

  #[test]
  fn into_machine_requires_a_cadence() {
    let mut input = new_machine();
    input.qc_schedule = QcSchedule::default();
    assert!(matches!(input.into_machine(now()), Err(Error::Validation(_))));
  }

  #[test]
  fn apply_merges_and_bumps_updated_at() {
    let mut machine = new_machine().into_machine(now()).unwrap();
    let later = now() + chrono::Duration::hours(1);
    machine
      .apply(
        MachinePatch {
          status: Some(MachineStatus::Maintenance),
          location: Some(Location {
            building: Some("B".into()),
            floor:    Some("2".into()),
            room:     None,
          }),
          ..Default::default()
        },
        later,
      )
      .unwrap();

    assert_eq!(machine.status, MachineStatus::Maintenance);
    assert_eq!(machine.name, "Main MRI");
    assert_eq!(machine.updated_at, later);
    assert_eq!(machine.created_at, now());
  }

  #[test]
  fn failed_apply_leaves_record_untouched() {
    let mut machine = new_machine().into_machine(now()).unwrap();
    let before = machine.clone();
    let err = machine.apply(
      MachinePatch { name: Some(String::new()), ..Default::default() },
      now(),
    );
    assert!(err.is_err());
    assert_eq!(machine, before);
  }

  #[test]
  fn machine_id_is_trimmed_on_registration() {
    let mut input = new_machine();
    input.machine_id = "  MRI-001 ".into();
    let machine = input.into_machine(now()).unwrap();
    assert_eq!(machine.machine_id, "MRI-001");
  }

  #[test]
  fn machine_id_rejects_path_reserved_characters() {
    for id in ["MRI/1", "MRI?1", "MRI#1", "MRI%1"] {
      let mut input = new_machine();
      input.machine_id = id.into();
      let err = input.into_machine(now()).unwrap_err();
      assert!(matches!(err, Error::Validation(m) if m.contains("machineId")), "{id}");
    }
  }

  #[test]
  fn patch_reschedules_only_when_schedule_changes() {
    let machine = new_machine().into_machine(now()).unwrap();

    let same = MachinePatch { qc_schedule: Some(machine.qc_schedule), ..Default::default() };
    assert!(!same.reschedules(&machine));

    let changed = MachinePatch {
      qc_schedule: Some(QcSchedule::only(Cadence::Weekly)),
      ..Default::default()
    };
    assert!(changed.reschedules(&machine));

    let explicit = MachinePatch {
      next_qc_due: NaiveDate::from_ymd_opt(2024, 7, 1),
      ..changed
    };
    assert!(!explicit.reschedules(&machine));
  }

  #[test]
  fn patch_cannot_name_machine_id() {
    let json = serde_json::json!({ "machineId": "OTHER" });
    assert!(serde_json::from_value::<MachinePatch>(json).is_err());
  }

  #[test]
  fn machine_serialises_with_document_field_names() {
    let machine = new_machine().into_machine(now()).unwrap();
    let value = serde_json::to_value(&machine).unwrap();
    assert_eq!(value["machineId"], "MRI-001");
    assert_eq!(value["type"], "MRI");
    assert_eq!(value["nextQCDue"], "2024-06-03");
    assert_eq!(value["qcSchedule"]["daily"], true);
    assert!(value["lastQC"].is_null());
  }
}
