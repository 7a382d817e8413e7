//! SQL schema for the qcboard SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per physical machine. Rows are never deleted.
CREATE TABLE IF NOT EXISTS machines (
    machine_id        TEXT PRIMARY KEY,
    name              TEXT NOT NULL,
    machine_type      TEXT NOT NULL
        CHECK (machine_type IN ('MRI', 'CT', 'PET', 'PET-CT', 'X-Ray', 'Ultrasound')),
    manufacturer      TEXT NOT NULL,
    model             TEXT NOT NULL,
    serial_number     TEXT NOT NULL,
    location          TEXT,            -- JSON-encoded Location or NULL
    installation_date TEXT NOT NULL,   -- YYYY-MM-DD
    status            TEXT NOT NULL DEFAULT 'operational'
        CHECK (status IN ('operational', 'maintenance', 'offline', 'critical')),
    last_qc           TEXT,            -- JSON-encoded LastQc or NULL
    next_qc_due       TEXT NOT NULL,   -- YYYY-MM-DD
    qc_schedule       TEXT NOT NULL,   -- JSON-encoded QcSchedule
    created_at        TEXT NOT NULL,   -- RFC 3339 UTC; server-assigned
    updated_at        TEXT NOT NULL
);

-- QC events are strictly append-only.
CREATE TABLE IF NOT EXISTS qc_events (
    event_id     TEXT PRIMARY KEY,
    machine_id   TEXT NOT NULL REFERENCES machines(machine_id),
    cadence      TEXT NOT NULL
        CHECK (cadence IN ('daily', 'weekly', 'monthly', 'quarterly', 'annual')),
    date         TEXT NOT NULL,
    result       TEXT NOT NULL
        CHECK (result IN ('pass', 'fail', 'conditional')),
    performed_by TEXT NOT NULL,
    notes        TEXT,
    recorded_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS machines_status_idx   ON machines(status);
CREATE INDEX IF NOT EXISTS machines_next_due_idx ON machines(next_qc_due);
CREATE INDEX IF NOT EXISTS qc_events_machine_idx ON qc_events(machine_id, date);

PRAGMA user_version = 1;
";
