//! SQLite-backed descriptor store.
//!
//! One `persons` table; the descriptor is a little-endian f32 BLOB, status
//! and gender are TEXT enums, timestamps are RFC 3339 TEXT. All calls go
//! through `tokio-rusqlite`'s dedicated connection thread.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use tokio_rusqlite::Connection;
use uuid::Uuid;

use milaap_core::{
    ContactInfo, FaceDescriptor, PersonRecord, PersonStatus, DESCRIPTOR_LEN,
};

use crate::{DescriptorStore, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS persons (
    id                   TEXT PRIMARY KEY,
    name                 TEXT,
    age                  INTEGER,
    gender               TEXT NOT NULL,
    photo_url            TEXT NOT NULL,
    descriptor           BLOB NOT NULL,
    status               TEXT NOT NULL,
    contact_name         TEXT,
    contact_phone        TEXT,
    contact_relationship TEXT,
    last_seen_location   TEXT,
    current_location     TEXT,
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_persons_status ON persons(status);
";

const COLS: &str = "id, name, age, gender, photo_url, descriptor, status, \
    contact_name, contact_phone, contact_relationship, \
    last_seen_location, current_location, created_at, updated_at";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open or create the store at the given path.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref().to_path_buf()).await?;
        Self::init(conn).await
    }

    /// Open a private in-memory database (ephemeral runs, tests).
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }
}

/// Raw row as stored; decoding into domain types happens outside the
/// connection thread so decode failures map to [`StoreError::InvalidValue`].
struct PersonRow {
    id: String,
    name: Option<String>,
    age: Option<u32>,
    gender: String,
    photo_url: String,
    descriptor: Vec<u8>,
    status: String,
    contact_name: Option<String>,
    contact_phone: Option<String>,
    contact_relationship: Option<String>,
    last_seen_location: Option<String>,
    current_location: Option<String>,
    created_at: String,
    updated_at: String,
}

fn row_to_person(row: &rusqlite::Row<'_>) -> rusqlite::Result<PersonRow> {
    Ok(PersonRow {
        id: row.get(0)?,
        name: row.get(1)?,
        age: row.get(2)?,
        gender: row.get(3)?,
        photo_url: row.get(4)?,
        descriptor: row.get(5)?,
        status: row.get(6)?,
        contact_name: row.get(7)?,
        contact_phone: row.get(8)?,
        contact_relationship: row.get(9)?,
        last_seen_location: row.get(10)?,
        current_location: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

pub(crate) fn encode_descriptor(descriptor: &FaceDescriptor) -> Vec<u8> {
    let mut buf = Vec::with_capacity(DESCRIPTOR_LEN * 4);
    for v in descriptor.as_slice() {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    buf
}

pub(crate) fn decode_descriptor(blob: &[u8]) -> Result<FaceDescriptor, String> {
    if blob.len() != DESCRIPTOR_LEN * 4 {
        return Err(format!(
            "descriptor blob must be {} bytes, got {}",
            DESCRIPTOR_LEN * 4,
            blob.len()
        ));
    }
    let values = blob
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    FaceDescriptor::new(values).map_err(|e| e.to_string())
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidValue(format!("timestamp {s}: {e}")))
}

fn decode_row(row: PersonRow) -> Result<PersonRecord, StoreError> {
    let id = Uuid::parse_str(&row.id)
        .map_err(|e| StoreError::InvalidValue(format!("id {}: {e}", row.id)))?;
    let face_descriptor = decode_descriptor(&row.descriptor).map_err(StoreError::InvalidValue)?;
    let status = row.status.parse().map_err(StoreError::InvalidValue)?;
    let gender = row.gender.parse().map_err(StoreError::InvalidValue)?;
    let contact_info = match (row.contact_name, row.contact_phone) {
        (Some(name), Some(phone)) => Some(ContactInfo {
            name,
            phone,
            relationship: row.contact_relationship,
        }),
        _ => None,
    };
    Ok(PersonRecord {
        id,
        name: row.name,
        age: row.age,
        gender,
        photo_url: row.photo_url,
        face_descriptor,
        status,
        contact_info,
        last_seen_location: row.last_seen_location,
        current_location: row.current_location,
        created_at: parse_timestamp(&row.created_at)?,
        updated_at: parse_timestamp(&row.updated_at)?,
    })
}

/// Decode rows, dropping any that no longer decode. A row without a usable
/// descriptor cannot participate in matching and must not fail the scan.
fn decode_rows(rows: Vec<PersonRow>) -> Vec<PersonRecord> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id.clone();
            match decode_row(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "skipping undecodable person row");
                    None
                }
            }
        })
        .collect()
}

enum UpdateOutcome {
    Updated(PersonRow),
    Missing,
    Conflict(String),
}

#[async_trait]
impl DescriptorStore for SqliteStore {
    async fn list_descriptors(
        &self,
        status: Option<PersonStatus>,
    ) -> Result<Vec<(Uuid, FaceDescriptor)>, StoreError> {
        let rows: Vec<(String, Vec<u8>)> = self
            .conn
            .call(move |conn| {
                let rows = match status {
                    Some(s) => {
                        let mut stmt = conn.prepare(
                            "SELECT id, descriptor FROM persons WHERE status = ?1 ORDER BY rowid",
                        )?;
                        let rows = stmt
                            .query_map(params![s.as_str()], |r| Ok((r.get(0)?, r.get(1)?)))?
                            .collect::<rusqlite::Result<Vec<_>>>()?;
                        rows
                    }
                    None => {
                        let mut stmt =
                            conn.prepare("SELECT id, descriptor FROM persons ORDER BY rowid")?;
                        let rows = stmt
                            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
                            .collect::<rusqlite::Result<Vec<_>>>()?;
                        rows
                    }
                };
                Ok(rows)
            })
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, blob)| {
                let parsed = Uuid::parse_str(&id).ok();
                let descriptor = decode_descriptor(&blob).ok();
                match (parsed, descriptor) {
                    (Some(id), Some(d)) => Some((id, d)),
                    _ => {
                        tracing::warn!(id = %id, "skipping undecodable descriptor row");
                        None
                    }
                }
            })
            .collect())
    }

    async fn list_records(
        &self,
        status: Option<PersonStatus>,
    ) -> Result<Vec<PersonRecord>, StoreError> {
        let rows = self
            .conn
            .call(move |conn| {
                let rows = match status {
                    Some(s) => {
                        let mut stmt = conn.prepare(&format!(
                            "SELECT {COLS} FROM persons WHERE status = ?1 ORDER BY rowid"
                        ))?;
                        let rows = stmt
                            .query_map(params![s.as_str()], row_to_person)?
                            .collect::<rusqlite::Result<Vec<_>>>()?;
                        rows
                    }
                    None => {
                        let mut stmt =
                            conn.prepare(&format!("SELECT {COLS} FROM persons ORDER BY rowid"))?;
                        let rows = stmt
                            .query_map([], row_to_person)?
                            .collect::<rusqlite::Result<Vec<_>>>()?;
                        rows
                    }
                };
                Ok(rows)
            })
            .await?;

        Ok(decode_rows(rows))
    }

    async fn get_record(&self, id: Uuid) -> Result<PersonRecord, StoreError> {
        let id_s = id.to_string();
        let row = self
            .conn
            .call(move |conn| {
                let row = conn
                    .query_row(
                        &format!("SELECT {COLS} FROM persons WHERE id = ?1"),
                        params![id_s],
                        row_to_person,
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;
        row.map(decode_row)
            .transpose()?
            .ok_or(StoreError::NotFound(id))
    }

    async fn upsert_record(&self, record: PersonRecord) -> Result<PersonRecord, StoreError> {
        let stored = record.clone();
        let (contact_name, contact_phone, contact_relationship) = match &record.contact_info {
            Some(c) => (
                Some(c.name.clone()),
                Some(c.phone.clone()),
                c.relationship.clone(),
            ),
            None => (None, None, None),
        };
        let descriptor = encode_descriptor(&record.face_descriptor);
        self.conn
            .call(move |conn| {
                // The descriptor and created_at are immutable once stored.
                conn.execute(
                    "INSERT INTO persons (\
                        id, name, age, gender, photo_url, descriptor, status, \
                        contact_name, contact_phone, contact_relationship, \
                        last_seen_location, current_location, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14) \
                     ON CONFLICT(id) DO UPDATE SET \
                        name = excluded.name, \
                        age = excluded.age, \
                        gender = excluded.gender, \
                        photo_url = excluded.photo_url, \
                        status = excluded.status, \
                        contact_name = excluded.contact_name, \
                        contact_phone = excluded.contact_phone, \
                        contact_relationship = excluded.contact_relationship, \
                        last_seen_location = excluded.last_seen_location, \
                        current_location = excluded.current_location, \
                        updated_at = excluded.updated_at",
                    params![
                        record.id.to_string(),
                        record.name,
                        record.age,
                        record.gender.as_str(),
                        record.photo_url,
                        descriptor,
                        record.status.as_str(),
                        contact_name,
                        contact_phone,
                        contact_relationship,
                        record.last_seen_location,
                        record.current_location,
                        record.created_at.to_rfc3339(),
                        record.updated_at.to_rfc3339(),
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(stored)
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: PersonStatus,
        target: PersonStatus,
        location: Option<String>,
    ) -> Result<PersonRecord, StoreError> {
        let id_s = id.to_string();
        let now = Utc::now().to_rfc3339();
        let outcome = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let rows = tx.execute(
                    "UPDATE persons SET \
                        status = ?1, \
                        updated_at = ?2, \
                        current_location = COALESCE(?3, current_location) \
                     WHERE id = ?4 AND status = ?5",
                    params![target.as_str(), now, location, id_s, expected.as_str()],
                )?;
                let outcome = if rows == 1 {
                    let row = tx.query_row(
                        &format!("SELECT {COLS} FROM persons WHERE id = ?1"),
                        params![id_s],
                        row_to_person,
                    )?;
                    UpdateOutcome::Updated(row)
                } else {
                    let actual = tx
                        .query_row(
                            "SELECT status FROM persons WHERE id = ?1",
                            params![id_s],
                            |r| r.get::<_, String>(0),
                        )
                        .optional()?;
                    match actual {
                        None => UpdateOutcome::Missing,
                        Some(actual) => UpdateOutcome::Conflict(actual),
                    }
                };
                tx.commit()?;
                Ok(outcome)
            })
            .await?;

        match outcome {
            UpdateOutcome::Updated(row) => decode_row(row),
            UpdateOutcome::Missing => Err(StoreError::NotFound(id)),
            UpdateOutcome::Conflict(actual) => Err(StoreError::Conflict {
                id,
                actual: actual.parse().map_err(StoreError::InvalidValue)?,
            }),
        }
    }
}
