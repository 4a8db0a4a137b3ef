//! Embedded character store.
//!
//! A single SQLite table `characters`, keyed by `full_name`. List and map
//! fields are stored as JSON-encoded TEXT columns; `created_at` is set by
//! the database at write time and refreshed on overwrite.
//!
//! All access goes through one connection behind a mutex, so writers are
//! serialized and a reader never observes a partially-applied upsert:
//! each statement runs in its own implicit transaction.

use crate::character::{CharacterRecord, CharacterSummary, StoredCharacter};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Errors from reading or writing the character store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Column encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Write access to the character table. The persister takes this
/// instead of the concrete store so tests can inject write failures.
pub trait CharacterSink: Send + Sync {
    /// Insert a record, or overwrite every field if the name exists.
    fn upsert(&self, record: &CharacterRecord) -> Result<(), StorageError>;
}

impl CharacterSink for CharacterStore {
    fn upsert(&self, record: &CharacterRecord) -> Result<(), StorageError> {
        CharacterStore::upsert(self, record)
    }
}

/// The persisted character table.
pub struct CharacterStore {
    conn: Mutex<Connection>,
}

impl CharacterStore {
    /// Open (or create) a store backed by a file on disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory store. Used by tests; contents vanish on drop.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS characters (
                full_name       TEXT PRIMARY KEY,
                events          TEXT NOT NULL,
                characteristics TEXT NOT NULL,
                occupation      TEXT,
                relationships   TEXT NOT NULL,
                novel_title     TEXT,
                created_at      TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // Statements are independent, so a panic elsewhere while holding
    // the lock leaves the connection usable.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert a record, or overwrite every field if the name exists.
    ///
    /// Last writer wins: a record from a second novel with the same
    /// `full_name` silently replaces the first, and `created_at` is
    /// refreshed. There is no field-level merge.
    pub fn upsert(&self, record: &CharacterRecord) -> Result<(), StorageError> {
        let events = serde_json::to_string(&record.events)?;
        let characteristics = serde_json::to_string(&record.characteristics)?;
        let relationships = serde_json::to_string(&record.relationships)?;

        let conn = self.conn();
        conn.execute(
            "INSERT INTO characters
                (full_name, events, characteristics, occupation, relationships, novel_title)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (full_name) DO UPDATE SET
                events = excluded.events,
                characteristics = excluded.characteristics,
                occupation = excluded.occupation,
                relationships = excluded.relationships,
                novel_title = excluded.novel_title,
                created_at = CURRENT_TIMESTAMP",
            params![
                record.full_name,
                events,
                characteristics,
                record.occupation,
                relationships,
                record.novel_title,
            ],
        )?;
        tracing::debug!(full_name = %record.full_name, "character upserted");
        Ok(())
    }

    /// Fetch a character by exact name. Absent names are `Ok(None)`,
    /// not an error; there is no fuzzy matching at this layer.
    pub fn get(&self, full_name: &str) -> Result<Option<StoredCharacter>, StorageError> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT full_name, events, characteristics, occupation,
                        relationships, novel_title, created_at
                 FROM characters WHERE full_name = ?1",
                params![full_name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()?;

        let Some((full_name, events, characteristics, occupation, relationships, novel_title, created_at)) =
            row
        else {
            return Ok(None);
        };

        let events: Vec<String> = serde_json::from_str(&events)?;
        let characteristics: Vec<String> = serde_json::from_str(&characteristics)?;
        let relationships: BTreeMap<String, String> = serde_json::from_str(&relationships)?;

        Ok(Some(StoredCharacter {
            record: CharacterRecord {
                full_name,
                events,
                characteristics,
                occupation,
                relationships,
                novel_title,
            },
            created_at,
        }))
    }

    /// All persisted names. The store is keyed, not sequenced: any
    /// ordering is the caller's formatting concern.
    pub fn list_names(&self) -> Result<Vec<String>, StorageError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT full_name FROM characters")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Listing view with occupation and source title per character.
    pub fn list(&self) -> Result<Vec<CharacterSummary>, StorageError> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT full_name, occupation, novel_title FROM characters")?;
        let summaries = stmt
            .query_map([], |row| {
                Ok(CharacterSummary {
                    full_name: row.get(0)?,
                    occupation: row.get(1)?,
                    novel_title: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(summaries)
    }

    /// Number of persisted characters.
    pub fn count(&self) -> Result<usize, StorageError> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM characters", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Remove every row. Returns the number of rows deleted.
    pub fn delete_all(&self) -> Result<usize, StorageError> {
        let conn = self.conn();
        let deleted = conn.execute("DELETE FROM characters", [])?;
        tracing::debug!(deleted, "character store cleared");
        Ok(deleted)
    }
}
