//! Durable enrollment store.
//!
//! Re-enrolling a name appends another sample; records are never updated in
//! place and are only deleted through [`EnrollmentStore::remove`].

use facegate_core::protocol::IdentitySummary;
use facegate_core::{Embedding, EmbeddingError, IdentityRecord};
use rusqlite::{params, Connection};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("enrollment store unavailable: {0}")]
    Unavailable(#[from] rusqlite::Error),
    #[error("failed to prepare store directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("record {id} has a corrupt embedding ({len} bytes)")]
    Corrupt { id: String, len: usize },
    #[error("record {id} does not fit the configured descriptor: {source}")]
    InvalidRecord { id: String, source: EmbeddingError },
}

/// Storage backend for identity records. Owned by the engine thread.
pub trait EnrollmentStore: Send {
    /// Append a record and return how many samples its name now has.
    /// Either both happen or neither does.
    fn insert(&mut self, record: &IdentityRecord) -> Result<usize, StoreError>;
    /// Every record, oldest first, read as one consistent snapshot.
    fn snapshot(&self) -> Result<Vec<IdentityRecord>, StoreError>;
    fn summaries(&self) -> Result<Vec<IdentitySummary>, StoreError>;
    /// Delete every record for `name`, returning how many were removed.
    fn remove(&mut self, name: &str) -> Result<usize, StoreError>;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS identities (
    seq        INTEGER PRIMARY KEY AUTOINCREMENT,
    id         TEXT NOT NULL UNIQUE,
    name       TEXT NOT NULL,
    embedding  BLOB NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_identities_name ON identities(name);
";

/// SQLite-backed store. Embeddings are little-endian f32 blobs.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }
}

impl EnrollmentStore for SqliteStore {
    fn insert(&mut self, record: &IdentityRecord) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO identities (id, name, embedding, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.id,
                record.name,
                encode_embedding(&record.embedding),
                record.created_at
            ],
        )?;
        let samples: i64 = tx.query_row(
            "SELECT COUNT(*) FROM identities WHERE name = ?1",
            params![record.name],
            |row| row.get(0),
        )?;
        tx.commit()?;
        Ok(samples as usize)
    }

    fn snapshot(&self) -> Result<Vec<IdentityRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT id, name, embedding, created_at FROM identities ORDER BY seq")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Vec<u8>>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, name, blob, created_at) = row?;
            let embedding = decode_embedding(&id, &blob)?;
            records.push(IdentityRecord {
                id,
                name,
                embedding,
                created_at,
            });
        }
        Ok(records)
    }

    fn summaries(&self) -> Result<Vec<IdentitySummary>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT name, COUNT(*), MIN(created_at) FROM identities GROUP BY name ORDER BY name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(IdentitySummary {
                name: row.get(0)?,
                samples: row.get::<_, i64>(1)? as usize,
                enrolled_at: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn remove(&mut self, name: &str) -> Result<usize, StoreError> {
        let removed = self
            .conn
            .execute("DELETE FROM identities WHERE name = ?1", params![name])?;
        Ok(removed)
    }
}

fn encode_embedding(embedding: &Embedding) -> Vec<u8> {
    embedding.values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_embedding(id: &str, blob: &[u8]) -> Result<Embedding, StoreError> {
    if blob.len() % 4 != 0 {
        return Err(StoreError::Corrupt {
            id: id.to_string(),
            len: blob.len(),
        });
    }
    let values = blob
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Ok(Embedding::new(values))
}
