//! SQLite-backed vector store.
//!
//! Embeddings are stored as little-endian f32 blobs and ranked in process,
//! so this suits single-node deployments with modest per-owner volumes.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::store::rank_by_similarity;
use super::traits::VectorStore;
use crate::error::{Error, Result};
use crate::types::{LongTermEntry, Metadata, StoreFilter};

/// Long-term tables SQL (001)
pub const LONG_TERM_TABLES_SQL: &str = include_str!("migrations/001_long_term.sql");

pub struct SqliteVectorStore {
    db: Arc<Mutex<Connection>>,
    dimension: usize,
}

impl SqliteVectorStore {
    /// Open (or create) a database file and run migrations.
    pub fn open(path: impl AsRef<Path>, dimension: usize) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::from_connection(conn, dimension)
    }

    pub fn open_in_memory(dimension: usize) -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, dimension)
    }

    pub fn from_connection(conn: Connection, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::validation("vector dimension must be greater than 0"));
        }
        conn.execute_batch(LONG_TERM_TABLES_SQL)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            dimension,
        })
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(Error::validation(format!(
                "vector has {} dimensions, store expects {}",
                vector.len(),
                self.dimension
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn add(&self, owner_id: &str, text: &str, metadata: Metadata, vector: Vec<f32>) -> Result<String> {
        self.check_dimension(&vector)?;
        let id = Uuid::new_v4().to_string();
        let metadata_json = serde_json::to_string(&metadata)?;

        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO ltm_entries (id, owner_id, text, metadata_json, embedding, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &id,
                owner_id,
                text,
                metadata_json,
                encode_vector(&vector),
                Utc::now().timestamp_millis(),
            ],
        )?;

        Ok(id)
    }

    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &StoreFilter,
        min_score: f32,
    ) -> Result<Vec<LongTermEntry>> {
        self.check_dimension(vector)?;
        let candidates = {
            let db = self.db.lock().await;
            load_entries(&db, filter.owner_id.as_deref())?
        };
        Ok(rank_by_similarity(candidates.iter(), vector, top_k, filter, min_score))
    }

    async fn export_all(&self) -> Result<Vec<LongTermEntry>> {
        let db = self.db.lock().await;
        load_entries(&db, None)
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        let db = self.db.lock().await;
        let mut deleted = 0;
        for id in ids {
            deleted += db.execute("DELETE FROM ltm_entries WHERE id = ?1", params![id])?;
        }
        Ok(deleted)
    }
}

fn load_entries(db: &Connection, owner_id: Option<&str>) -> Result<Vec<LongTermEntry>> {
    let mut sql = String::from(
        "SELECT id, owner_id, text, metadata_json, embedding, created_at FROM ltm_entries",
    );
    if owner_id.is_some() {
        sql.push_str(" WHERE owner_id = ?1");
    }
    sql.push_str(" ORDER BY created_at ASC, id ASC");

    let mut stmt = db.prepare(&sql)?;
    let rows = match owner_id {
        Some(owner) => stmt.query_map(params![owner], row_to_entry)?,
        None => stmt.query_map([], row_to_entry)?,
    };

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

fn row_to_entry(row: &Row) -> rusqlite::Result<LongTermEntry> {
    let metadata_json: String = row.get(3)?;
    let embedding: Vec<u8> = row.get(4)?;

    Ok(LongTermEntry {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        text: row.get(2)?,
        metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
        embedding: decode_vector(&embedding),
        created_at: DateTime::from_timestamp_millis(row.get::<_, i64>(5)?).unwrap_or_default(),
        score: None,
    })
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
