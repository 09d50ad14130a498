//! SQLite document store backed by `tokio-rusqlite`.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use crate::types::{NewRawRecord, ProcessedRecord, RagError, RawRecord, Source};

use super::DocumentStore;

const RAW_COLUMNS: &str = "id, url, source, title, text, processed, inserted_at";

type RawRow = (
    i64,
    String,
    String,
    Option<String>,
    Option<String>,
    bool,
    String,
);

/// Document store holding the `raw_records` and `processed_records`
/// collections in a single SQLite database.
#[derive(Clone)]
pub struct SqliteDocumentStore {
    conn: Connection,
}

impl SqliteDocumentStore {
    /// Opens (or creates) the store at `path` and ensures the schema exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, RagError> {
        let conn = Connection::open(path)
            .await
            .map_err(|err| RagError::Store(err.to_string()))?;
        let store = Self { conn };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), RagError> {
        self.conn
            .call(|conn| {
                conn.execute(
                    "CREATE TABLE IF NOT EXISTS raw_records (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        url TEXT NOT NULL,
                        source TEXT NOT NULL,
                        title TEXT,
                        text TEXT,
                        processed INTEGER NOT NULL DEFAULT 0,
                        inserted_at TEXT NOT NULL
                    )",
                    [],
                )?;
                conn.execute(
                    "CREATE TABLE IF NOT EXISTS processed_records (
                        id INTEGER PRIMARY KEY,
                        text TEXT NOT NULL,
                        embedding_id TEXT NOT NULL,
                        source TEXT NOT NULL,
                        processed INTEGER NOT NULL
                    )",
                    [],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn query_raw(&self, where_clause: &'static str) -> Result<Vec<RawRecord>, RagError> {
        let rows: Vec<RawRow> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {RAW_COLUMNS} FROM raw_records {where_clause} ORDER BY id"
                ))?;
                let rows = stmt.query_map([], |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                    ))
                })?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await?;

        rows.into_iter().map(raw_record_from_row).collect()
    }
}

fn raw_record_from_row(row: RawRow) -> Result<RawRecord, RagError> {
    let (id, url, source, title, text, processed, inserted_at) = row;
    Ok(RawRecord {
        id,
        url,
        source: source.parse::<Source>()?,
        title,
        text,
        processed,
        inserted_at: parse_timestamp(&inserted_at)?,
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RagError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| RagError::Store(format!("invalid inserted_at '{raw}': {err}")))
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn insert_raw(&self, records: Vec<NewRawRecord>) -> Result<usize, RagError> {
        if records.is_empty() {
            return Ok(0);
        }
        let now = Utc::now().to_rfc3339();
        let count = records.len();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                for record in records {
                    tx.execute(
                        "INSERT INTO raw_records (url, source, title, text, processed, inserted_at)
                         VALUES (?1, ?2, ?3, ?4, 0, ?5)",
                        (
                            record.url,
                            record.source.as_str(),
                            record.title,
                            record.text,
                            now.clone(),
                        ),
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await?;
        debug!(count, "appended raw records");
        Ok(count)
    }

    async fn list_raw(&self) -> Result<Vec<RawRecord>, RagError> {
        self.query_raw("").await
    }

    async fn list_unprocessed(&self) -> Result<Vec<RawRecord>, RagError> {
        self.query_raw("WHERE processed = 0").await
    }

    async fn list_processed_raw(&self) -> Result<Vec<RawRecord>, RagError> {
        self.query_raw("WHERE processed = 1").await
    }

    async fn replace_raw(&self, records: Vec<RawRecord>) -> Result<usize, RagError> {
        let count = records.len();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM raw_records", [])?;
                for record in records {
                    tx.execute(
                        "INSERT INTO raw_records (id, url, source, title, text, processed, inserted_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        (
                            record.id,
                            record.url,
                            record.source.as_str(),
                            record.title,
                            record.text,
                            record.processed,
                            record.inserted_at.to_rfc3339(),
                        ),
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await?;
        debug!(count, "rewrote raw collection");
        Ok(count)
    }

    async fn mark_processed(&self, id: i64) -> Result<(), RagError> {
        let updated = self
            .conn
            .call(move |conn| {
                let updated =
                    conn.execute("UPDATE raw_records SET processed = 1 WHERE id = ?1", [id])?;
                Ok(updated)
            })
            .await?;
        if updated == 0 {
            return Err(RagError::Store(format!("no raw record with id {id}")));
        }
        Ok(())
    }

    async fn insert_processed(&self, record: ProcessedRecord) -> Result<(), RagError> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO processed_records (id, text, embedding_id, source, processed)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    (
                        record.id,
                        record.text,
                        record.embedding_id,
                        record.source.as_str(),
                        record.processed,
                    ),
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn get_processed(&self, id: i64) -> Result<Option<ProcessedRecord>, RagError> {
        let row: Option<(i64, String, String, String, bool)> = self
            .conn
            .call(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT id, text, embedding_id, source, processed
                         FROM processed_records WHERE id = ?1",
                        [id],
                        |row| {
                            Ok((
                                row.get(0)?,
                                row.get(1)?,
                                row.get(2)?,
                                row.get(3)?,
                                row.get(4)?,
                            ))
                        },
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;

        row.map(|(id, text, embedding_id, source, processed)| {
            Ok(ProcessedRecord {
                id,
                text,
                embedding_id,
                source: source.parse::<Source>()?,
                processed,
            })
        })
        .transpose()
    }

    async fn list_processed(&self) -> Result<Vec<ProcessedRecord>, RagError> {
        let rows: Vec<(i64, String, String, String, bool)> = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, text, embedding_id, source, processed
                     FROM processed_records ORDER BY id",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                })?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await?;

        rows.into_iter()
            .map(|(id, text, embedding_id, source, processed)| {
                Ok(ProcessedRecord {
                    id,
                    text,
                    embedding_id,
                    source: source.parse::<Source>()?,
                    processed,
                })
            })
            .collect()
    }

    async fn count_raw(&self) -> Result<usize, RagError> {
        let count: i64 = self
            .conn
            .call(|conn| {
                let count =
                    conn.query_row("SELECT COUNT(*) FROM raw_records", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count as usize)
    }

    async fn count_processed(&self) -> Result<usize, RagError> {
        let count: i64 = self
            .conn
            .call(|conn| {
                let count = conn.query_row("SELECT COUNT(*) FROM processed_records", [], |row| {
                    row.get(0)
                })?;
                Ok(count)
            })
            .await?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn round_trips_raw_records() {
        let dir = tempdir().unwrap();
        let store = SqliteDocumentStore::open(dir.path().join("docs.sqlite"))
            .await
            .unwrap();

        let inserted = store
            .insert_raw(vec![
                NewRawRecord::new("http://a", Source::Github).with_title("v1.0"),
                NewRawRecord::new("http://b", Source::Medium),
            ])
            .await
            .unwrap();
        assert_eq!(inserted, 2);

        let raw = store.list_raw().await.unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0].url, "http://a");
        assert_eq!(raw[0].source, Source::Github);
        assert_eq!(raw[0].title.as_deref(), Some("v1.0"));
        assert!(!raw[0].processed);
        assert_eq!(store.list_unprocessed().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn mark_processed_is_visible_and_final() {
        let dir = tempdir().unwrap();
        let store = SqliteDocumentStore::open(dir.path().join("docs.sqlite"))
            .await
            .unwrap();
        store
            .insert_raw(vec![NewRawRecord::new("http://a", Source::Linkedin)])
            .await
            .unwrap();

        let id = store.list_raw().await.unwrap()[0].id;
        store.mark_processed(id).await.unwrap();
        assert!(store.list_unprocessed().await.unwrap().is_empty());
        assert_eq!(store.list_processed_raw().await.unwrap().len(), 1);

        // Marking again is harmless.
        store.mark_processed(id).await.unwrap();
        assert_eq!(store.list_processed_raw().await.unwrap().len(), 1);

        assert!(store.mark_processed(9999).await.is_err());
    }

    #[tokio::test]
    async fn processed_mirror_round_trips() {
        let dir = tempdir().unwrap();
        let store = SqliteDocumentStore::open(dir.path().join("docs.sqlite"))
            .await
            .unwrap();

        let record = ProcessedRecord {
            id: 7,
            text: "some text".into(),
            embedding_id: "7".into(),
            source: Source::Youtube,
            processed: true,
        };
        store.insert_processed(record.clone()).await.unwrap();

        assert_eq!(store.get_processed(7).await.unwrap(), Some(record));
        assert_eq!(store.get_processed(8).await.unwrap(), None);
        assert_eq!(store.count_processed().await.unwrap(), 1);
    }
}
