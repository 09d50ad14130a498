//! SQLite vector index built on `sqlite-vec` `vec0` virtual tables.
//!
//! Each collection is a pair of tables: a payload table keyed by point id
//! and a `vec0` virtual table whose rowid mirrors that id. A small meta
//! table records the declared dimensionality and distance metric so later
//! opens validate against the same configuration.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::Once;

use async_trait::async_trait;
use tokio_rusqlite::{Connection, OptionalExtension, ffi};

use crate::types::{PointPayload, RagError, Source, VectorPoint};

use super::{Distance, VectorIndex};

/// Vector index persisting one collection in a SQLite database.
#[derive(Clone)]
pub struct SqliteVectorIndex {
    conn: Connection,
    collection: String,
}

impl SqliteVectorIndex {
    /// Opens the database at `path` for the named collection.
    ///
    /// The collection's tables are created by [`VectorIndex::reset`], not
    /// here; upserting into a collection that was never reset is an error.
    pub async fn open(path: impl AsRef<Path>, collection: &str) -> Result<Self, RagError> {
        Self::register_sqlite_vec()?;
        let conn = Connection::open(path)
            .await
            .map_err(|err| RagError::Store(err.to_string()))?;
        // Fail fast if the extension did not load.
        conn.call(|conn| {
            let version =
                conn.query_row("SELECT vec_version()", [], |row| row.get::<_, String>(0));
            match version {
                Ok(_) => Ok(()),
                Err(err) => Err(tokio_rusqlite::Error::Error(err)),
            }
        })
        .await
        .map_err(|err| RagError::Store(format!("sqlite-vec unavailable: {err}")))?;

        Ok(Self {
            conn,
            collection: sanitize_ident(collection),
        })
    }

    fn register_sqlite_vec() -> Result<(), RagError> {
        use std::sync::Mutex;

        static INIT: Once = Once::new();
        static INIT_RESULT: Mutex<Option<Result<(), String>>> = Mutex::new(None);

        INIT.call_once(|| {
            let result = unsafe {
                type SqliteExtensionInit = unsafe extern "C" fn(
                    *mut ffi::sqlite3,
                    *mut *mut c_char,
                    *const ffi::sqlite3_api_routines,
                ) -> i32;

                let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
                let init_fn: SqliteExtensionInit =
                    transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
                let rc = ffi::sqlite3_auto_extension(Some(init_fn));
                if rc != 0 {
                    Err(format!(
                        "failed to register sqlite-vec extension (code {rc})"
                    ))
                } else {
                    Ok(())
                }
            };
            *INIT_RESULT.lock().expect("init result mutex poisoned") = Some(result);
        });

        INIT_RESULT
            .lock()
            .expect("init result mutex poisoned")
            .clone()
            .expect("init was called but result not set")
            .map_err(RagError::Store)
    }

    fn payload_table(&self) -> String {
        self.collection.clone()
    }

    fn vectors_table(&self) -> String {
        format!("{}_vectors", self.collection)
    }

    fn meta_table(&self) -> String {
        format!("{}_meta", self.collection)
    }

    /// Declared (dimension, metric) of the collection, if it exists.
    async fn config(&self) -> Result<Option<(usize, Distance)>, RagError> {
        let meta = self.meta_table();
        let row: Option<(i64, String)> = self
            .conn
            .call(move |conn| {
                let exists = conn
                    .query_row(
                        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                        [meta.clone()],
                        |_| Ok(()),
                    )
                    .optional()?;
                if exists.is_none() {
                    return Ok(None);
                }
                let row = conn
                    .query_row(
                        &format!("SELECT dimension, metric FROM {meta}"),
                        [],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;

        row.map(|(dimension, metric)| {
            let metric = match metric.as_str() {
                "cosine" => Distance::Cosine,
                "l2" => Distance::L2,
                other => {
                    return Err(RagError::Store(format!("unknown distance metric '{other}'")));
                }
            };
            Ok((dimension as usize, metric))
        })
        .transpose()
    }

    async fn require_config(&self) -> Result<(usize, Distance), RagError> {
        self.config().await?.ok_or_else(|| {
            RagError::Store(format!(
                "collection '{}' does not exist; call reset first",
                self.collection
            ))
        })
    }

    fn validate(point: &VectorPoint, dimension: usize) -> Result<String, RagError> {
        if point.vector.len() != dimension {
            return Err(RagError::Store(format!(
                "vector for point {} has length {}, collection expects {dimension}",
                point.id,
                point.vector.len()
            )));
        }
        serde_json::to_string(&point.vector)
            .map_err(|err| RagError::Store(format!("unserializable vector: {err}")))
    }
}

fn sanitize_ident(input: &str) -> String {
    input
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect()
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn reset(&self, dimension: usize, metric: Distance) -> Result<(), RagError> {
        let payload = self.payload_table();
        let vectors = self.vectors_table();
        let meta = self.meta_table();
        let metric_name = match metric {
            Distance::Cosine => "cosine",
            Distance::L2 => "l2",
        };
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(&format!("DROP TABLE IF EXISTS {vectors}"), [])?;
                tx.execute(&format!("DROP TABLE IF EXISTS {payload}"), [])?;
                tx.execute(&format!("DROP TABLE IF EXISTS {meta}"), [])?;
                tx.execute(
                    &format!(
                        "CREATE TABLE {payload} (
                            id INTEGER PRIMARY KEY,
                            source TEXT NOT NULL
                        )"
                    ),
                    [],
                )?;
                tx.execute(
                    &format!("CREATE VIRTUAL TABLE {vectors} USING vec0(embedding float[{dimension}])"),
                    [],
                )?;
                tx.execute(
                    &format!(
                        "CREATE TABLE {meta} (dimension INTEGER NOT NULL, metric TEXT NOT NULL)"
                    ),
                    [],
                )?;
                tx.execute(
                    &format!("INSERT INTO {meta} (dimension, metric) VALUES (?1, ?2)"),
                    (dimension as i64, metric_name),
                )?;
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn ensure(&self, dimension: usize, metric: Distance) -> Result<(), RagError> {
        if self.config().await?.is_some() {
            return Ok(());
        }
        self.reset(dimension, metric).await
    }

    async fn upsert(&self, point: VectorPoint) -> Result<(), RagError> {
        self.upsert_batch(vec![point]).await
    }

    async fn upsert_batch(&self, points: Vec<VectorPoint>) -> Result<(), RagError> {
        if points.is_empty() {
            return Ok(());
        }
        let (dimension, _) = self.require_config().await?;
        let mut rows = Vec::with_capacity(points.len());
        for point in &points {
            let encoded = Self::validate(point, dimension)?;
            rows.push((point.id, point.payload.source.as_str(), encoded));
        }

        let payload = self.payload_table();
        let vectors = self.vectors_table();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                for (id, source, embedding) in rows {
                    tx.execute(&format!("DELETE FROM {vectors} WHERE rowid = ?1"), [id])?;
                    tx.execute(&format!("DELETE FROM {payload} WHERE id = ?1"), [id])?;
                    tx.execute(
                        &format!("INSERT INTO {payload} (id, source) VALUES (?1, ?2)"),
                        (id, source),
                    )?;
                    tx.execute(
                        &format!("INSERT INTO {vectors} (rowid, embedding) VALUES (?1, ?2)"),
                        (id, embedding),
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn count(&self) -> Result<usize, RagError> {
        if self.config().await?.is_none() {
            return Ok(0);
        }
        let payload = self.payload_table();
        let count: i64 = self
            .conn
            .call(move |conn| {
                let count =
                    conn.query_row(&format!("SELECT COUNT(*) FROM {payload}"), [], |row| {
                        row.get(0)
                    })?;
                Ok(count)
            })
            .await?;
        Ok(count as usize)
    }

    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<(VectorPoint, f32)>, RagError> {
        let (dimension, metric) = self.require_config().await?;
        if query.len() != dimension {
            return Err(RagError::Store(format!(
                "query vector has length {}, collection expects {dimension}",
                query.len()
            )));
        }
        let encoded = serde_json::to_string(query)
            .map_err(|err| RagError::Store(format!("unserializable query vector: {err}")))?;

        let payload = self.payload_table();
        let vectors = self.vectors_table();
        let distance_fn = metric.sql_function();
        let rows: Vec<(i64, String, String, f32)> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT p.id, p.source, vec_to_json(v.embedding),
                            {distance_fn}(v.embedding, vec_f32(?1)) AS distance
                     FROM {payload} p
                     JOIN {vectors} v ON v.rowid = p.id
                     ORDER BY distance ASC
                     LIMIT {top_k}"
                ))?;
                let rows = stmt.query_map([encoded], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                })?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await?;

        rows.into_iter()
            .map(|(id, source, embedding, distance)| {
                let vector: Vec<f32> = serde_json::from_str(&embedding)
                    .map_err(|err| RagError::Store(format!("corrupt stored vector: {err}")))?;
                Ok((
                    VectorPoint {
                        id,
                        vector,
                        payload: PointPayload {
                            source: source.parse::<Source>()?,
                        },
                    },
                    distance,
                ))
            })
            .collect()
    }
}
