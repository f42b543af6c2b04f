//! SQLite Alert Store
//!
//! One connection behind a mutex; every call runs on the blocking pool. A batch
//! is a single transaction, so a failed insert leaves nothing behind.

use super::store::AlertStore;
use super::types::*;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub struct SqliteAlertStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAlertStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("opening alert database {}", path.display()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(|e| e.into_inner());
            f(&mut guard)
        })
        .await
        .context("alert store task panicked")?
    }
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS alerts (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          task_id TEXT NOT NULL,
          task_type TEXT NOT NULL,
          image_path TEXT NOT NULL,
          detection_count INTEGER NOT NULL,
          created_at INTEGER NOT NULL,
          algorithm_id TEXT NOT NULL DEFAULT '',
          algorithm_name TEXT NOT NULL DEFAULT '',
          confidence REAL NOT NULL DEFAULT 0,
          inference_time_ms INTEGER NOT NULL DEFAULT 0,
          result_json TEXT NOT NULL DEFAULT 'null'
        );

        CREATE INDEX IF NOT EXISTS idx_alerts_created ON alerts(created_at DESC, id DESC);
        CREATE INDEX IF NOT EXISTS idx_alerts_task_id ON alerts(task_id);
        "#,
    )?;
    Ok(())
}

const SELECT_COLUMNS: &str = "id, task_id, task_type, image_path, detection_count, created_at, \
     algorithm_id, algorithm_name, confidence, inference_time_ms, result_json";

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<AlertRecord> {
    let result_json: String = row.get(10)?;
    Ok(AlertRecord {
        id: Some(row.get(0)?),
        task_id: row.get(1)?,
        task_type: row.get(2)?,
        image_path: row.get(3)?,
        detection_count: row.get::<_, i64>(4)? as u64,
        created_at: row.get::<_, i64>(5)? as u64,
        algorithm_id: row.get(6)?,
        algorithm_name: row.get(7)?,
        confidence: row.get(8)?,
        inference_time_ms: row.get::<_, i64>(9)? as u64,
        result: serde_json::from_str(&result_json).unwrap_or(serde_json::Value::Null),
    })
}

/// WHERE clause and its bound values for `query`.
fn filter_clause(query: &AlertQuery) -> (String, Vec<rusqlite::types::Value>) {
    use rusqlite::types::Value;

    let mut clauses = Vec::new();
    let mut values = Vec::new();

    if let Some(task_id) = &query.task_id {
        values.push(Value::Text(task_id.clone()));
        clauses.push(format!("task_id = ?{}", values.len()));
    }
    if let Some(task_type) = &query.task_type {
        values.push(Value::Text(task_type.clone()));
        clauses.push(format!("task_type = ?{}", values.len()));
    }
    if let Some(min) = query.min_detections {
        values.push(Value::Integer(min as i64));
        clauses.push(format!("detection_count >= ?{}", values.len()));
    }
    if let Some(max) = query.max_detections {
        values.push(Value::Integer(max.min(i64::MAX as u64) as i64));
        clauses.push(format!("detection_count <= ?{}", values.len()));
    }
    if let Some(start) = query.start_time {
        values.push(Value::Integer(start.min(i64::MAX as u64) as i64));
        clauses.push(format!("created_at >= ?{}", values.len()));
    }
    if let Some(end) = query.end_time {
        values.push(Value::Integer(end.min(i64::MAX as u64) as i64));
        clauses.push(format!("created_at <= ?{}", values.len()));
    }

    if clauses.is_empty() {
        (String::new(), values)
    } else {
        (format!("WHERE {}", clauses.join(" AND ")), values)
    }
}

#[async_trait]
impl AlertStore for SqliteAlertStore {
    async fn insert_batch(&self, records: &[AlertRecord]) -> Result<Vec<i64>> {
        let records = records.to_vec();

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mut ids = Vec::with_capacity(records.len());
            {
                let mut stmt = tx.prepare(
                    r#"
                    INSERT INTO alerts(task_id, task_type, image_path, detection_count, created_at,
                                       algorithm_id, algorithm_name, confidence, inference_time_ms, result_json)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    "#,
                )?;
                for record in &records {
                    stmt.execute(params![
                        record.task_id,
                        record.task_type,
                        record.image_path,
                        record.detection_count as i64,
                        record.created_at as i64,
                        record.algorithm_id,
                        record.algorithm_name,
                        record.confidence,
                        record.inference_time_ms as i64,
                        serde_json::to_string(&record.result)?,
                    ])?;
                    ids.push(tx.last_insert_rowid());
                }
            }
            tx.commit()?;
            Ok(ids)
        })
        .await
    }

    async fn list(&self, query: &AlertQuery) -> Result<AlertPage> {
        let query = query.clone();

        self.with_conn(move |conn| {
            let (where_sql, mut values) = filter_clause(&query);

            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM alerts {}", where_sql),
                rusqlite::params_from_iter(values.iter()),
                |row| row.get(0),
            )?;

            values.push(rusqlite::types::Value::Integer(query.page_size() as i64));
            values.push(rusqlite::types::Value::Integer(query.offset() as i64));
            let sql = format!(
                "SELECT {} FROM alerts {} ORDER BY created_at DESC, id DESC LIMIT ?{} OFFSET ?{}",
                SELECT_COLUMNS,
                where_sql,
                values.len() - 1,
                values.len()
            );

            let mut stmt = conn.prepare(&sql)?;
            let items = stmt
                .query_map(rusqlite::params_from_iter(values.iter()), row_to_record)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(AlertPage {
                items,
                total: total as u64,
                page: query.page(),
                page_size: query.page_size(),
            })
        })
        .await
    }

    async fn get(&self, id: i64) -> Result<Option<AlertRecord>> {
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {} FROM alerts WHERE id = ?1", SELECT_COLUMNS),
                    params![id],
                    row_to_record,
                )
                .optional()?)
        })
        .await
    }

    async fn task_ids(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT DISTINCT task_id FROM alerts ORDER BY task_id ASC")?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(ids)
        })
        .await
    }

    async fn count(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM alerts", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        self.with_conn(move |conn| {
            let removed = conn.execute("DELETE FROM alerts WHERE id = ?1", params![id])?;
            Ok(removed > 0)
        })
        .await
    }

    async fn delete_many(&self, ids: &[i64]) -> Result<u64> {
        let ids = ids.to_vec();

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mut removed = 0u64;
            {
                let mut stmt = tx.prepare("DELETE FROM alerts WHERE id = ?1")?;
                for id in &ids {
                    removed += stmt.execute(params![id])? as u64;
                }
            }
            tx.commit()?;
            Ok(removed)
        })
        .await
    }
}
