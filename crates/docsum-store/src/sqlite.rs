//! SQLite-backed `ResultStore` with durable persistence.

use crate::{InsertOutcome, ResultStore, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use docsum_types::{AnalysisRecord, AnalysisView, DocumentId, DocumentRecord};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DOCUMENT_COLUMNS: &str = "document_id, file_name, location, size_bytes, uploaded_at";

/// Persistent SQLite store holding documents and their analyses.
#[derive(Debug)]
pub struct SqliteResultStore {
    db_path: PathBuf,
}

struct DocumentRow {
    id: String,
    file_name: String,
    location: String,
    size_bytes: Option<i64>,
    uploaded_at: String,
}

struct AnalysisRow {
    document_id: String,
    summary: String,
    analyzed_at: String,
}

impl SqliteResultStore {
    /// Creates a SQLite-backed store at `path`, creating schema if needed.
    pub fn new(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db_path = path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let store = Self { db_path };
        let connection = store.open_connection()?;
        store.initialize_schema(&connection)?;
        tracing::debug!(path = %store.db_path.display(), "result store ready");
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn open_connection(&self) -> StoreResult<Connection> {
        let connection = Connection::open(&self.db_path)?;
        connection.busy_timeout(Duration::from_secs(5))?;
        connection.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            "#,
        )?;
        Ok(connection)
    }

    fn initialize_schema(&self, connection: &Connection) -> StoreResult<()> {
        connection.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                document_id TEXT PRIMARY KEY,
                file_name TEXT NOT NULL,
                location TEXT NOT NULL,
                size_bytes INTEGER NULL,
                uploaded_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_uploaded_at
                ON documents (uploaded_at DESC, document_id DESC);

            CREATE TABLE IF NOT EXISTS analyses (
                document_id TEXT PRIMARY KEY,
                summary TEXT NOT NULL,
                analyzed_at TEXT NOT NULL,
                FOREIGN KEY(document_id) REFERENCES documents(document_id)
            );
            "#,
        )?;
        Ok(())
    }
}

#[async_trait]
impl ResultStore for SqliteResultStore {
    async fn register_document(&self, document: DocumentRecord) -> StoreResult<()> {
        let size_bytes = document
            .size_bytes
            .map(|size| {
                i64::try_from(size).map_err(|_| StoreError::InvalidPersistedValue {
                    field: "size_bytes",
                    value: size.to_string(),
                })
            })
            .transpose()?;

        let connection = self.open_connection()?;
        let inserted = connection.execute(
            r#"
            INSERT INTO documents (document_id, file_name, location, size_bytes, uploaded_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(document_id) DO NOTHING
            "#,
            params![
                document.id.as_str(),
                document.file_name,
                document.location,
                size_bytes,
                timestamp_to_db(document.uploaded_at),
            ],
        )?;
        if inserted == 0 {
            return Err(StoreError::DocumentAlreadyExists(document.id));
        }
        Ok(())
    }

    async fn lookup_document(&self, id: &DocumentId) -> StoreResult<Option<DocumentRecord>> {
        let connection = self.open_connection()?;
        let row = connection
            .query_row(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE document_id = ?1"),
                params![id.as_str()],
                read_document_row,
            )
            .optional()?;
        row.map(document_from_row).transpose()
    }

    async fn list_documents(&self) -> StoreResult<Vec<DocumentRecord>> {
        let connection = self.open_connection()?;
        let mut statement = connection.prepare(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents \
             ORDER BY uploaded_at DESC, document_id DESC"
        ))?;
        let rows = statement
            .query_map([], read_document_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(document_from_row).collect()
    }

    async fn lookup_analysis(&self, id: &DocumentId) -> StoreResult<Option<AnalysisRecord>> {
        let connection = self.open_connection()?;
        let row = connection
            .query_row(
                "SELECT document_id, summary, analyzed_at FROM analyses WHERE document_id = ?1",
                params![id.as_str()],
                read_analysis_row,
            )
            .optional()?;
        row.map(analysis_from_row).transpose()
    }

    async fn lookup_analysis_with_document_name(
        &self,
        id: &DocumentId,
    ) -> StoreResult<Option<AnalysisView>> {
        let connection = self.open_connection()?;
        let row = connection
            .query_row(
                r#"
                SELECT analyses.document_id, analyses.summary, analyses.analyzed_at,
                       documents.file_name
                FROM analyses
                INNER JOIN documents ON documents.document_id = analyses.document_id
                WHERE analyses.document_id = ?1
                "#,
                params![id.as_str()],
                |row| Ok((read_analysis_row(row)?, row.get::<_, String>(3)?)),
            )
            .optional()?;
        row.map(|(analysis, file_name)| {
            Ok(AnalysisView {
                record: analysis_from_row(analysis)?,
                file_name,
            })
        })
        .transpose()
    }

    async fn insert_analysis_if_absent(
        &self,
        record: AnalysisRecord,
    ) -> StoreResult<InsertOutcome> {
        let mut connection = self.open_connection()?;
        let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let document_exists = transaction
            .query_row(
                "SELECT 1 FROM documents WHERE document_id = ?1",
                params![record.document_id.as_str()],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !document_exists {
            return Err(StoreError::UnknownDocument(record.document_id));
        }

        let inserted = transaction.execute(
            r#"
            INSERT INTO analyses (document_id, summary, analyzed_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(document_id) DO NOTHING
            "#,
            params![
                record.document_id.as_str(),
                record.summary,
                timestamp_to_db(record.analyzed_at),
            ],
        )?;

        let outcome = if inserted == 1 {
            InsertOutcome::Inserted(record)
        } else {
            let existing = transaction.query_row(
                "SELECT document_id, summary, analyzed_at FROM analyses WHERE document_id = ?1",
                params![record.document_id.as_str()],
                read_analysis_row,
            )?;
            InsertOutcome::AlreadyExists(analysis_from_row(existing)?)
        };
        transaction.commit()?;
        Ok(outcome)
    }
}

fn read_document_row(row: &Row<'_>) -> rusqlite::Result<DocumentRow> {
    Ok(DocumentRow {
        id: row.get(0)?,
        file_name: row.get(1)?,
        location: row.get(2)?,
        size_bytes: row.get(3)?,
        uploaded_at: row.get(4)?,
    })
}

fn read_analysis_row(row: &Row<'_>) -> rusqlite::Result<AnalysisRow> {
    Ok(AnalysisRow {
        document_id: row.get(0)?,
        summary: row.get(1)?,
        analyzed_at: row.get(2)?,
    })
}

fn document_from_row(row: DocumentRow) -> StoreResult<DocumentRecord> {
    let size_bytes = row
        .size_bytes
        .map(|size| {
            u64::try_from(size).map_err(|_| StoreError::InvalidPersistedValue {
                field: "size_bytes",
                value: size.to_string(),
            })
        })
        .transpose()?;
    Ok(DocumentRecord {
        id: document_id_from_db(&row.id)?,
        file_name: row.file_name,
        location: row.location,
        size_bytes,
        uploaded_at: timestamp_from_db(&row.uploaded_at)?,
    })
}

fn analysis_from_row(row: AnalysisRow) -> StoreResult<AnalysisRecord> {
    Ok(AnalysisRecord {
        document_id: document_id_from_db(&row.document_id)?,
        summary: row.summary,
        analyzed_at: timestamp_from_db(&row.analyzed_at)?,
    })
}

fn document_id_from_db(value: &str) -> StoreResult<DocumentId> {
    DocumentId::parse(value).map_err(|_| StoreError::InvalidPersistedValue {
        field: "document_id",
        value: value.to_string(),
    })
}

// Fixed-width UTC text so lexical order matches chronological order.
fn timestamp_to_db(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn timestamp_from_db(value: &str) -> StoreResult<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::SqliteResultStore;
    use crate::{InsertOutcome, ResultStore, StoreError};
    use chrono::{Duration, Utc};
    use docsum_types::{AnalysisRecord, DocumentId, DocumentRecord};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn document(name: &str, size_bytes: Option<u64>) -> DocumentRecord {
        DocumentRecord::new(
            DocumentId::generate(),
            name,
            format!("https://docs.s3.amazonaws.com/1700000000000-{name}"),
            size_bytes,
        )
    }

    #[tokio::test]
    async fn persists_documents_and_analyses_across_reopen() {
        let temp = tempdir().expect("create tempdir");
        let db_path = temp.path().join("nested").join("docsum.sqlite");
        let document = document("report.pdf", Some(1_024));
        let id = document.id.clone();
        let record = AnalysisRecord::new(id.clone(), "report summary");

        {
            let store = SqliteResultStore::new(&db_path).expect("create sqlite store");
            store
                .register_document(document.clone())
                .await
                .expect("register document");
            let outcome = store
                .insert_analysis_if_absent(record.clone())
                .await
                .expect("insert analysis");
            assert_eq!(outcome, InsertOutcome::Inserted(record.clone()));
        }

        let reopened = SqliteResultStore::new(&db_path).expect("reopen sqlite store");
        assert_eq!(
            reopened.lookup_document(&id).await.expect("lookup document"),
            Some(document)
        );
        assert_eq!(
            reopened.lookup_analysis(&id).await.expect("lookup analysis"),
            Some(record.clone())
        );
        let view = reopened
            .lookup_analysis_with_document_name(&id)
            .await
            .expect("lookup view")
            .expect("view present");
        assert_eq!(view.record, record);
        assert_eq!(view.file_name, "report.pdf");
    }

    #[tokio::test]
    async fn second_insert_returns_existing_record() {
        let temp = tempdir().expect("create tempdir");
        let store = SqliteResultStore::new(temp.path().join("docsum.sqlite")).expect("store");
        let document = document("a.txt", None);
        let id = document.id.clone();
        store.register_document(document).await.expect("register");

        let first = AnalysisRecord::new(id.clone(), "first");
        store
            .insert_analysis_if_absent(first.clone())
            .await
            .expect("insert");
        let outcome = store
            .insert_analysis_if_absent(AnalysisRecord::new(id.clone(), "second"))
            .await
            .expect("insert");
        assert_eq!(outcome, InsertOutcome::AlreadyExists(first));
    }

    #[tokio::test]
    async fn concurrent_inserts_across_handles_leave_one_record() {
        let temp = tempdir().expect("create tempdir");
        let db_path = temp.path().join("docsum.sqlite");
        let seed = SqliteResultStore::new(&db_path).expect("store");
        let document = document("b.txt", Some(3));
        let id = document.id.clone();
        seed.register_document(document).await.expect("register");

        let mut handles = Vec::new();
        for index in 0..8 {
            let store = Arc::new(SqliteResultStore::new(&db_path).expect("store"));
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                store
                    .insert_analysis_if_absent(AnalysisRecord::new(id, format!("summary {index}")))
                    .await
                    .expect("insert")
            }));
        }
        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.expect("join"));
        }
        assert_eq!(outcomes.iter().filter(|o| o.was_inserted()).count(), 1);
        let stored = seed
            .lookup_analysis(&id)
            .await
            .expect("lookup")
            .expect("stored");
        assert!(outcomes.iter().all(|outcome| outcome.record() == &stored));
    }

    #[tokio::test]
    async fn rejects_duplicate_documents_and_unknown_analysis_targets() {
        let temp = tempdir().expect("create tempdir");
        let store = SqliteResultStore::new(temp.path().join("docsum.sqlite")).expect("store");
        let document = document("c.txt", None);
        store
            .register_document(document.clone())
            .await
            .expect("register");
        assert!(matches!(
            store.register_document(document).await,
            Err(StoreError::DocumentAlreadyExists(_))
        ));
        assert!(matches!(
            store
                .insert_analysis_if_absent(AnalysisRecord::new(DocumentId::generate(), "x"))
                .await,
            Err(StoreError::UnknownDocument(_))
        ));
    }

    #[tokio::test]
    async fn lists_documents_newest_first_and_empty_when_unseeded() {
        let temp = tempdir().expect("create tempdir");
        let store = SqliteResultStore::new(temp.path().join("docsum.sqlite")).expect("store");
        assert!(store.list_documents().await.expect("list").is_empty());

        let mut oldest = document("oldest.txt", None);
        oldest.uploaded_at = Utc::now() - Duration::days(2);
        let mut middle = document("middle.txt", None);
        middle.uploaded_at = Utc::now() - Duration::minutes(5);
        let newest = document("newest.txt", Some(7));
        for document in [middle, newest, oldest] {
            store.register_document(document).await.expect("register");
        }

        let names = store
            .list_documents()
            .await
            .expect("list")
            .into_iter()
            .map(|document| document.file_name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["newest.txt", "middle.txt", "oldest.txt"]);
    }
}
