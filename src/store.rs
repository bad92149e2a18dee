//! SQLite persistence for documents, chapters, chunks, and processing logs.
//!
//! A reprocessed document's chapters and chunks are fully replaced inside
//! one transaction together with the document upsert, so partial writes are
//! never visible.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{ChapterDivision, ChunkRecord, FileRecord, StoredState};

/// Stored state for a file, looked up by absolute path. Path is the
/// identity key; the fingerprint is only the change signal.
pub async fn stored_state_by_path(pool: &SqlitePool, path: &str) -> Result<Option<StoredState>> {
    let row = sqlx::query(
        "SELECT id, file_hash, modification_timestamp, content_length \
         FROM documents WHERE file_path = ?",
    )
    .bind(path)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| StoredState {
        document_id: r.get("id"),
        fingerprint: r.get("file_hash"),
        modified_at: r.get("modification_timestamp"),
        content_length: r.get("content_length"),
    }))
}

/// Upsert the document row and replace its chapters and chunks as one
/// logical unit. Returns the document id.
pub async fn persist_document(
    pool: &SqlitePool,
    file: &FileRecord,
    existing_id: Option<&str>,
    content_length: usize,
    chapters: &[ChapterDivision],
    chunks: &[ChunkRecord],
) -> Result<String> {
    let doc_id = existing_id
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let now = chrono::Utc::now().timestamp();

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO documents (id, file_path, file_name, file_type, file_size, content_length,
                               file_hash, fingerprint_degraded, modification_timestamp,
                               last_processed, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'processed')
        ON CONFLICT(file_path) DO UPDATE SET
            file_name = excluded.file_name,
            file_type = excluded.file_type,
            file_size = excluded.file_size,
            content_length = excluded.content_length,
            file_hash = excluded.file_hash,
            fingerprint_degraded = excluded.fingerprint_degraded,
            modification_timestamp = excluded.modification_timestamp,
            last_processed = excluded.last_processed,
            status = excluded.status
        "#,
    )
    .bind(&doc_id)
    .bind(&file.path)
    .bind(&file.name)
    .bind(&file.file_type)
    .bind(file.size as i64)
    .bind(content_length as i64)
    .bind(&file.fingerprint)
    .bind(file.degraded_fingerprint)
    .bind(file.modified_at)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    // Replace chapters
    sqlx::query("DELETE FROM chapters WHERE document_id = ?")
        .bind(&doc_id)
        .execute(&mut *tx)
        .await?;
    for (i, chapter) in chapters.iter().enumerate() {
        let end_offset = chapters
            .get(i + 1)
            .map(|next| next.start_offset)
            .unwrap_or(content_length);
        sqlx::query(
            "INSERT INTO chapters (document_id, chapter_index, title, kind, level, \
             start_offset, end_offset, preview) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&doc_id)
        .bind(i as i64)
        .bind(&chapter.title)
        .bind(chapter.kind.as_str())
        .bind(chapter.level as i64)
        .bind(chapter.start_offset as i64)
        .bind(end_offset as i64)
        .bind(&chapter.preview)
        .execute(&mut *tx)
        .await?;
    }

    // Replace chunks
    sqlx::query("DELETE FROM chunks WHERE document_id = ?")
        .bind(&doc_id)
        .execute(&mut *tx)
        .await?;
    for chunk in chunks {
        sqlx::query(
            "INSERT INTO chunks (document_id, chunk_index, content, chunk_size, \
             start_position, end_position, overlap_size, chapter_title, chapter_kind, \
             chapter_level, absolute_start, absolute_end, is_chapter_complete) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&doc_id)
        .bind(chunk.chunk_index)
        .bind(&chunk.content)
        .bind(chunk.chunk_size)
        .bind(chunk.start_position)
        .bind(chunk.end_position)
        .bind(chunk.overlap_size)
        .bind(chunk.chapter.as_ref().map(|c| c.title.as_str()))
        .bind(chunk.chapter.as_ref().map(|c| c.kind.as_str()))
        .bind(chunk.chapter.as_ref().map(|c| c.level as i64))
        .bind(chunk.chapter.as_ref().map(|c| c.absolute_start))
        .bind(chunk.chapter.as_ref().map(|c| c.absolute_end))
        .bind(
            chunk
                .chapter
                .as_ref()
                .map(|c| c.is_chapter_complete)
                .unwrap_or(false),
        )
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(doc_id)
}

/// Append one processing-log row.
pub async fn append_log(
    pool: &SqlitePool,
    document_id: Option<&str>,
    operation: &str,
    status: &str,
    message: &str,
) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        "INSERT INTO processing_logs (document_id, operation, status, message, created_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(document_id)
    .bind(operation)
    .bind(status)
    .bind(message)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use crate::models::{ChapterContext, DivisionKind};

    async fn test_pool() -> SqlitePool {
        // One connection: each :memory: connection is its own database.
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        pool
    }

    fn file_record(path: &str, fingerprint: &str) -> FileRecord {
        FileRecord {
            name: "contrato.txt".to_string(),
            path: path.to_string(),
            relative_path: "contrato.txt".to_string(),
            size: 42,
            file_type: "txt".to_string(),
            modified_at: 1000.0,
            fingerprint: fingerprint.to_string(),
            degraded_fingerprint: false,
        }
    }

    fn chunk(index: i64, content: &str) -> ChunkRecord {
        ChunkRecord {
            chunk_index: index,
            content: content.to_string(),
            chunk_size: content.chars().count() as i64,
            start_position: 0,
            end_position: content.chars().count() as i64,
            overlap_size: 0,
            chapter: None,
        }
    }

    #[tokio::test]
    async fn missing_path_has_no_stored_state() {
        let pool = test_pool().await;
        let state = stored_state_by_path(&pool, "/nowhere.txt").await.unwrap();
        assert!(state.is_none());
    }

    #[tokio::test]
    async fn persist_then_read_back_state() {
        let pool = test_pool().await;
        let file = file_record("/docs/contrato.txt", "fp-1");
        let doc_id = persist_document(&pool, &file, None, 42, &[], &[chunk(0, "corpo")])
            .await
            .unwrap();

        let state = stored_state_by_path(&pool, "/docs/contrato.txt")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.document_id, doc_id);
        assert_eq!(state.fingerprint, "fp-1");
        assert_eq!(state.content_length, 42);
    }

    #[tokio::test]
    async fn reprocessing_replaces_chunks_and_keeps_the_id() {
        let pool = test_pool().await;
        let file = file_record("/docs/contrato.txt", "fp-1");
        let doc_id = persist_document(
            &pool,
            &file,
            None,
            42,
            &[],
            &[chunk(0, "um"), chunk(1, "dois"), chunk(2, "três")],
        )
        .await
        .unwrap();

        let updated = file_record("/docs/contrato.txt", "fp-2");
        let doc_id2 = persist_document(
            &pool,
            &updated,
            Some(doc_id.as_str()),
            10,
            &[],
            &[chunk(0, "novo")],
        )
        .await
        .unwrap();
        assert_eq!(doc_id, doc_id2);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE document_id = ?")
            .bind(&doc_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);

        let docs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(docs, 1);
    }

    #[tokio::test]
    async fn chapter_rows_carry_span_bounds() {
        let pool = test_pool().await;
        let file = file_record("/docs/sentenca.txt", "fp-1");
        let chapters = vec![
            ChapterDivision {
                title: "RELATÓRIO".to_string(),
                kind: DivisionKind::Fundamentacao,
                level: 1,
                start_offset: 0,
                preview: "RELATÓRIO".to_string(),
            },
            ChapterDivision {
                title: "DISPOSITIVO".to_string(),
                kind: DivisionKind::Dispositivo,
                level: 1,
                start_offset: 400,
                preview: "DISPOSITIVO".to_string(),
            },
        ];
        let chunks = vec![ChunkRecord {
            chunk_index: 0,
            content: "RELATÓRIO ...".to_string(),
            chunk_size: 13,
            start_position: 0,
            end_position: 13,
            overlap_size: 0,
            chapter: Some(ChapterContext {
                title: "RELATÓRIO".to_string(),
                kind: DivisionKind::Fundamentacao,
                level: 1,
                absolute_start: 0,
                absolute_end: 13,
                is_chapter_complete: true,
            }),
        }];

        persist_document(&pool, &file, None, 900, &chapters, &chunks)
            .await
            .unwrap();

        let rows = sqlx::query("SELECT title, kind, start_offset, end_offset FROM chapters ORDER BY chapter_index")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get::<String, _>("kind"), "FUNDAMENTACAO");
        assert_eq!(rows[0].get::<i64, _>("end_offset"), 400);
        assert_eq!(rows[1].get::<i64, _>("end_offset"), 900);

        let complete: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE is_chapter_complete = 1")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(complete, 1);
    }

    #[tokio::test]
    async fn log_rows_append() {
        let pool = test_pool().await;
        append_log(&pool, None, "text_extraction", "error", "sem texto")
            .await
            .unwrap();
        append_log(&pool, Some("doc-1"), "chunking_insert", "success", "ok")
            .await
            .unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM processing_logs")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }
}
