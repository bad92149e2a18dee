use anyhow::Result;
use sqlx::SqlitePool;

/// Create the schema. Idempotent; safe to run on every startup.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Documents table: one row per ingested file, keyed by absolute path.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            file_path TEXT NOT NULL UNIQUE,
            file_name TEXT NOT NULL,
            file_type TEXT NOT NULL,
            file_size INTEGER NOT NULL,
            content_length INTEGER NOT NULL DEFAULT 0,
            file_hash TEXT NOT NULL,
            fingerprint_degraded INTEGER NOT NULL DEFAULT 0,
            modification_timestamp REAL NOT NULL,
            last_processed INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Structural divisions detected per document.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chapters (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            document_id TEXT NOT NULL,
            chapter_index INTEGER NOT NULL,
            title TEXT NOT NULL,
            kind TEXT NOT NULL,
            level INTEGER NOT NULL,
            start_offset INTEGER NOT NULL,
            end_offset INTEGER NOT NULL,
            preview TEXT NOT NULL DEFAULT '',
            UNIQUE(document_id, chapter_index),
            FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Chunks; chapter_* columns are NULL for sliding-window output.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            document_id TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            content TEXT NOT NULL,
            chunk_size INTEGER NOT NULL,
            start_position INTEGER NOT NULL,
            end_position INTEGER NOT NULL,
            overlap_size INTEGER NOT NULL DEFAULT 0,
            chapter_title TEXT,
            chapter_kind TEXT,
            chapter_level INTEGER,
            absolute_start INTEGER,
            absolute_end INTEGER,
            is_chapter_complete INTEGER NOT NULL DEFAULT 0,
            UNIQUE(document_id, chunk_index),
            FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS processing_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            document_id TEXT,
            operation TEXT NOT NULL,
            status TEXT NOT NULL,
            message TEXT,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_file_hash ON documents(file_hash)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chapters_document_id ON chapters(document_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_document_id ON chunks(document_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_logs_document_id ON processing_logs(document_id)")
        .execute(pool)
        .await?;

    Ok(())
}
