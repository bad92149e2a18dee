//! Database statistics overview.
//!
//! Provides a quick summary of what's indexed: document and chunk counts,
//! chunk size distribution, per-type breakdowns, and recent error logs.
//! Used by `docmill stats` to give confidence that syncs are working as
//! expected.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;

/// Days of processing-log history summarized in the error section.
const ERROR_WINDOW_DAYS: i64 = 7;

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(&config.db.path).await?;
    crate::migrate::run_migrations(&pool).await?;

    let total_docs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
        .fetch_one(&pool)
        .await?;

    let processed_docs: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE status = 'processed'")
            .fetch_one(&pool)
            .await?;

    let total_chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
        .fetch_one(&pool)
        .await?;

    let total_chapters: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chapters")
        .fetch_one(&pool)
        .await?;

    let size_row = sqlx::query(
        "SELECT AVG(chunk_size) AS avg_size, MIN(chunk_size) AS min_size, \
         MAX(chunk_size) AS max_size FROM chunks",
    )
    .fetch_one(&pool)
    .await?;
    let avg_size: Option<f64> = size_row.get("avg_size");
    let min_size: Option<i64> = size_row.get("min_size");
    let max_size: Option<i64> = size_row.get("max_size");

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Docmill — Database Stats");
    println!("========================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Documents:   {} ({} processed)", total_docs, processed_docs);
    println!("  Chapters:    {}", total_chapters);
    println!("  Chunks:      {}", total_chunks);
    if let (Some(avg), Some(min), Some(max)) = (avg_size, min_size, max_size) {
        println!(
            "  Chunk size:  avg {:.0} / min {} / max {} chars",
            avg, min, max
        );
    }

    // Per-type breakdown
    let type_rows = sqlx::query(
        r#"
        SELECT
            d.file_type,
            COUNT(DISTINCT d.id) AS doc_count,
            COUNT(c.id) AS chunk_count
        FROM documents d
        LEFT JOIN chunks c ON c.document_id = d.id
        GROUP BY d.file_type
        ORDER BY doc_count DESC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    if !type_rows.is_empty() {
        println!();
        println!("  By type:");
        println!("  {:<10} {:>6} {:>8}", "TYPE", "DOCS", "CHUNKS");
        println!("  {}", "-".repeat(26));
        for row in &type_rows {
            println!(
                "  {:<10} {:>6} {:>8}",
                row.get::<String, _>("file_type"),
                row.get::<i64, _>("doc_count"),
                row.get::<i64, _>("chunk_count"),
            );
        }
    }

    // Recent errors
    let window_start = chrono::Utc::now().timestamp() - ERROR_WINDOW_DAYS * 86400;
    let error_rows = sqlx::query(
        "SELECT operation, COUNT(*) AS n FROM processing_logs \
         WHERE status = 'error' AND created_at >= ? \
         GROUP BY operation ORDER BY n DESC",
    )
    .bind(window_start)
    .fetch_all(&pool)
    .await?;

    if !error_rows.is_empty() {
        println!();
        println!("  Errors (last {} days):", ERROR_WINDOW_DAYS);
        for row in &error_rows {
            println!(
                "  {:<24} {}",
                row.get::<String, _>("operation"),
                row.get::<i64, _>("n")
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
