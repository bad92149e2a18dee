//! Ingestion pipeline orchestration.
//!
//! Drives each scanned file through fingerprint comparison, text
//! extraction, optional chapter detection, chunking, and transactional
//! persistence. Unchanged files are skipped before any extraction work;
//! a file that fails is logged and counted without aborting the run.
//! Ctrl-C is honored between files.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::{debug, error, info, warn};

use crate::chunker::{ChapterChunker, SlidingWindowChunker};
use crate::config::{ChunkStrategy, Config, DetectorKind};
use crate::db;
use crate::detect::ai::AiDetector;
use crate::detect::rules::RuleBasedDetector;
use crate::detect::ChapterDetector;
use crate::extract;
use crate::models::{ChangeDecision, ChapterDivision, ChunkRecord, FileRecord, RunStats};
use crate::scanner;
use crate::store;

struct ProcessedCounts {
    chunks: u64,
    chapters: u64,
}

/// Run one sync pass. Returns the accumulated statistics even when the run
/// is interrupted; only failure to reach the database aborts.
pub async fn run_sync(
    config: &Config,
    full: bool,
    dry_run: bool,
    limit: Option<usize>,
) -> Result<RunStats> {
    let started = Instant::now();
    let mut stats = RunStats::default();

    let pool = db::connect(&config.db.path).await?;
    crate::migrate::run_migrations(&pool).await?;

    info!(root = %config.scanner.root.display(), "scanning document tree");
    let outcome = scanner::scan_documents(&config.scanner)?;
    let mut files = outcome.files;
    if let Some(lim) = limit {
        files.truncate(lim);
    }

    stats.total_files = files.len() as u64;
    stats.folders_scanned = outcome.stats.folders_scanned;
    stats.files_by_type = outcome.stats.files_by_type.clone();
    for folder in &outcome.stats.error_folders {
        stats.errors.push(format!("unreadable folder: {}", folder));
    }

    if dry_run {
        for file in &files {
            let stored = store::stored_state_by_path(&pool, &file.path).await?;
            let decision = ChangeDecision::evaluate(file, stored.as_ref());
            if !decision.exists {
                stats.new_files += 1;
            } else if decision.needs_update || full {
                stats.updated_files += 1;
            } else {
                stats.unchanged_files += 1;
            }
        }
        stats.elapsed_secs = started.elapsed().as_secs_f64();
        print_summary(config, &stats, true);
        pool.close().await;
        return Ok(stats);
    }

    let detector = build_detector(config)?;

    let cancelled = Arc::new(AtomicBool::new(false));
    {
        let flag = cancelled.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                flag.store(true, Ordering::SeqCst);
            }
        });
    }

    for (i, file) in files.iter().enumerate() {
        if cancelled.load(Ordering::SeqCst) {
            warn!(
                processed = i,
                remaining = files.len() - i,
                "sync interrupted, stopping between files"
            );
            break;
        }
        if (i + 1) % 5 == 0 {
            info!(n = i + 1, total = files.len(), file = %file.name, "processing");
        }

        let stored = match store::stored_state_by_path(&pool, &file.path).await {
            Ok(state) => state,
            Err(err) => {
                error!(file = %file.name, error = %err, "stored-state lookup failed");
                stats.failed_files += 1;
                stats.errors.push(format!("{}: {}", file.name, err));
                continue;
            }
        };

        let mut decision = ChangeDecision::evaluate(file, stored.as_ref());
        if full {
            decision.needs_update = true;
        }

        if decision.exists && !decision.needs_update {
            debug!(file = %file.name, "unchanged, skipping");
            stats.unchanged_files += 1;
            continue;
        }

        match process_file(&pool, config, detector.as_deref(), file, &decision).await {
            Ok(counts) => {
                if decision.exists {
                    stats.updated_files += 1;
                    info!(file = %file.name, chunks = counts.chunks, "updated");
                } else {
                    stats.new_files += 1;
                    info!(file = %file.name, chunks = counts.chunks, "ingested");
                }
                stats.total_chunks += counts.chunks;
                stats.chapters_detected += counts.chapters;
            }
            Err(err) => {
                error!(file = %file.name, error = %err, "processing failed");
                stats.failed_files += 1;
                stats.errors.push(format!("{}: {}", file.name, err));
            }
        }
    }

    stats.elapsed_secs = started.elapsed().as_secs_f64();
    print_summary(config, &stats, false);

    pool.close().await;
    Ok(stats)
}

fn build_detector(config: &Config) -> Result<Option<Box<dyn ChapterDetector>>> {
    if config.chunking.strategy != ChunkStrategy::Chapter {
        return Ok(None);
    }
    let detector: Box<dyn ChapterDetector> = match config.detection.detector {
        DetectorKind::Ai => Box::new(AiDetector::new(config.detection.ai.clone())?),
        DetectorKind::Rules => Box::new(RuleBasedDetector),
    };
    Ok(Some(detector))
}

async fn process_file(
    pool: &SqlitePool,
    config: &Config,
    detector: Option<&dyn ChapterDetector>,
    file: &FileRecord,
    decision: &ChangeDecision,
) -> Result<ProcessedCounts> {
    let text = match extract::extract_text(Path::new(&file.path), &file.file_type) {
        Ok(text) => text,
        Err(err) => {
            log_quietly(
                pool,
                decision.document_id.as_deref(),
                "text_extraction",
                "error",
                &format!("could not extract text from {}: {}", file.name, err),
            )
            .await;
            anyhow::bail!("text extraction failed: {}", err);
        }
    };

    if text.trim().is_empty() {
        log_quietly(
            pool,
            decision.document_id.as_deref(),
            "text_extraction",
            "error",
            &format!("no text extracted from {}", file.name),
        )
        .await;
        anyhow::bail!("no text extracted");
    }

    let content_length = text.chars().count();

    let (chapters, chunks): (Vec<ChapterDivision>, Vec<ChunkRecord>) =
        match config.chunking.strategy {
            ChunkStrategy::Sliding => {
                let chunker =
                    SlidingWindowChunker::new(config.chunking.chunk_size, config.chunking.overlap);
                (Vec::new(), chunker.create_chunks(&text))
            }
            ChunkStrategy::Chapter => {
                let divisions = match detector {
                    Some(detector) => detector.detect(&text, &file.name).await,
                    None => Vec::new(),
                };
                let chunker =
                    ChapterChunker::new(config.chunking.chunk_size, config.chunking.overlap);
                let chunks = chunker.create_chapter_chunks(&text, &divisions);
                (divisions, chunks)
            }
        };

    let doc_id = store::persist_document(
        pool,
        file,
        decision.document_id.as_deref(),
        content_length,
        &chapters,
        &chunks,
    )
    .await?;

    if chunks.is_empty() {
        log_quietly(
            pool,
            Some(doc_id.as_str()),
            "chunking",
            "warning",
            &format!("no chunks created for {}", file.name),
        )
        .await;
        warn!(file = %file.name, "no chunks created");
    } else {
        let operation = if decision.exists {
            "chunking_update"
        } else {
            "chunking_insert"
        };
        log_quietly(
            pool,
            Some(doc_id.as_str()),
            operation,
            "success",
            &format!("created {} chunks for {}", chunks.len(), file.name),
        )
        .await;
    }

    Ok(ProcessedCounts {
        chunks: chunks.len() as u64,
        chapters: chapters.len() as u64,
    })
}

/// Processing-log rows are best-effort; a failed append must not fail the
/// file it describes.
async fn log_quietly(
    pool: &SqlitePool,
    document_id: Option<&str>,
    operation: &str,
    status: &str,
    message: &str,
) {
    if let Err(err) = store::append_log(pool, document_id, operation, status, message).await {
        warn!(error = %err, "failed to append processing log");
    }
}

fn print_summary(config: &Config, stats: &RunStats, dry_run: bool) {
    if dry_run {
        println!("sync {} (dry-run)", config.scanner.root.display());
        println!("  files found: {}", stats.total_files);
        println!(
            "  would ingest: {} new, {} updated",
            stats.new_files, stats.updated_files
        );
        println!("  unchanged: {}", stats.unchanged_files);
        return;
    }

    println!("sync {}", config.scanner.root.display());
    println!("  files found: {}", stats.total_files);
    println!("  new: {}", stats.new_files);
    println!("  updated: {}", stats.updated_files);
    println!("  unchanged: {}", stats.unchanged_files);
    println!("  failed: {}", stats.failed_files);
    if config.chunking.strategy == ChunkStrategy::Chapter {
        println!("  chapters detected: {}", stats.chapters_detected);
    }
    println!("  chunks created: {}", stats.total_chunks);
    if !stats.files_by_type.is_empty() {
        let breakdown: Vec<String> = stats
            .files_by_type
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(ext, count)| format!(".{}: {}", ext, count))
            .collect();
        if !breakdown.is_empty() {
            println!("  by type: {}", breakdown.join(", "));
        }
    }
    println!("  elapsed: {:.2}s", stats.elapsed_secs);
    println!("ok");
}
