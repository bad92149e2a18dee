//! Chapter/section structure detection.
//!
//! Two interchangeable strategies behind [`ChapterDetector`]: an AI-assisted
//! extractor that asks a chat-completions endpoint for JSON candidates and
//! re-locates them in the real text, and a deterministic rule-based scanner.
//! Detection degrades, it never fails: any AI problem demotes that document
//! to the rule scan, and an empty result means "no structure detected".

pub mod ai;
pub mod rules;

use async_trait::async_trait;

use crate::models::ChapterDivision;

/// Candidates closer together than this are the same division; only the
/// first survives.
pub const DEDUP_RADIUS_CHARS: usize = 50;

/// Characters of division text kept as the stored preview.
pub const PREVIEW_CHARS: usize = 120;

#[async_trait]
pub trait ChapterDetector: Send + Sync {
    /// Ordered-by-offset structural divisions for `text`. `label` is used
    /// only for logging.
    async fn detect(&self, text: &str, label: &str) -> Vec<ChapterDivision>;
}

/// Sort by offset and drop candidates within [`DEDUP_RADIUS_CHARS`] of an
/// earlier kept one.
pub fn dedup_and_sort(mut divisions: Vec<ChapterDivision>) -> Vec<ChapterDivision> {
    divisions.sort_by_key(|d| d.start_offset);
    let mut kept: Vec<ChapterDivision> = Vec::with_capacity(divisions.len());
    for division in divisions {
        let duplicate = kept
            .iter()
            .any(|k| division.start_offset.abs_diff(k.start_offset) < DEDUP_RADIUS_CHARS);
        if !duplicate {
            kept.push(division);
        }
    }
    kept
}

/// Single-line preview of the text starting at a character offset.
pub(crate) fn preview_at(chars: &[char], start: usize) -> String {
    chars
        .iter()
        .skip(start)
        .take(PREVIEW_CHARS)
        .collect::<String>()
        .replace('\n', " ")
        .trim()
        .to_string()
}
