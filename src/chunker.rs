//! Sliding-window and chapter-aware chunking strategies.
//!
//! Both strategies measure in characters, not bytes: text is widened to a
//! `Vec<char>` so accented Portuguese never splits a code point and every
//! stored offset is a character index. The boundary thresholds are the
//! original pipeline's constants; regenerated chunks must line up with
//! previously stored rows, so they are named here rather than re-derived.

use crate::models::{ChapterContext, ChapterDivision, ChunkRecord, DivisionKind};

/// A word-boundary snap may not shorten a sliding-window chunk below this
/// fraction of the window.
pub const WORD_SNAP_MIN_FRACTION: f64 = 0.8;

/// Chapter chunks accept earlier break candidates, down to this fraction.
/// Legal prose runs long sentences, so the window is laxer than the
/// sliding-window snap.
pub const BREAK_SNAP_MIN_FRACTION: f64 = 0.7;

/// A remaining tail shorter than this fraction of the window is absorbed
/// into the previous chunk instead of becoming its own undersized chunk.
pub const TAIL_ABSORB_FRACTION: f64 = 0.3;

/// Break characters considered by the chapter chunker, best first.
const BREAK_CANDIDATES: [char; 5] = ['.', ';', ':', '\n', ' '];

/// Fixed-window chunker walking the text in a single forward pass.
#[derive(Debug, Clone)]
pub struct SlidingWindowChunker {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl SlidingWindowChunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
        }
    }

    /// Split `text` into overlapping chunks with document-relative offsets.
    /// Empty input yields an empty list.
    pub fn create_chunks(&self, text: &str) -> Vec<ChunkRecord> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }

        let min_snap = (self.chunk_size as f64 * WORD_SNAP_MIN_FRACTION) as usize;
        let tail_min = (self.chunk_size as f64 * TAIL_ABSORB_FRACTION) as usize;

        let mut chunks = Vec::new();
        let mut start = 0usize;
        let mut index = 0i64;

        while start < chars.len() {
            let raw_end = (start + self.chunk_size).min(chars.len());
            let mut end = raw_end;

            if raw_end < chars.len() {
                if chars.len() - raw_end < tail_min {
                    // Absorb the short tail into this chunk.
                    end = chars.len();
                } else if let Some(rel) = chars[start..raw_end]
                    .iter()
                    .rposition(|c| c.is_whitespace())
                {
                    // Snap to the last whitespace unless that shortens the
                    // chunk below the allowed fraction.
                    if rel >= min_snap && rel > 0 {
                        end = start + rel;
                    }
                }
            }

            let content: String = chars[start..end].iter().collect();
            let trimmed = content.trim().to_string();
            chunks.push(ChunkRecord {
                chunk_index: index,
                chunk_size: trimmed.chars().count() as i64,
                content: trimmed,
                start_position: start as i64,
                end_position: end as i64,
                overlap_size: if index > 0 { self.overlap as i64 } else { 0 },
                chapter: None,
            });
            index += 1;

            if end >= chars.len() {
                break;
            }
            // The overlap must never stall the walk.
            start = end.saturating_sub(self.overlap).max(start + 1);
        }

        chunks
    }
}

/// Hierarchy-aware chunker: each detected chapter is segmented on its own,
/// so overlap and window logic never cross a chapter boundary.
#[derive(Debug, Clone)]
pub struct ChapterChunker {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl ChapterChunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
        }
    }

    /// Segment `text` chapter by chapter. With no detected structure the
    /// whole document becomes one synthetic DOCUMENTO chapter.
    pub fn create_chapter_chunks(
        &self,
        text: &str,
        chapters: &[ChapterDivision],
    ) -> Vec<ChunkRecord> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }

        let synthetic;
        let chapters: &[ChapterDivision] = if chapters.is_empty() {
            synthetic = [whole_document_division(&chars)];
            &synthetic
        } else {
            chapters
        };

        let mut chunks = Vec::new();
        let mut index = 0i64;

        for (i, chapter) in chapters.iter().enumerate() {
            let span_start = chapter.start_offset.min(chars.len());
            let span_end = chapters
                .get(i + 1)
                .map(|next| next.start_offset.min(chars.len()))
                .unwrap_or(chars.len());
            if span_end <= span_start {
                continue;
            }

            // Trim surrounding whitespace off the span while keeping
            // absolute offsets anchored to the full text.
            let span = &chars[span_start..span_end];
            let lead = match span.iter().position(|c| !c.is_whitespace()) {
                Some(pos) => pos,
                None => continue, // empty after trimming
            };
            let tail = span.iter().rposition(|c| !c.is_whitespace()).unwrap_or(0);
            let base = span_start + lead;

            self.chunk_span(&span[lead..=tail], base, chapter, &mut chunks, &mut index);
        }

        chunks
    }

    fn chunk_span(
        &self,
        span: &[char],
        base: usize,
        chapter: &ChapterDivision,
        out: &mut Vec<ChunkRecord>,
        index: &mut i64,
    ) {
        let len = span.len();

        if len <= self.chunk_size {
            let content: String = span.iter().collect();
            out.push(ChunkRecord {
                chunk_index: *index,
                chunk_size: len as i64,
                content,
                start_position: 0,
                end_position: len as i64,
                overlap_size: 0,
                chapter: Some(ChapterContext {
                    title: chapter.title.clone(),
                    kind: chapter.kind,
                    level: chapter.level,
                    absolute_start: base as i64,
                    absolute_end: (base + len) as i64,
                    is_chapter_complete: true,
                }),
            });
            *index += 1;
            return;
        }

        let tail_min = (self.chunk_size as f64 * TAIL_ABSORB_FRACTION) as usize;
        let mut start = 0usize;
        let mut first = true;

        while start < len {
            let raw_end = (start + self.chunk_size).min(len);
            let mut end = raw_end;

            if raw_end < len {
                if len - raw_end < tail_min {
                    end = len;
                } else {
                    // None means no candidate reached the threshold; keep
                    // the raw clamped boundary.
                    end = start + self.snap_break(&span[start..raw_end]).unwrap_or(raw_end - start);
                }
            }

            let content: String = span[start..end].iter().collect();
            let trimmed = content.trim().to_string();
            out.push(ChunkRecord {
                chunk_index: *index,
                chunk_size: trimmed.chars().count() as i64,
                content: trimmed,
                start_position: start as i64,
                end_position: end as i64,
                overlap_size: if first { 0 } else { self.overlap as i64 },
                chapter: Some(ChapterContext {
                    title: chapter.title.clone(),
                    kind: chapter.kind,
                    level: chapter.level,
                    absolute_start: (base + start) as i64,
                    absolute_end: (base + end) as i64,
                    is_chapter_complete: false,
                }),
            });
            *index += 1;
            first = false;

            if end >= len {
                break;
            }
            start = end.saturating_sub(self.overlap).max(start + 1);
        }
    }

    /// Rightmost break candidate at or past the threshold fraction, as a
    /// relative boundary just after the break character.
    fn snap_break(&self, window: &[char]) -> Option<usize> {
        let min_snap = (self.chunk_size as f64 * BREAK_SNAP_MIN_FRACTION) as usize;
        BREAK_CANDIDATES
            .iter()
            .filter_map(|&candidate| window.iter().rposition(|&c| c == candidate))
            .filter(|&pos| pos >= min_snap && pos > 0)
            .max()
            .map(|pos| pos + 1)
    }
}

fn whole_document_division(chars: &[char]) -> ChapterDivision {
    let preview: String = chars.iter().take(120).collect();
    ChapterDivision {
        title: "Documento".to_string(),
        kind: DivisionKind::Documento,
        level: 1,
        start_offset: 0,
        preview: preview.replace('\n', " ").trim().to_string(),
    }
}
