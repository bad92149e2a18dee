//! Core data models used throughout Docmill.
//!
//! These types represent the scanned files, structural divisions, chunks,
//! and run statistics that flow through the ingestion pipeline.

use std::collections::BTreeMap;

/// One file found by the scanner, fingerprinted and ready for a change check.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub name: String,
    /// Absolute path; the identity key in the documents table.
    pub path: String,
    pub relative_path: String,
    pub size: u64,
    /// Lowercase extension tag (`pdf`, `docx`, `txt`).
    pub file_type: String,
    /// Modification time as fractional Unix seconds.
    pub modified_at: f64,
    pub fingerprint: String,
    /// True when the fingerprint is the path+size+mtime fallback digest.
    pub degraded_fingerprint: bool,
}

/// Persisted state of a previously processed document, read once per file
/// per run.
#[derive(Debug, Clone)]
pub struct StoredState {
    pub document_id: String,
    pub fingerprint: String,
    pub modified_at: f64,
    pub content_length: i64,
}

/// Mtime slack that absorbs filesystem clock-resolution noise. The
/// fingerprint comparison is authoritative; the timestamp check is only a
/// cheap pre-filter.
pub const MTIME_TOLERANCE_SECS: f64 = 1.0;

/// Outcome of comparing a [`FileRecord`] against its stored state.
#[derive(Debug, Clone, Default)]
pub struct ChangeDecision {
    pub exists: bool,
    pub needs_update: bool,
    pub document_id: Option<String>,
}

impl ChangeDecision {
    pub fn evaluate(file: &FileRecord, stored: Option<&StoredState>) -> Self {
        match stored {
            None => Self {
                exists: false,
                needs_update: true,
                document_id: None,
            },
            Some(state) => {
                let changed = state.fingerprint != file.fingerprint
                    || (state.modified_at - file.modified_at).abs() > MTIME_TOLERANCE_SECS;
                Self {
                    exists: true,
                    needs_update: changed,
                    document_id: Some(state.document_id.clone()),
                }
            }
        }
    }
}

/// Kind of structural division detected in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DivisionKind {
    Capitulo,
    Secao,
    Subsecao,
    Artigo,
    Dispositivo,
    Fundamentacao,
    Titulo,
    Documento,
}

impl DivisionKind {
    /// Tag stored in chapter and chunk rows.
    pub fn as_str(self) -> &'static str {
        match self {
            DivisionKind::Capitulo => "CAPITULO",
            DivisionKind::Secao => "SECAO",
            DivisionKind::Subsecao => "SUBSECAO",
            DivisionKind::Artigo => "ARTIGO",
            DivisionKind::Dispositivo => "DISPOSITIVO",
            DivisionKind::Fundamentacao => "FUNDAMENTACAO",
            DivisionKind::Titulo => "TITULO",
            DivisionKind::Documento => "DOCUMENTO",
        }
    }

    /// Parse a tag, tolerating accents and case (model replies vary).
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_uppercase().as_str() {
            "CAPITULO" | "CAPÍTULO" => Some(DivisionKind::Capitulo),
            "SECAO" | "SEÇÃO" => Some(DivisionKind::Secao),
            "SUBSECAO" | "SUBSEÇÃO" => Some(DivisionKind::Subsecao),
            "ARTIGO" => Some(DivisionKind::Artigo),
            "DISPOSITIVO" => Some(DivisionKind::Dispositivo),
            "FUNDAMENTACAO" | "FUNDAMENTAÇÃO" => Some(DivisionKind::Fundamentacao),
            "TITULO" | "TÍTULO" => Some(DivisionKind::Titulo),
            "DOCUMENTO" => Some(DivisionKind::Documento),
            _ => None,
        }
    }
}

/// One structural unit of a document. Offsets are character indices into
/// the extracted text.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterDivision {
    pub title: String,
    pub kind: DivisionKind,
    /// Hierarchy depth, 1 = top level.
    pub level: u32,
    pub start_offset: usize,
    pub preview: String,
}

/// Chapter context carried by chunks produced by the hierarchy-aware
/// strategy. Absolute offsets index into the whole document text.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterContext {
    pub title: String,
    pub kind: DivisionKind,
    pub level: u32,
    pub absolute_start: i64,
    pub absolute_end: i64,
    /// True when the chunk spans its entire chapter.
    pub is_chapter_complete: bool,
}

/// A contiguous span of document text. `start_position`/`end_position` are
/// chapter-relative when `chapter` is set, document-relative otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    pub chunk_index: i64,
    pub content: String,
    pub chunk_size: i64,
    pub start_position: i64,
    pub end_position: i64,
    /// Characters shared with the previous chunk; 0 for the first chunk of
    /// each span.
    pub overlap_size: i64,
    pub chapter: Option<ChapterContext>,
}

/// Accumulated totals for one sync run, returned by value to the caller.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub total_files: u64,
    pub new_files: u64,
    pub updated_files: u64,
    pub unchanged_files: u64,
    pub failed_files: u64,
    pub chapters_detected: u64,
    pub total_chunks: u64,
    pub folders_scanned: u64,
    pub files_by_type: BTreeMap<String, u64>,
    pub errors: Vec<String>,
    pub elapsed_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fingerprint: &str, modified_at: f64) -> FileRecord {
        FileRecord {
            name: "a.txt".to_string(),
            path: "/docs/a.txt".to_string(),
            relative_path: "a.txt".to_string(),
            size: 10,
            file_type: "txt".to_string(),
            modified_at,
            fingerprint: fingerprint.to_string(),
            degraded_fingerprint: false,
        }
    }

    fn stored(fingerprint: &str, modified_at: f64) -> StoredState {
        StoredState {
            document_id: "doc-1".to_string(),
            fingerprint: fingerprint.to_string(),
            modified_at,
            content_length: 100,
        }
    }

    #[test]
    fn missing_row_needs_update() {
        let decision = ChangeDecision::evaluate(&record("abc", 100.0), None);
        assert!(!decision.exists);
        assert!(decision.needs_update);
        assert!(decision.document_id.is_none());
    }

    #[test]
    fn matching_fingerprint_within_tolerance_is_unchanged() {
        let decision = ChangeDecision::evaluate(&record("abc", 100.6), Some(&stored("abc", 100.0)));
        assert!(decision.exists);
        assert!(!decision.needs_update);
        assert_eq!(decision.document_id.as_deref(), Some("doc-1"));
    }

    #[test]
    fn fingerprint_mismatch_needs_update_even_with_equal_mtime() {
        let decision = ChangeDecision::evaluate(&record("abc", 100.0), Some(&stored("xyz", 100.0)));
        assert!(decision.needs_update);
    }

    #[test]
    fn mtime_drift_beyond_tolerance_needs_update() {
        let decision = ChangeDecision::evaluate(&record("abc", 102.5), Some(&stored("abc", 100.0)));
        assert!(decision.needs_update);
    }

    #[test]
    fn division_kind_tags_round_trip() {
        for kind in [
            DivisionKind::Capitulo,
            DivisionKind::Secao,
            DivisionKind::Subsecao,
            DivisionKind::Artigo,
            DivisionKind::Dispositivo,
            DivisionKind::Fundamentacao,
            DivisionKind::Titulo,
            DivisionKind::Documento,
        ] {
            assert_eq!(DivisionKind::from_tag(kind.as_str()), Some(kind));
        }
        assert_eq!(
            DivisionKind::from_tag("capítulo"),
            Some(DivisionKind::Capitulo)
        );
        assert_eq!(DivisionKind::from_tag("bogus"), None);
    }
}
