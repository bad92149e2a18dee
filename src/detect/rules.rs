//! Deterministic, pattern-based chapter detection.
//!
//! Line-oriented scan against an ordered table of heading patterns drawn
//! from Brazilian legal drafting conventions: chapter/title/section
//! headings, article markers, boilerplate provision headings, the
//! report/reasoning/holding markers of judicial decisions, and a generic
//! catch-all for long all-uppercase lines. The first pattern in table order
//! wins for a line; offsets are character offsets into the full text.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::{preview_at, ChapterDetector, DEDUP_RADIUS_CHARS};
use crate::models::{ChapterDivision, DivisionKind};

struct HeadingPattern {
    regex: Regex,
    kind: DivisionKind,
    level: u32,
}

static HEADING_PATTERNS: Lazy<Vec<HeadingPattern>> = Lazy::new(|| {
    let table: &[(&str, DivisionKind, u32)] = &[
        (
            r"(?i)^\s*(CAP[IÍ]TULO\s+[IVXLCDM\d].*)$",
            DivisionKind::Capitulo,
            1,
        ),
        (
            r"(?i)^\s*(T[IÍ]TULO\s+[IVXLCDM\d].*)$",
            DivisionKind::Titulo,
            1,
        ),
        (
            r"(?i)^\s*(SUBSE[ÇC][ÃA]O\s+\S.*)$",
            DivisionKind::Subsecao,
            3,
        ),
        (r"(?i)^\s*(SE[ÇC][ÃA]O\s+\S.*)$", DivisionKind::Secao, 2),
        (r"(?i)^\s*(Art(?:igo)?\.?\s*\d+.*)$", DivisionKind::Artigo, 4),
        (
            r"(?i)^\s*(DISPOSI[ÇC][ÕO]ES\s+(?:GERAIS|FINAIS|TRANSIT[ÓO]RIAS).*)$",
            DivisionKind::Secao,
            2,
        ),
        (
            r"(?i)^\s*((?:DA\s+)?FUNDAMENTA[ÇC][ÃA]O|RELAT[ÓO]RIO|DO\s+M[ÉE]RITO)\s*$",
            DivisionKind::Fundamentacao,
            1,
        ),
        (
            r"(?i)^\s*(DISPOSITIVO|DECIS[ÃA]O|CONCLUS[ÃA]O)\s*$",
            DivisionKind::Dispositivo,
            1,
        ),
        // Long all-uppercase lines read as headings in this corpus.
        (
            r"^\s*([A-ZÁÉÍÓÚÂÊÎÔÛÃÕÇÀ][A-ZÁÉÍÓÚÂÊÎÔÛÃÕÇÀ0-9\s.,;:()ºª°–—-]{14,})\s*$",
            DivisionKind::Titulo,
            1,
        ),
    ];

    table
        .iter()
        .map(|(pattern, kind, level)| HeadingPattern {
            regex: Regex::new(pattern).unwrap(),
            kind: *kind,
            level: *level,
        })
        .collect()
});

pub struct RuleBasedDetector;

impl RuleBasedDetector {
    /// Synchronous scan; also used directly as the AI strategy's fallback.
    pub fn scan(&self, text: &str) -> Vec<ChapterDivision> {
        if text.is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        let mut kept: Vec<(usize, ChapterDivision)> = Vec::new();
        let mut offset = 0usize;

        for line in text.split('\n') {
            let clean = line.trim_end_matches('\r');
            for (table_row, pattern) in HEADING_PATTERNS.iter().enumerate() {
                if let Some(caps) = pattern.regex.captures(clean) {
                    // A nearby match from another table row is the same
                    // heading caught twice by overlapping patterns; a
                    // repeat of the same row is a genuine new division.
                    let duplicate = kept.iter().any(|(row, division)| {
                        *row != table_row
                            && offset.abs_diff(division.start_offset) < DEDUP_RADIUS_CHARS
                    });
                    if !duplicate {
                        let title = caps
                            .get(1)
                            .map(|m| m.as_str())
                            .unwrap_or(clean)
                            .trim()
                            .to_string();
                        kept.push((
                            table_row,
                            ChapterDivision {
                                title,
                                kind: pattern.kind,
                                level: pattern.level,
                                start_offset: offset,
                                preview: preview_at(&chars, offset),
                            },
                        ));
                    }
                    break; // first pattern in table order wins for this line
                }
            }
            offset += line.chars().count() + 1;
        }

        // Scan order equals offset order already.
        kept.into_iter().map(|(_, division)| division).collect()
    }
}

#[async_trait]
impl ChapterDetector for RuleBasedDetector {
    async fn detect(&self, text: &str, label: &str) -> Vec<ChapterDivision> {
        let divisions = self.scan(text);
        debug!(
            document = label,
            divisions = divisions.len(),
            "rule-based structure scan"
        );
        divisions
    }
}
