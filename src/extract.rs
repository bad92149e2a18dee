//! Per-format plain-text extraction.
//!
//! Dispatches on the scanner's extension tag: PDF through `pdf-extract`,
//! DOCX through the OOXML ZIP container, plain text with an encoding
//! fallback. Extraction never panics; failures surface as [`ExtractError`]
//! and the pipeline records the file as failed.

use std::io::Read;
use std::path::Path;

/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug)]
pub enum ExtractError {
    Unsupported(String),
    Io(std::io::Error),
    Pdf(String),
    Ooxml(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Unsupported(tag) => write!(f, "unsupported file type: {}", tag),
            ExtractError::Io(e) => write!(f, "read failed: {}", e),
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Ooxml(e) => write!(f, "OOXML extraction failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Extracts plain text from the file at `path` based on its extension tag.
pub fn extract_text(path: &Path, file_type: &str) -> Result<String, ExtractError> {
    match file_type {
        "pdf" => extract_pdf(path),
        "docx" | "doc" => extract_docx(path),
        "txt" => extract_txt(path),
        other => Err(ExtractError::Unsupported(other.to_string())),
    }
}

fn extract_pdf(path: &Path) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path).map_err(ExtractError::Io)?;
    pdf_extract::extract_text_from_mem(&bytes)
        .map(|text| text.trim().to_string())
        .map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_docx(path: &Path) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path).map_err(ExtractError::Io)?;
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes.as_slice()))
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;

    let doc_xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;
    let text = extract_w_t_elements(&doc_xml)?;
    Ok(text.trim().to_string())
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

/// Pull the `w:t` text runs out of `word/document.xml`, breaking lines at
/// paragraph ends so downstream structure detection sees headings on their
/// own lines.
fn extract_w_t_elements(xml: &[u8]) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_text_run = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_run = true;
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if in_text_run => {
                out.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => {
                let name = e.local_name();
                if name.as_ref() == b"t" {
                    in_text_run = false;
                } else if name.as_ref() == b"p" && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

/// Strict UTF-8 first (BOM stripped), then Latin-1 as the fallback for the
/// legacy encodings office corpora carry.
fn extract_txt(path: &Path) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path).map_err(ExtractError::Io)?;
    let slice = bytes
        .strip_prefix(&[0xEF, 0xBB, 0xBF][..])
        .unwrap_or(&bytes);

    match std::str::from_utf8(slice) {
        Ok(text) => Ok(text.to_string()),
        Err(_) => Ok(slice.iter().map(|&b| b as char).collect()),
    }
}
