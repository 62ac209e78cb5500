//! Input format detection
//!
//! Content sniffing first, then the filename extension, then the declared MIME
//! type. Anything not recognised is rejected with `UnsupportedFormat`.

use crate::error::{Error, Result};
use crate::types::DocumentFormat;

const PDF_MAGIC: &[u8] = b"%PDF-";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const SNIFF_WINDOW: usize = 4096;

impl DocumentFormat {
    /// Detect the format of an upload
    pub fn detect(filename: &str, data: &[u8], declared_mime: Option<&str>) -> Result<Self> {
        if let Some(format) = Self::sniff(data) {
            return Ok(format);
        }

        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();

        if let Some(format) = Self::from_extension(&extension) {
            return Ok(format);
        }

        if let Some(format) = declared_mime.and_then(Self::from_mime) {
            return Ok(format);
        }

        if let Some(format) = mime_guess::from_path(filename)
            .first_raw()
            .and_then(Self::from_mime)
        {
            return Ok(format);
        }

        let label = if extension.is_empty() {
            declared_mime.unwrap_or("unknown").to_string()
        } else {
            format!(".{}", extension)
        };
        Err(Error::UnsupportedFormat(format!("{} ({})", label, filename)))
    }

    /// Map an extension to a format
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "html" | "htm" | "xhtml" => Some(Self::Html),
            "tex" | "latex" => Some(Self::Latex),
            "md" | "markdown" => Some(Self::Markdown),
            "txt" | "text" => Some(Self::Text),
            _ => None,
        }
    }

    /// Map a MIME type to a format
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_lowercase();
        match essence.as_str() {
            "application/pdf" => Some(Self::Pdf),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => Some(Self::Docx),
            "text/html" | "application/xhtml+xml" => Some(Self::Html),
            "application/x-tex" | "application/x-latex" | "text/x-tex" => Some(Self::Latex),
            "text/markdown" | "text/x-markdown" => Some(Self::Markdown),
            "text/plain" => Some(Self::Text),
            _ => None,
        }
    }

    /// Recognise a format from leading bytes
    fn sniff(data: &[u8]) -> Option<Self> {
        let head = &data[..data.len().min(SNIFF_WINDOW)];

        if head.starts_with(PDF_MAGIC) {
            return Some(Self::Pdf);
        }
        if head.starts_with(ZIP_MAGIC) {
            // Only a Word package counts; other zips fall through to the extension.
            return contains(data, b"word/document.xml").then_some(Self::Docx);
        }

        let text = std::str::from_utf8(head).ok().or_else(|| {
            // A multi-byte char may straddle the window edge.
            (1..4).find_map(|cut| std::str::from_utf8(&head[..head.len().saturating_sub(cut)]).ok())
        })?;
        let lower = text.trim_start_matches('\u{feff}').trim_start().to_lowercase();

        if lower.starts_with("<!doctype html") || lower.starts_with("<html") || lower.contains("<html") {
            return Some(Self::Html);
        }
        if lower.contains("\\documentclass") || lower.contains("\\begin{document}") {
            return Some(Self::Latex);
        }
        None
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
