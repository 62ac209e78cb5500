//! Multi-format document parser
//!
//! Each registered [`DocumentFormat`] reduces raw bytes to a [`RawText`]
//! block stream; [`structure::extract`] then produces the normalized tree.
//! PDF pages without a text layer are routed through OCR.

use lazy_static::lazy_static;
use regex::Regex;
use sha2::{Digest, Sha256};

use super::ocr::OcrEngine;
use super::structure::{self, Block, MetadataHints, RawText, Structure};
use crate::error::{Error, Result};
use crate::types::{Document, DocumentFormat, ProcessingIssue};

lazy_static! {
    static ref LATEX_REFERENCE: Regex = Regex::new(r"\\(?:cite[a-z]*|ref|eqref|label|footnote|url)\*?(?:\[[^\]]*\])?\{[^}]*\}").expect("invalid LATEX_REFERENCE pattern");
    static ref LATEX_STYLE: Regex = Regex::new(r"\\(?:textbf|textit|emph|underline|texttt|textrm|textsc|mathrm|text)\{([^}]*)\}").expect("invalid LATEX_STYLE pattern");
    static ref LATEX_ENVIRONMENT: Regex = Regex::new(r"\\(?:begin|end)\{[^}]*\}(?:\[[^\]]*\])?").expect("invalid LATEX_ENVIRONMENT pattern");
    static ref LATEX_COMMAND: Regex = Regex::new(r"\\[a-zA-Z]+\*?(?:\[[^\]]*\])?").expect("invalid LATEX_COMMAND pattern");
    static ref LATEX_COMMENT: Regex = Regex::new(r"(?m)(^|[^\\])%.*$").expect("invalid LATEX_COMMENT pattern");
    static ref LATEX_THANKS: Regex = Regex::new(r"\\thanks\{[^}]*\}").expect("invalid LATEX_THANKS pattern");
    static ref LATEX_HEADING: Regex = Regex::new(r"^\\(section|subsection|subsubsection|paragraph)\*?\{(.*)\}\s*$").expect("invalid LATEX_HEADING pattern");
    static ref MARKDOWN_EMPHASIS: Regex = Regex::new(r"\*\*|__|`").expect("invalid MARKDOWN_EMPHASIS pattern");
}

/// Result of parsing one upload
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub format: DocumentFormat,
    pub structure: Structure,
    pub page_count: Option<u32>,
    /// Non-fatal problems (unreadable pages, skipped content)
    pub issues: Vec<ProcessingIssue>,
}

impl ParsedDocument {
    /// Copy parse results onto a document record
    pub fn apply_to(self, doc: &mut Document) {
        if let Some(title) = self.structure.title {
            doc.title = title;
        }
        doc.format = self.format;
        doc.sections = self.structure.sections;
        doc.metadata = self.structure.metadata;
        doc.references = self.structure.references;
        doc.word_count = self.structure.word_count;
        doc.page_count = self.page_count;
        doc.processing_errors = self.issues;
    }
}

/// Text of one PDF page
#[derive(Debug, Clone)]
pub struct PageText {
    /// 1-based page number
    pub number: u32,
    pub text: String,
}

/// Page texts plus document info of a PDF
#[derive(Debug, Clone, Default)]
pub struct PdfText {
    pub pages: Vec<PageText>,
    pub hints: MetadataHints,
}

/// Parser adapter: bytes in, normalized tree out
#[derive(Debug, Clone)]
pub struct DocumentParser {
    ocr: OcrEngine,
    min_chars_per_page: usize,
}

impl DocumentParser {
    /// Create a parser using the given OCR engine
    pub fn new(ocr: OcrEngine, min_chars_per_page: usize) -> Self {
        Self { ocr, min_chars_per_page }
    }

    /// Parse an upload. Unsupported formats and unreadable content fail;
    /// unreadable individual PDF pages are recorded as issues.
    pub async fn parse(&self, filename: &str, data: &[u8], declared_mime: Option<&str>) -> Result<ParsedDocument> {
        let format = DocumentFormat::detect(filename, data, declared_mime)?;
        tracing::info!("Parsing '{}' as {}", filename, format.display_name());

        let owned = data.to_vec();
        let name = filename.to_string();
        let raw = if format == DocumentFormat::Pdf {
            let pdf = tokio::task::spawn_blocking(move || extract_pdf(&name, &owned))
                .await
                .map_err(|e| Error::parse_failure(filename, format!("PDF extraction crashed: {}", e)))??;
            self.pdf_to_raw(filename, data, pdf).await
        } else {
            tokio::task::spawn_blocking(move || extract_raw(format, &name, &owned))
                .await
                .map_err(|e| Error::parse_failure(filename, format!("Extraction crashed: {}", e)))??
        };

        if !raw.has_text() {
            return Err(Error::parse_failure(filename, "No text could be extracted"));
        }

        let page_count = raw.page_count;
        let issues = raw.issues.clone();
        let structure = structure::extract(&raw);
        if structure.sections.is_empty() {
            return Err(Error::parse_failure(filename, "No sections could be built"));
        }

        tracing::info!(
            "Parsed '{}': {} sections, {} references, {} words{}",
            filename,
            structure.sections.len(),
            structure.references.len(),
            structure.word_count,
            if issues.is_empty() { String::new() } else { format!(", {} issue(s)", issues.len()) }
        );

        Ok(ParsedDocument {
            format,
            structure,
            page_count,
            issues,
        })
    }

    /// Assemble PDF pages into blocks, OCR-ing pages that have no usable text layer
    async fn pdf_to_raw(&self, filename: &str, data: &[u8], pdf: PdfText) -> RawText {
        let mut raw = RawText {
            page_count: Some(pdf.pages.len() as u32),
            hints: pdf.hints,
            ..Default::default()
        };

        let mut pages = pdf.pages;
        let scanned: Vec<u32> = pages
            .iter()
            .filter(|p| p.text.chars().filter(|c| !c.is_whitespace()).count() < self.min_chars_per_page)
            .map(|p| p.number)
            .collect();

        if !scanned.is_empty() {
            if self.ocr.is_available().await {
                tracing::info!("'{}': running OCR on {} page(s) without a text layer", filename, scanned.len());
                for (number, result) in self.ocr.recognize_pages(data, &scanned).await {
                    match result {
                        Ok(text) => {
                            if let Some(page) = pages.iter_mut().find(|p| p.number == number) {
                                page.text = text;
                            }
                        }
                        Err(e) => raw
                            .issues
                            .push(ProcessingIssue::page(number, format!("OCR failed: {}", e))),
                    }
                }
            } else {
                for number in &scanned {
                    let has_some_text = pages.iter().any(|p| p.number == *number && !p.text.trim().is_empty());
                    if !has_some_text {
                        raw.issues.push(ProcessingIssue::page(
                            *number,
                            "No text layer and OCR is unavailable",
                        ));
                    }
                }
            }
        }

        for page in pages {
            raw.blocks.push(Block::Page(page.number));
            raw.push_lines(&page.text);
        }
        raw
    }
}

/// SHA-256 of raw bytes, hex encoded
pub fn hash_content(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Extract a block stream from a non-PDF format
pub fn extract_raw(format: DocumentFormat, filename: &str, data: &[u8]) -> Result<RawText> {
    match format {
        DocumentFormat::Pdf => {
            let pdf = extract_pdf(filename, data)?;
            let mut raw = RawText {
                page_count: Some(pdf.pages.len() as u32),
                hints: pdf.hints,
                ..Default::default()
            };
            for page in pdf.pages {
                raw.blocks.push(Block::Page(page.number));
                raw.push_lines(&page.text);
            }
            Ok(raw)
        }
        DocumentFormat::Docx => parse_docx(filename, data),
        DocumentFormat::Html => parse_html(filename, data),
        DocumentFormat::Latex => Ok(parse_latex(&decode_text(data))),
        DocumentFormat::Markdown => Ok(parse_markdown(&decode_text(data))),
        DocumentFormat::Text => {
            let mut raw = RawText::default();
            raw.push_lines(&decode_text(data));
            Ok(raw)
        }
    }
}

fn decode_text(data: &[u8]) -> String {
    String::from_utf8_lossy(data)
        .trim_start_matches('\u{feff}')
        .replace("\r\n", "\n")
        .replace('\r', "\n")
}

// ---------------------------------------------------------------------------
// PDF
// ---------------------------------------------------------------------------

/// Per-page PDF text via lopdf, whole-document fallback via pdf-extract
pub fn extract_pdf(filename: &str, data: &[u8]) -> Result<PdfText> {
    let doc = match lopdf::Document::load_mem(data) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!("lopdf could not load '{}': {}, trying pdf-extract", filename, e);
            return extract_pdf_fallback(filename, data);
        }
    };

    let hints = pdf_info_hints(&doc);
    let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    if page_numbers.is_empty() {
        return Err(Error::parse_failure(filename, "PDF has no pages"));
    }

    let mut pages = Vec::with_capacity(page_numbers.len());
    let mut failures = 0usize;
    for number in page_numbers {
        let text = match doc.extract_text(&[number]) {
            Ok(text) => normalize_pdf_text(&text),
            Err(e) => {
                tracing::debug!("lopdf text extraction failed on page {}: {}", number, e);
                failures += 1;
                String::new()
            }
        };
        pages.push(PageText { number, text });
    }

    // Every page failing usually means fonts lopdf cannot decode; pdf-extract copes better.
    if failures == pages.len() {
        if let Ok(mut fallback) = extract_pdf_fallback(filename, data) {
            if fallback.pages.iter().any(|p| !p.text.trim().is_empty()) {
                fallback.hints = hints;
                return Ok(fallback);
            }
        }
    }

    Ok(PdfText { pages, hints })
}

fn extract_pdf_fallback(filename: &str, data: &[u8]) -> Result<PdfText> {
    let text = pdf_extract::extract_text_from_mem(data)
        .map_err(|e| Error::parse_failure(filename, format!("Not a readable PDF: {}", e)))?;
    let text = normalize_pdf_text(&text);

    // pdf-extract separates pages with form feeds
    let pages = text
        .split('\u{000C}')
        .enumerate()
        .map(|(i, t)| PageText {
            number: i as u32 + 1,
            text: t.to_string(),
        })
        .collect();

    Ok(PdfText {
        pages,
        hints: MetadataHints::default(),
    })
}

fn pdf_info_hints(doc: &lopdf::Document) -> MetadataHints {
    let mut hints = MetadataHints::default();

    let info = doc.trailer.get(b"Info").ok().and_then(|obj| match obj {
        lopdf::Object::Reference(id) => doc.get_dictionary(*id).ok(),
        lopdf::Object::Dictionary(dict) => Some(dict),
        _ => None,
    });
    let Some(info) = info else {
        return hints;
    };

    let field = |key: &[u8]| -> Option<String> {
        let bytes = info.get(key).ok()?.as_str().ok()?;
        let text = decode_pdf_string(bytes);
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    };

    hints.title = field(b"Title");
    if let Some(author) = field(b"Author") {
        hints.authors = author
            .split([';', ','])
            .flat_map(|a| a.split(" and "))
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(subject) = field(b"Subject") {
        hints.doi = structure::find_doi(&subject);
    }
    if let Some(keywords) = field(b"Keywords") {
        hints.keywords = keywords
            .split([',', ';'])
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();
    }
    hints.publish_date = field(b"CreationDate").and_then(|d| pdf_date(&d));
    hints
}

/// PDF text strings are UTF-16BE with a BOM, or PDFDocEncoding (Latin-1 compatible)
fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else if let Ok(s) = std::str::from_utf8(bytes) {
        s.to_string()
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

/// `D:20210312...` to `2021-03-12`
fn pdf_date(raw: &str) -> Option<String> {
    let digits: String = raw.trim_start_matches("D:").chars().take(8).collect();
    if digits.len() == 8 && digits.chars().all(|c| c.is_ascii_digit()) {
        Some(format!("{}-{}-{}", &digits[0..4], &digits[4..6], &digits[6..8]))
    } else if digits.len() >= 4 && digits[..4].chars().all(|c| c.is_ascii_digit()) {
        Some(digits[..4].to_string())
    } else {
        None
    }
}

/// Ligatures, odd spaces and NULs that PDF text layers commonly carry
fn normalize_pdf_text(text: &str) -> String {
    text.replace('\0', "")
        .replace('\u{00A0}', " ")
        .replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
        .replace(['\u{2010}', '\u{2011}'], "-")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
}

// ---------------------------------------------------------------------------
// DOCX
// ---------------------------------------------------------------------------

fn parse_docx(filename: &str, data: &[u8]) -> Result<RawText> {
    let docx = docx_rs::read_docx(data).map_err(|e| Error::parse_failure(filename, e.to_string()))?;
    let mut raw = RawText::default();

    for child in docx.document.children {
        match child {
            docx_rs::DocumentChild::Paragraph(p) => {
                let mut text = String::new();
                for child in &p.children {
                    if let docx_rs::ParagraphChild::Run(run) = child {
                        for child in &run.children {
                            match child {
                                docx_rs::RunChild::Text(t) => text.push_str(&t.text),
                                docx_rs::RunChild::Tab(_) => text.push(' '),
                                _ => {}
                            }
                        }
                    }
                }
                let text = text.trim().to_string();
                if text.is_empty() {
                    raw.blocks.push(Block::Blank);
                    continue;
                }

                let style = p.property.style.as_ref().map(|s| s.val.to_lowercase());
                match style.as_deref() {
                    Some("title") if raw.hints.title.is_none() => raw.hints.title = Some(text),
                    Some(s) if s.starts_with("heading") => {
                        let level = s
                            .trim_start_matches("heading")
                            .trim()
                            .parse::<u8>()
                            .unwrap_or(1)
                            .clamp(1, 6);
                        raw.blocks.push(Block::Heading { text, level });
                    }
                    // Unstyled paragraphs still go through heading heuristics.
                    _ => {
                        raw.blocks.push(Block::Line(text));
                        raw.blocks.push(Block::Blank);
                    }
                }
            }
            docx_rs::DocumentChild::Table(_) => {
                tracing::debug!("Skipping table in '{}'", filename);
            }
            _ => {}
        }
    }

    Ok(raw)
}

// ---------------------------------------------------------------------------
// HTML
// ---------------------------------------------------------------------------

fn selector(css: &str) -> Result<scraper::Selector> {
    scraper::Selector::parse(css).map_err(|e| Error::internal(format!("Invalid selector '{}': {}", css, e)))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_html(filename: &str, data: &[u8]) -> Result<RawText> {
    let html = decode_text(data);
    let document = scraper::Html::parse_document(&html);
    let mut raw = RawText::default();

    let title_sel = selector("title")?;
    raw.hints.title = document
        .select(&title_sel)
        .next()
        .map(|t| collapse_whitespace(&t.text().collect::<String>()))
        .filter(|t| !t.is_empty());

    let meta_sel = selector("meta[name]")?;
    for meta in document.select(&meta_sel) {
        let (Some(name), Some(content)) = (meta.value().attr("name"), meta.value().attr("content")) else {
            continue;
        };
        let content = content.trim().to_string();
        if content.is_empty() {
            continue;
        }
        match name.to_lowercase().as_str() {
            "citation_title" | "dc.title" => raw.hints.title = Some(content),
            "citation_author" | "dc.creator" => raw.hints.authors.push(content),
            "citation_doi" | "dc.identifier" => {
                raw.hints.doi = structure::find_doi(&content).or(raw.hints.doi.take());
            }
            "citation_publication_date" | "citation_date" | "dc.date" => raw.hints.publish_date = Some(content),
            "citation_journal_title" => raw.hints.journal = Some(content),
            "citation_abstract" | "dc.description" => raw.hints.abstract_text = Some(content),
            "citation_keywords" | "keywords" => {
                raw.hints.keywords = content
                    .split([',', ';'])
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            _ => {}
        }
    }

    let body_sel = selector("h1, h2, h3, h4, h5, h6, p, li, blockquote, pre, figcaption, td")?;
    let container_tags = ["p", "li", "blockquote", "pre", "figcaption", "td"];
    let mut found_any = false;

    for el in document.select(&body_sel) {
        let nested = el
            .ancestors()
            .filter_map(scraper::ElementRef::wrap)
            .any(|a| container_tags.contains(&a.value().name()));
        if nested {
            continue;
        }

        let text = collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "));
        if text.is_empty() {
            continue;
        }
        found_any = true;

        let name = el.value().name();
        if let Some(level) = name.strip_prefix('h').and_then(|l| l.parse::<u8>().ok()) {
            if level == 1 && raw.hints.title.as_deref().map_or(true, |t| t == text) {
                raw.hints.title = Some(text);
                continue;
            }
            raw.blocks.push(Block::Heading { text, level });
        } else {
            raw.blocks.push(Block::Line(text));
            raw.blocks.push(Block::Blank);
        }
    }

    // Bare text with no block elements.
    if !found_any {
        let body_sel = selector("body")?;
        if let Some(body) = document.select(&body_sel).next() {
            raw.push_lines(&body.text().collect::<Vec<_>>().join("\n"));
        }
    }

    if !raw.has_text() {
        return Err(Error::parse_failure(filename, "HTML contains no readable text"));
    }
    Ok(raw)
}

// ---------------------------------------------------------------------------
// LaTeX
// ---------------------------------------------------------------------------

fn latex_argument(source: &str, command: &str) -> Option<String> {
    let start = source.find(&format!("\\{}{{", command))? + command.len() + 2;
    let mut depth = 1usize;
    for (i, c) in source[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(source[start..start + i].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

fn strip_latex_inline(text: &str) -> String {
    let mut out = LATEX_REFERENCE.replace_all(text, "").into_owned();
    out = LATEX_STYLE
        .replace_all(&out, "$1")
        .into_owned();
    out = LATEX_ENVIRONMENT.replace_all(&out, "").into_owned();
    out = LATEX_COMMAND.replace_all(&out, "").into_owned();
    out.replace("\\\\", " ")
        .replace(['{', '}'], "")
        .replace('~', " ")
        .trim()
        .to_string()
}

fn parse_latex(source: &str) -> RawText {
    let mut raw = RawText::default();
    let source = LATEX_COMMENT.replace_all(source, "$1").into_owned();

    raw.hints.title = latex_argument(&source, "title").map(|t| collapse_whitespace(&strip_latex_inline(&t)));
    if let Some(authors) = latex_argument(&source, "author") {
        let authors = LATEX_THANKS.replace_all(&authors, "");
        raw.hints.authors = authors
            .split("\\and")
            .flat_map(|a| a.split(','))
            .map(|a| collapse_whitespace(&strip_latex_inline(a.split("\\\\").next().unwrap_or(a))))
            .filter(|a| !a.is_empty())
            .collect();
    }
    if let Some(keywords) = latex_argument(&source, "keywords") {
        raw.hints.keywords = strip_latex_inline(&keywords)
            .split([',', ';'])
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();
    }

    let body = match (source.find("\\begin{document}"), source.find("\\end{document}")) {
        (Some(start), Some(end)) if end > start => &source[start + "\\begin{document}".len()..end],
        (Some(start), None) => &source[start + "\\begin{document}".len()..],
        _ => source.as_str(),
    };

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            raw.blocks.push(Block::Blank);
            continue;
        }
        if line.starts_with("\\begin{abstract}") {
            raw.blocks.push(Block::Heading { text: "Abstract".to_string(), level: 1 });
            continue;
        }
        if line.starts_with("\\begin{thebibliography}") || line.starts_with("\\bibliography{") {
            raw.blocks.push(Block::Heading { text: "References".to_string(), level: 1 });
            continue;
        }
        if line.starts_with("\\maketitle") || line.starts_with("\\end{abstract}") {
            raw.blocks.push(Block::Blank);
            continue;
        }
        if let Some(caps) = LATEX_HEADING.captures(line) {
            let level = match caps.get(1).map(|m| m.as_str()) {
                Some("section") => 1,
                Some("subsection") => 2,
                Some("subsubsection") => 3,
                _ => 4,
            };
            let text = strip_latex_inline(caps.get(2).map_or("", |m| m.as_str()));
            raw.blocks.push(Block::Heading { text, level });
            continue;
        }
        if line.starts_with("\\bibitem") {
            raw.blocks.push(Block::Blank);
        }
        let text = strip_latex_inline(line);
        if !text.is_empty() {
            raw.blocks.push(Block::Line(text));
        }
    }
    raw.blocks.push(Block::Blank);
    raw
}

// ---------------------------------------------------------------------------
// Markdown
// ---------------------------------------------------------------------------

fn parse_markdown(source: &str) -> RawText {
    let mut raw = RawText::default();
    let mut in_code = false;

    for line in source.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            in_code = !in_code;
            raw.blocks.push(Block::Blank);
            continue;
        }
        if in_code {
            if !trimmed.is_empty() {
                raw.blocks.push(Block::Paragraph(trimmed.to_string()));
            }
            continue;
        }
        if trimmed.is_empty() {
            raw.blocks.push(Block::Blank);
            continue;
        }

        let hashes = trimmed.chars().take_while(|c| *c == '#').count();
        if (1..=6).contains(&hashes) && trimmed[hashes..].starts_with(' ') {
            let text = trimmed[hashes..].trim().trim_end_matches('#').trim().to_string();
            let nothing_before = !raw.has_text();
            if hashes == 1 && nothing_before && raw.hints.title.is_none() {
                raw.hints.title = Some(text);
            } else {
                raw.blocks.push(Block::Heading { text, level: hashes as u8 });
            }
            continue;
        }

        let text = MARKDOWN_EMPHASIS.replace_all(trimmed, "");
        raw.blocks.push(Block::Line(text.into_owned()));
    }
    raw.blocks.push(Block::Blank);
    raw
}
