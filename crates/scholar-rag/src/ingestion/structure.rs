//! Section, metadata and reference extraction
//!
//! Format parsers reduce their input to a stream of [`Block`]s. This module
//! turns that stream into the normalized tree: sections with labelled kinds,
//! paragraphs, bibliographic metadata and the reference list.

use lazy_static::lazy_static;
use regex::Regex;

use crate::types::{Author, DocumentMetadata, ProcessingIssue, Reference, Section, SectionKind};

/// Lines scanned for title, authors and other front-matter metadata
const FRONT_LINES: usize = 10;
/// Lines scanned for keyword / DOI / date patterns
const META_LINES: usize = 200;
const MIN_REFERENCE_CHARS: usize = 20;
const CJK_WORD_COUNT_THRESHOLD: usize = 20;

lazy_static! {
    static ref REFERENCE_ENTRY: Regex = Regex::new(r"^(\[\d{1,3}\]|\d{1,3}\.\s)").expect("invalid REFERENCE_ENTRY pattern");
    static ref INLINE_HEADING: Regex = Regex::new(r"^(?i)(abstract|summary|keywords|摘\s*要)\s*[:：.\u{2014}\u{2013}-]\s*(\S.*)$").expect("invalid INLINE_HEADING pattern");
    static ref KNOWN_HEADING: Regex = Regex::new(r"^(?i)(?:(\d+(?:\.\d+)*)\.?\s+|[IVX]{1,4}\.\s+)?(abstract|introduction|background|related work|literature review|preliminaries|methods?|methodology|materials and methods|experimental setup|experiments?|evaluation|results?|results and discussion|discussion|conclusions?|concluding remarks|future work|limitations|references|bibliography|acknowledge?ments?)\s*:?$").expect("invalid KNOWN_HEADING pattern");
    static ref CHINESE_HEADING: Regex = Regex::new(r"^(?:[一二三四五六七八九十]+[、.]\s*|\d+(?:\.\d+)*\.?\s*)?(摘\s*要|引\s*言|前\s*言|绪\s*论|相关工作|研究背景|研究方法|方\s*法|实验|实验结果|结\s*果|讨\s*论|结\s*论|总\s*结|参考文献|致\s*谢)\s*[:：]?$").expect("invalid CHINESE_HEADING pattern");
    static ref NUMBERED_HEADING: Regex = Regex::new(r"^(\d{1,2}(?:\.\d{1,2}){0,3})\.?\s+(\p{Lu}|\p{Han})").expect("invalid NUMBERED_HEADING pattern");
    static ref ROMAN_HEADING: Regex = Regex::new(r"^[IVX]{1,4}\.\s+\p{Lu}[\p{L}\s,&-]{2,80}$").expect("invalid ROMAN_HEADING pattern");
    static ref DIGIT_RUN: Regex = Regex::new(r"\d{3,}").expect("invalid DIGIT_RUN pattern");
    static ref FRONT_MATTER_NOISE: Regex = Regex::new(r"(?i)^(doi|https?://|arxiv|vol\.|volume|received|published|copyright|©)").expect("invalid FRONT_MATTER_NOISE pattern");
    static ref KEYWORDS_LABEL: Regex = Regex::new(r"(?i)(keywords|key words|index terms|关键词)\s*[:：\u{2014}-]").expect("invalid KEYWORDS_LABEL pattern");
    static ref KEYWORDS_LINE: Regex = Regex::new(r"(?im)(?:keywords|key words|index terms|关键词)\s*[:：\u{2014}-]\s*(.+)$").expect("invalid KEYWORDS_LINE pattern");
    static ref DOI: Regex = Regex::new(r#"\b10\.\d{4,9}/[^\s"<>]+"#).expect("invalid DOI pattern");
    static ref LABELLED_DATE: Regex = Regex::new(r"(?i)(?:published|available online|accepted|received)[^\n:]{0,20}[:\s]+(\d{1,2}\s+[A-Za-z]+\.?\s+\d{4}|[A-Za-z]+\.?\s+\d{1,2},?\s+\d{4}|\d{4}-\d{2}-\d{2})").expect("invalid LABELLED_DATE pattern");
    static ref ISO_DATE: Regex = Regex::new(r"\b(19|20)\d{2}-\d{2}-\d{2}\b").expect("invalid ISO_DATE pattern");
    static ref AUTHOR_MARKS: Regex = Regex::new(r"[\d\*†‡§¶]+").expect("invalid AUTHOR_MARKS pattern");
    static ref AUTHOR_SEPARATOR: Regex = Regex::new(r"\s*(?:,|;|\band\b|&|、)\s*").expect("invalid AUTHOR_SEPARATOR pattern");
    static ref YEAR: Regex = Regex::new(r"\b(19|20)\d{2}\b").expect("invalid YEAR pattern");
}

/// A unit of extracted text, before structure is applied
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// Heading marked up by the source format
    Heading { text: String, level: u8 },
    /// Paragraph delimited by the source format
    Paragraph(String),
    /// Raw line; heading heuristics apply and consecutive lines form a paragraph
    Line(String),
    /// Paragraph boundary
    Blank,
    /// Following blocks belong to this 1-based page
    Page(u32),
}

/// Metadata supplied directly by the container format (PDF info, HTML meta, LaTeX commands)
#[derive(Debug, Clone, Default)]
pub struct MetadataHints {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub publish_date: Option<String>,
    pub abstract_text: Option<String>,
    pub keywords: Vec<String>,
    pub doi: Option<String>,
    pub journal: Option<String>,
}

/// Output of a format parser
#[derive(Debug, Clone, Default)]
pub struct RawText {
    pub blocks: Vec<Block>,
    pub page_count: Option<u32>,
    pub hints: MetadataHints,
    pub issues: Vec<ProcessingIssue>,
}

impl RawText {
    /// Split plain text into line blocks
    pub fn push_lines(&mut self, text: &str) {
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                self.blocks.push(Block::Blank);
            } else {
                self.blocks.push(Block::Line(line.to_string()));
            }
        }
        self.blocks.push(Block::Blank);
    }

    /// Whether any non-blank text was extracted
    pub fn has_text(&self) -> bool {
        self.blocks.iter().any(|b| match b {
            Block::Heading { text, .. } | Block::Paragraph(text) | Block::Line(text) => !text.trim().is_empty(),
            Block::Blank | Block::Page(_) => false,
        })
    }
}

/// Normalized structure of a document
#[derive(Debug, Clone)]
pub struct Structure {
    pub title: Option<String>,
    pub sections: Vec<Section>,
    pub metadata: DocumentMetadata,
    pub references: Vec<Reference>,
    pub word_count: usize,
}

/// Build sections, metadata and references from a block stream
pub fn extract(raw: &RawText) -> Structure {
    let front_lines = leading_lines(&raw.blocks, META_LINES);
    let sections = build_sections(&raw.blocks);

    let title = raw
        .hints
        .title
        .clone()
        .filter(|t| usable_title(t))
        .or_else(|| guess_title(&front_lines));

    let all_text: String = sections
        .iter()
        .map(|s| s.text())
        .collect::<Vec<_>>()
        .join("\n\n");

    let metadata = extract_metadata(raw, &front_lines, title.as_deref(), &sections, &all_text);
    let references = extract_references(&sections);
    let word_count = count_words(&all_text);

    Structure {
        title,
        sections,
        metadata,
        references,
        word_count,
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

struct SectionBuilder {
    sections: Vec<Section>,
    current: Section,
    buffer: String,
    page: Option<u32>,
    saw_heading: bool,
}

impl SectionBuilder {
    fn new() -> Self {
        Self {
            sections: Vec::new(),
            current: Section::new("", SectionKind::FrontMatter, 0),
            buffer: String::new(),
            page: None,
            saw_heading: false,
        }
    }

    fn flush_paragraph(&mut self) {
        let paragraph = std::mem::take(&mut self.buffer);
        let paragraph = paragraph.trim();
        if !paragraph.is_empty() {
            self.current.paragraphs.push(paragraph.to_string());
        }
    }

    fn push_line(&mut self, line: &str) {
        if self.current.kind == SectionKind::References && starts_reference_entry(line) {
            self.flush_paragraph();
        }
        join_line(&mut self.buffer, line);
    }

    fn start_section(&mut self, heading: &str, kind: SectionKind, level: u8) {
        self.flush_paragraph();
        let previous = std::mem::replace(&mut self.current, Section::new(heading, kind, level));
        self.current.page_start = self.page;
        // Front matter with no text is dropped; headed sections are kept even when empty.
        if previous.kind != SectionKind::FrontMatter || !previous.is_empty() {
            self.sections.push(previous);
        }
        self.saw_heading = true;
    }

    fn finish(mut self) -> Vec<Section> {
        self.flush_paragraph();
        let last = self.current;
        if last.kind != SectionKind::FrontMatter || !last.is_empty() {
            self.sections.push(last);
        }

        let mut sections = self.sections;
        if !self.saw_heading {
            for section in &mut sections {
                section.heading = "Body".to_string();
                section.kind = SectionKind::Other;
            }
        } else {
            for section in &mut sections {
                if section.kind == SectionKind::FrontMatter {
                    section.heading = "Front Matter".to_string();
                }
            }
        }
        sections
    }
}

fn build_sections(blocks: &[Block]) -> Vec<Section> {
    let mut builder = SectionBuilder::new();

    for block in blocks {
        match block {
            Block::Page(n) => {
                builder.flush_paragraph();
                builder.page = Some(*n);
                if builder.current.page_start.is_none() {
                    builder.current.page_start = Some(*n);
                }
            }
            Block::Blank => builder.flush_paragraph(),
            Block::Heading { text, level } => {
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                builder.start_section(text, classify_heading(text), *level);
            }
            Block::Paragraph(text) => {
                builder.flush_paragraph();
                let text = text.trim();
                if !text.is_empty() {
                    builder.current.paragraphs.push(text.to_string());
                }
            }
            Block::Line(line) => {
                let line = line.trim();
                if line.is_empty() {
                    builder.flush_paragraph();
                } else if let Some((heading, rest)) = split_inline_heading(line) {
                    builder.start_section(heading, classify_heading(heading), 1);
                    builder.push_line(rest);
                } else if let Some(level) = detect_heading(line) {
                    builder.start_section(line, classify_heading(line), level);
                } else {
                    builder.push_line(line);
                }
            }
        }
    }

    builder.finish()
}

/// Append a physical line to a paragraph, undoing line-end hyphenation
fn join_line(buffer: &mut String, line: &str) {
    if buffer.is_empty() {
        buffer.push_str(line);
        return;
    }
    let prev_cjk = buffer.chars().last().is_some_and(is_cjk);
    let next_cjk = line.chars().next().is_some_and(is_cjk);
    let next_lower = line.chars().next().is_some_and(char::is_lowercase);

    if buffer.ends_with('-') && next_lower && !buffer.ends_with("--") {
        buffer.pop();
    } else if !(prev_cjk || next_cjk) {
        buffer.push(' ');
    }
    buffer.push_str(line);
}

fn starts_reference_entry(line: &str) -> bool {
    REFERENCE_ENTRY.is_match(line)
}

/// `Abstract: We propose...` style headings that share a line with text
fn split_inline_heading(line: &str) -> Option<(&str, &str)> {
    let caps = INLINE_HEADING.captures(line)?;
    let heading = caps.get(1)?.as_str();
    if heading.eq_ignore_ascii_case("keywords") {
        return None;
    }
    Some((heading, caps.get(2)?.as_str()))
}

/// Level of a heading line, or `None` for body text
pub fn detect_heading(line: &str) -> Option<u8> {
    let line = line.trim();
    let chars = line.chars().count();
    if chars == 0 || chars > 120 {
        return None;
    }

    if let Some(caps) = KNOWN_HEADING.captures(line) {
        return Some(caps.get(1).map(|m| numbering_level(m.as_str())).unwrap_or(1));
    }

    if CHINESE_HEADING.is_match(line) {
        return Some(1);
    }

    if let Some(caps) = NUMBERED_HEADING.captures(line) {
        let text_part = line[caps.get(1)?.end()..].trim_start_matches('.').trim();
        let words = text_part.split_whitespace().count();
        let ends_like_sentence = text_part.ends_with(['.', ',', ';', ':']);
        let top: u32 = caps.get(1)?.as_str().split('.').next()?.parse().ok()?;
        if (1..=30).contains(&top) && words <= 12 && !ends_like_sentence && !has_digit_run(text_part) {
            return Some(numbering_level(caps.get(1)?.as_str()));
        }
    }

    if ROMAN_HEADING.is_match(line) && !line.ends_with('.') {
        return Some(1);
    }

    None
}

fn numbering_level(numbering: &str) -> u8 {
    numbering.split('.').filter(|p| !p.is_empty()).count().clamp(1, 6) as u8
}

fn has_digit_run(s: &str) -> bool {
    DIGIT_RUN.is_match(s)
}

/// Label a heading with its heuristic role
pub fn classify_heading(heading: &str) -> SectionKind {
    let h = heading.to_lowercase();
    let any = |words: &[&str]| words.iter().any(|w| h.contains(w));

    if any(&["abstract", "摘要", "摘 要"]) {
        SectionKind::Abstract
    } else if any(&["introduction", "引言", "前言", "绪论"]) {
        SectionKind::Introduction
    } else if any(&["background", "related work", "literature", "preliminar", "相关工作", "背景"]) {
        SectionKind::Background
    } else if any(&["reference", "bibliograph", "参考文献"]) {
        SectionKind::References
    } else if any(&["acknowledg", "致谢"]) {
        SectionKind::Acknowledgements
    } else if any(&["conclusion", "concluding", "future work", "summary", "结论", "总结"]) {
        SectionKind::Conclusion
    } else if any(&["method", "materials", "approach", "experimental setup", "framework", "model", "方法"]) {
        SectionKind::Method
    } else if any(&["result", "experiment", "evaluation", "finding", "结果", "实验"]) {
        SectionKind::Result
    } else if any(&["discussion", "limitation", "讨论"]) {
        SectionKind::Discussion
    } else {
        SectionKind::Other
    }
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

fn leading_lines(blocks: &[Block], limit: usize) -> Vec<String> {
    blocks
        .iter()
        .filter_map(|b| match b {
            Block::Heading { text, .. } | Block::Paragraph(text) | Block::Line(text) => {
                let t = text.trim();
                (!t.is_empty()).then(|| t.to_string())
            }
            _ => None,
        })
        .take(limit)
        .collect()
}

fn usable_title(title: &str) -> bool {
    let t = title.trim();
    let n = t.chars().count();
    (4..=300).contains(&n)
        && !t.to_lowercase().starts_with("microsoft word")
        && !t.to_lowercase().ends_with(".pdf")
        && !t.to_lowercase().ends_with(".docx")
}

/// First reasonable line among the first few, skipping headings and identifiers
fn guess_title(lines: &[String]) -> Option<String> {
    lines
        .iter()
        .take(FRONT_LINES)
        .find(|line| {
            let n = line.chars().count();
            (10..=200).contains(&n)
                && detect_heading(line).is_none()
                && split_inline_heading(line).is_none()
                && !line.contains('@')
                && !FRONT_MATTER_NOISE.is_match(line)
        })
        .cloned()
}

fn extract_metadata(
    raw: &RawText,
    front: &[String],
    title: Option<&str>,
    sections: &[Section],
    all_text: &str,
) -> DocumentMetadata {
    let hints = &raw.hints;
    let front_text = front.join("\n");

    let authors = if hints.authors.is_empty() {
        guess_authors(front, title)
    } else {
        hints.authors.iter().map(|a| Author::named(a.trim())).collect()
    };

    let abstract_text = hints
        .abstract_text
        .clone()
        .or_else(|| {
            sections
                .iter()
                .find(|s| s.kind == SectionKind::Abstract && !s.is_empty())
                .map(|s| strip_keywords_line(&s.text()))
        })
        .filter(|a| !a.trim().is_empty());

    let keywords = if hints.keywords.is_empty() {
        extract_keywords(&front_text)
    } else {
        hints.keywords.clone()
    };

    let doi = hints.doi.clone().or_else(|| find_doi(&front_text)).or_else(|| {
        let head: String = all_text.chars().take(5000).collect();
        find_doi(&head)
    });

    let publish_date = hints.publish_date.clone().or_else(|| find_date(&front_text));

    let language = Some(if cjk_count(all_text) >= CJK_WORD_COUNT_THRESHOLD { "zh" } else { "en" }.to_string());

    DocumentMetadata {
        authors,
        publish_date,
        abstract_text,
        keywords,
        doi,
        journal: hints.journal.clone(),
        language,
    }
}

fn strip_keywords_line(text: &str) -> String {
    match KEYWORDS_LABEL.find(text) {
        Some(m) => text[..m.start()].trim().to_string(),
        None => text.trim().to_string(),
    }
}

/// Keywords from a `Keywords:` / `Index Terms` / `关键词` line
pub fn extract_keywords(text: &str) -> Vec<String> {
    let Some(caps) = KEYWORDS_LINE.captures(text) else {
        return Vec::new();
    };
    let Some(list) = caps.get(1) else {
        return Vec::new();
    };
    list.as_str()
        .split([',', ';', '，', '；', '·', '\u{2022}'])
        .map(|k| k.trim().trim_end_matches('.').trim())
        .filter(|k| !k.is_empty() && k.split_whitespace().count() <= 6 && k.chars().count() <= 60)
        .map(str::to_string)
        .collect()
}

/// First DOI in the text, trailing punctuation trimmed
pub fn find_doi(text: &str) -> Option<String> {
    DOI
        .find(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ')', ']']).to_string())
}

fn find_date(text: &str) -> Option<String> {
    if let Some(caps) = LABELLED_DATE.captures(text) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }
    ISO_DATE
        .find(text)
        .map(|m| m.as_str().to_string())
}

/// The line after the title, when it reads like a list of names
fn guess_authors(front: &[String], title: Option<&str>) -> Vec<Author> {
    let Some(title) = title else {
        return Vec::new();
    };
    let Some(pos) = front.iter().take(FRONT_LINES).position(|l| l == title) else {
        return Vec::new();
    };
    let Some(line) = front.get(pos + 1) else {
        return Vec::new();
    };
    if line.chars().count() > 200 || line.contains('@') || detect_heading(line).is_some() {
        return Vec::new();
    }

    let cleaned = AUTHOR_MARKS.replace_all(line, "");
    let parts: Vec<&str> = AUTHOR_SEPARATOR
        .split(&cleaned)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let looks_like_name = |p: &&str| {
        let words: Vec<&str> = p.split_whitespace().collect();
        let latin = (2..=5).contains(&words.len())
            && words.iter().all(|w| w.chars().next().is_some_and(char::is_uppercase));
        let han = p.chars().all(is_cjk) && (2..=4).contains(&p.chars().count());
        latin || han
    };

    if parts.is_empty() || parts.len() > 12 || !parts.iter().all(looks_like_name) {
        return Vec::new();
    }
    parts.into_iter().map(Author::named).collect()
}

// ---------------------------------------------------------------------------
// References
// ---------------------------------------------------------------------------

fn extract_references(sections: &[Section]) -> Vec<Reference> {
    sections
        .iter()
        .filter(|s| s.kind == SectionKind::References)
        .flat_map(|s| s.paragraphs.iter())
        .map(|p| p.trim())
        .filter(|p| p.chars().count() > MIN_REFERENCE_CHARS)
        .enumerate()
        .map(|(i, raw)| Reference {
            index: i + 1,
            raw_text: raw.to_string(),
            year: YEAR.find(raw).and_then(|m| m.as_str().parse().ok()),
            doi: find_doi(raw),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Counting
// ---------------------------------------------------------------------------

pub(crate) fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0x20000..=0x2A6DF | 0xF900..=0xFAFF | 0x3040..=0x30FF | 0xAC00..=0xD7AF)
}

fn cjk_count(text: &str) -> usize {
    text.chars().filter(|c| is_cjk(*c)).count()
}

/// Non-whitespace chars for CJK-heavy text, whitespace-separated words otherwise
pub fn count_words(text: &str) -> usize {
    if cjk_count(text) >= CJK_WORD_COUNT_THRESHOLD {
        text.chars().filter(|c| !c.is_whitespace()).count()
    } else {
        text.split_whitespace().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_from(text: &str) -> RawText {
        let mut raw = RawText::default();
        raw.push_lines(text);
        raw
    }

    const PAPER: &str = "\
Attention Is Mostly What You Need Today
Ada Lovelace, Alan Turing
Published: 12 March 2021
doi: 10.1234/abcd.5678.

Abstract: We study attention in depth.
Keywords: attention, transformers; scaling

1. Introduction
Transformers are widely used in
language modelling and vision.

2. Methods
We train a model on 3 datasets
and evaluate it.

2.1 Data Collection
Data came from the web.

3 Results
Accuracy improved by 4 points.

References
[1] A. Author. A very long reference title here. 2017.
[2] B. Author. Another reference with doi 10.5555/xyz.1 in 2019.
";

    #[test]
    fn test_sections_in_order() {
        let s = extract(&raw_from(PAPER));
        let headings: Vec<_> = s.sections.iter().map(|s| s.heading.as_str()).collect();
        assert_eq!(
            headings,
            vec!["Front Matter", "Abstract", "1. Introduction", "2. Methods", "2.1 Data Collection", "3 Results", "References"]
        );
        let kinds: Vec<_> = s.sections.iter().map(|s| s.kind).collect();
        assert_eq!(kinds[1], SectionKind::Abstract);
        assert_eq!(kinds[3], SectionKind::Method);
        assert_eq!(kinds[5], SectionKind::Result);
        assert_eq!(kinds[6], SectionKind::References);
        assert_eq!(s.sections[4].level, 2);
    }

    #[test]
    fn test_lines_join_into_paragraphs() {
        let s = extract(&raw_from(PAPER));
        assert_eq!(
            s.sections[2].paragraphs,
            vec!["Transformers are widely used in language modelling and vision.".to_string()]
        );
    }

    #[test]
    fn test_metadata() {
        let s = extract(&raw_from(PAPER));
        assert_eq!(s.title.as_deref(), Some("Attention Is Mostly What You Need Today"));
        let names: Vec<_> = s.metadata.authors.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(s.metadata.doi.as_deref(), Some("10.1234/abcd.5678"));
        assert_eq!(s.metadata.keywords, vec!["attention", "transformers", "scaling"]);
        assert_eq!(s.metadata.publish_date.as_deref(), Some("12 March 2021"));
        assert_eq!(s.metadata.abstract_text.as_deref(), Some("We study attention in depth."));
    }

    #[test]
    fn test_references() {
        let s = extract(&raw_from(PAPER));
        assert_eq!(s.references.len(), 2);
        assert_eq!(s.references[0].year, Some(2017));
        assert_eq!(s.references[1].doi.as_deref(), Some("10.5555/xyz.1"));
    }

    #[test]
    fn test_no_headings_gives_single_body_section() {
        let s = extract(&raw_from("just some text\nwithout any structure at all\n\nsecond paragraph"));
        assert_eq!(s.sections.len(), 1);
        assert_eq!(s.sections[0].heading, "Body");
        assert_eq!(s.sections[0].kind, SectionKind::Other);
        assert_eq!(s.sections[0].paragraphs.len(), 2);
    }

    #[test]
    fn test_heading_detection_rejects_sentences() {
        assert_eq!(detect_heading("1. Introduction"), Some(1));
        assert_eq!(detect_heading("3.2 Ablation Study"), Some(2));
        assert_eq!(detect_heading("CONCLUSION"), Some(1));
        assert_eq!(detect_heading("参考文献"), Some(1));
        assert_eq!(detect_heading("1. We first compute the loss, then update."), None);
        assert_eq!(detect_heading("2019 was a productive year for the field"), None);
        assert_eq!(detect_heading("The results are shown below"), None);
    }

    #[test]
    fn test_hyphenation_is_undone() {
        let s = extract(&raw_from("Body text with a hyph-\nenated word"));
        assert_eq!(s.sections[0].paragraphs[0], "Body text with a hyphenated word");
    }

    #[test]
    fn test_word_count_cjk_aware() {
        assert_eq!(count_words("three little words"), 3);
        let chinese = "深度学习在自然语言处理中的应用研究综述与展望以及未来发展方向";
        assert!(chinese.chars().count() >= 20);
        assert_eq!(count_words(chinese), chinese.chars().count());
    }

    #[test]
    fn test_page_start_recorded() {
        let raw = RawText {
            blocks: vec![
                Block::Page(1),
                Block::Line("1. Introduction".into()),
                Block::Line("text".into()),
                Block::Page(2),
                Block::Line("2. Methods".into()),
                Block::Line("more".into()),
            ],
            ..Default::default()
        };
        let s = extract(&raw);
        assert_eq!(s.sections[0].page_start, Some(1));
        assert_eq!(s.sections[1].page_start, Some(2));
    }
}
