//! Document tree, chunk and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Separator placed between sections when laying the document out as one string
pub const SECTION_SEPARATOR: &str = "\n\n";

/// Separator placed between paragraphs inside a section
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Supported input formats
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Html,
    Latex,
    Markdown,
    Text,
}

impl DocumentFormat {
    /// Display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Docx => "Word Document (.docx)",
            Self::Html => "HTML",
            Self::Latex => "LaTeX",
            Self::Markdown => "Markdown",
            Self::Text => "Text File",
        }
    }

    /// Canonical extension used for the stored raw upload
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Html => "html",
            Self::Latex => "tex",
            Self::Markdown => "md",
            Self::Text => "txt",
        }
    }
}

/// Processing status of a document
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Uploaded,
    Parsing,
    Parsed,
    Failed,
}

impl std::str::FromStr for DocumentStatus {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s.to_lowercase().as_str() {
            "uploaded" => Ok(Self::Uploaded),
            "parsing" => Ok(Self::Parsing),
            "parsed" => Ok(Self::Parsed),
            "failed" => Ok(Self::Failed),
            other => Err(crate::error::Error::invalid(format!("Unknown document status '{}'", other))),
        }
    }
}

/// Heuristic role of a section in a paper
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    FrontMatter,
    Abstract,
    Introduction,
    Background,
    Method,
    Result,
    Discussion,
    Conclusion,
    References,
    Acknowledgements,
    Other,
}

/// A headed section of a document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Section {
    /// Heading text as it appeared
    pub heading: String,
    /// Heuristic role
    pub kind: SectionKind,
    /// Numbering depth (1 for `2.`, 2 for `2.3`, ...)
    pub level: u8,
    /// First page the heading appeared on, when known
    pub page_start: Option<u32>,
    /// Paragraphs in order
    pub paragraphs: Vec<String>,
}

impl Section {
    /// Create an empty section
    pub fn new(heading: impl Into<String>, kind: SectionKind, level: u8) -> Self {
        Self {
            heading: heading.into(),
            kind,
            level,
            page_start: None,
            paragraphs: Vec::new(),
        }
    }

    /// Paragraphs joined into the text that gets chunked
    pub fn text(&self) -> String {
        self.paragraphs.join(PARAGRAPH_SEPARATOR)
    }

    /// Length of [`Section::text`] in chars
    pub fn char_len(&self) -> usize {
        let body: usize = self.paragraphs.iter().map(|p| p.chars().count()).sum();
        body + self.paragraphs.len().saturating_sub(1) * PARAGRAPH_SEPARATOR.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.paragraphs.iter().all(|p| p.trim().is_empty())
    }
}

/// Author of a paper
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
}

impl Author {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: None,
            affiliation: None,
        }
    }
}

/// Bibliographic metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DocumentMetadata {
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub publish_date: Option<String>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub journal: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

/// Entry of the reference list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reference {
    /// 1-based position in the reference list
    pub index: usize,
    pub raw_text: String,
    #[serde(default)]
    pub year: Option<u16>,
    #[serde(default)]
    pub doi: Option<String>,
}

/// A non-fatal problem recorded while processing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessingIssue {
    /// Page the problem relates to, if any
    pub page: Option<u32>,
    pub message: String,
}

impl ProcessingIssue {
    pub fn page(page: u32, message: impl Into<String>) -> Self {
        Self {
            page: Some(page),
            message: message.into(),
        }
    }

    pub fn general(message: impl Into<String>) -> Self {
        Self {
            page: None,
            message: message.into(),
        }
    }
}

/// A paper and its parsed structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique document ID
    pub id: Uuid,
    /// Filename as uploaded
    pub filename: String,
    /// Detected format
    pub format: DocumentFormat,
    /// Raw upload size in bytes
    pub file_size: u64,
    /// SHA-256 of the raw upload
    pub content_hash: String,
    /// Title (extracted, else the filename stem)
    pub title: String,
    /// Sections in document order
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub metadata: DocumentMetadata,
    #[serde(default)]
    pub references: Vec<Reference>,
    pub status: DocumentStatus,
    /// Why processing failed
    #[serde(default)]
    pub status_reason: Option<String>,
    /// Non-fatal problems, e.g. pages OCR could not read
    #[serde(default)]
    pub processing_errors: Vec<ProcessingIssue>,
    #[serde(default)]
    pub page_count: Option<u32>,
    #[serde(default)]
    pub word_count: usize,
    /// Chunks in the current index
    #[serde(default)]
    pub chunk_count: usize,
    /// When the current index was built
    #[serde(default)]
    pub indexed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Create a freshly uploaded document
    pub fn new(filename: impl Into<String>, format: DocumentFormat, file_size: u64, content_hash: String) -> Self {
        let filename = filename.into();
        let now = Utc::now();
        let title = std::path::Path::new(&filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&filename)
            .to_string();
        Self {
            id: Uuid::new_v4(),
            filename,
            format,
            file_size,
            content_hash,
            title,
            sections: Vec::new(),
            metadata: DocumentMetadata::default(),
            references: Vec::new(),
            status: DocumentStatus::Uploaded,
            status_reason: None,
            processing_errors: Vec::new(),
            page_count: None,
            word_count: 0,
            chunk_count: 0,
            indexed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to a new status, stamping `updated_at`
    pub fn set_status(&mut self, status: DocumentStatus, reason: Option<String>) {
        self.status = status;
        self.status_reason = reason;
        self.updated_at = Utc::now();
    }

    /// Document-level char offset at which each section's text starts
    pub fn section_offsets(&self) -> Vec<usize> {
        let sep = SECTION_SEPARATOR.chars().count();
        let mut offsets = Vec::with_capacity(self.sections.len());
        let mut cursor = 0usize;
        for section in &self.sections {
            offsets.push(cursor);
            cursor += section.char_len() + sep;
        }
        offsets
    }

    /// Full text, sections laid out in order
    pub fn full_text(&self) -> String {
        self.sections
            .iter()
            .map(Section::text)
            .collect::<Vec<_>>()
            .join(SECTION_SEPARATOR)
    }

    /// Find a section by exact heading, else by case-insensitive substring
    pub fn find_section(&self, heading: &str) -> Option<(usize, &Section)> {
        let needle = heading.trim();
        self.sections
            .iter()
            .enumerate()
            .find(|(_, s)| s.heading == needle)
            .or_else(|| {
                let lower = needle.to_lowercase();
                self.sections
                    .iter()
                    .enumerate()
                    .find(|(_, s)| s.heading.to_lowercase().contains(&lower))
            })
    }

    pub fn is_ready(&self) -> bool {
        self.status == DocumentStatus::Parsed && self.indexed_at.is_some()
    }
}

/// A retrievable window of a section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: Uuid,
    pub document_id: Uuid,
    /// Index into `Document::sections`
    pub section_index: usize,
    pub section_heading: String,
    /// Position among the document's chunks
    pub chunk_index: usize,
    /// Document-level char offset of the window this chunk owns
    pub char_offset: usize,
    /// Chars of `text`, including the overlap prefix
    pub char_len: usize,
    /// Indexed text (overlap prefix + owned window)
    pub text: String,
    /// Embedding vector
    #[serde(default)]
    pub embedding: Vec<f32>,
}

/// Compact listing view of a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: Uuid,
    pub filename: String,
    pub title: String,
    pub format: DocumentFormat,
    pub status: DocumentStatus,
    pub status_reason: Option<String>,
    pub section_count: usize,
    pub chunk_count: usize,
    pub page_count: Option<u32>,
    pub word_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id,
            filename: doc.filename.clone(),
            title: doc.title.clone(),
            format: doc.format,
            status: doc.status,
            status_reason: doc.status_reason.clone(),
            section_count: doc.sections.len(),
            chunk_count: doc.chunk_count,
            page_count: doc.page_count,
            word_count: doc.word_count,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}
