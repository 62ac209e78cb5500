//! Full, section and custom summaries

use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

use crate::config::PromptConfig;
use crate::error::{Error, Missing, Result};
use crate::generation::{Evidence, PromptAssembler, TemplateId};
use crate::providers::{Completion, LlmProvider};
use crate::retrieval::Retriever;
use crate::storage::DocumentStore;
use crate::types::{
    Document, DocumentStatus, Section, SectionKind, SectionSelector, SectionSummary, SummaryKind,
    SummaryRecord, SummaryRequest, TokenUsage,
};

/// Sections summarized when no section is selected
const MAX_SECTIONS: usize = 20;
/// Section summaries in flight at once
const SECTION_CONCURRENCY: usize = 4;
const MAX_KEYWORD_SUGGESTIONS: usize = 15;

const STOPWORDS: &[&str] = &[
    "about", "after", "also", "among", "based", "been", "being", "between", "both", "could", "each",
    "from", "have", "here", "however", "into", "more", "most", "other", "over", "such", "than",
    "that", "their", "them", "then", "there", "these", "they", "this", "those", "through", "under",
    "using", "were", "what", "when", "where", "which", "while", "with", "within", "would", "paper",
    "section", "results", "method", "methods", "introduction", "conclusion", "abstract", "figure",
    "table", "show", "shows", "shown", "used", "use",
];

/// Summary orchestration on top of parsed documents
pub struct Summarizer {
    documents: Arc<DocumentStore>,
    retriever: Arc<Retriever>,
    assembler: PromptAssembler,
    llm: Arc<dyn LlmProvider>,
    excerpt_chars: usize,
    top_k: usize,
}

impl Summarizer {
    pub fn new(
        documents: Arc<DocumentStore>,
        retriever: Arc<Retriever>,
        llm: Arc<dyn LlmProvider>,
        config: &PromptConfig,
    ) -> Self {
        Self {
            documents,
            retriever,
            assembler: PromptAssembler::new(config),
            llm,
            excerpt_chars: config.section_excerpt_chars,
            top_k: config.top_k,
        }
    }

    /// Generate a summary and append it to the document's summary log
    pub async fn summarize(&self, request: &SummaryRequest) -> Result<SummaryRecord> {
        let start = Instant::now();
        let doc = self.documents.get(request.document_id)?;
        if doc.status != DocumentStatus::Parsed {
            return Err(Error::invalid(format!(
                "Document {} is {:?}, not parsed",
                doc.id, doc.status
            )));
        }

        let mut summary = match request.kind {
            SummaryKind::Full => self.full(&doc).await?,
            SummaryKind::Section => self.sections(&doc, request.section.as_ref()).await?,
            SummaryKind::Custom => {
                self.custom(&doc, &request.keywords, request.template.as_deref())
                    .await?
            }
        };
        summary.processing_ms = start.elapsed().as_millis() as u64;

        self.documents.append_summary(&summary).await?;
        tracing::info!(
            "{:?} summary of '{}' with {} in {}ms",
            summary.kind,
            doc.title,
            summary.template,
            summary.processing_ms
        );
        Ok(summary)
    }

    async fn full(&self, doc: &Document) -> Result<SummaryRecord> {
        let evidence = self.section_excerpts(doc);
        let completion = self
            .complete(TemplateId::FullSummary, &doc.title, &evidence)
            .await?;
        Ok(with_text(
            record(doc, SummaryKind::Full, TemplateId::FullSummary, Vec::new()),
            completion,
        ))
    }

    async fn sections(&self, doc: &Document, selector: Option<&SectionSelector>) -> Result<SummaryRecord> {
        if let Some(selector) = selector {
            let (index, section) = resolve_section(doc, selector)?;
            let template = section_template(section.kind);
            let completion = self.summarize_section(doc, index, section).await?;
            let mut rec = record(doc, SummaryKind::Section, template, Vec::new());
            rec.sections.push(SectionSummary {
                section_index: index,
                heading: section.heading.clone(),
                kind: section.kind,
                summary: Some(completion.text.clone()),
                error: None,
            });
            return Ok(with_text(rec, completion));
        }

        let mut rec = record(doc, SummaryKind::Section, TemplateId::SectionSummary, Vec::new());
        let candidates: Vec<(usize, &Section)> = doc
            .sections
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_empty() && !matches!(s.kind, SectionKind::References | SectionKind::Acknowledgements))
            .take(MAX_SECTIONS)
            .collect();

        let pending: Vec<_> = candidates
            .into_iter()
            .map(|(index, section)| async move {
                (index, section, self.summarize_section(doc, index, section).await)
            })
            .collect();
        let results: Vec<_> = stream::iter(pending)
            .buffered(SECTION_CONCURRENCY)
            .collect()
            .await;

        if results.is_empty() {
            return Err(Error::invalid("Document has no summarizable sections"));
        }
        if results.iter().all(|(_, _, r)| r.is_err()) {
            // nothing succeeded: surface the first failure with its own kind
            if let Some((_, _, Err(e))) = results.into_iter().next() {
                return Err(e);
            }
            return Err(Error::internal("Section summaries failed"));
        }

        for (index, section, result) in results {
            let (summary, error) = match result {
                Ok(completion) => {
                    add_usage(&mut rec.usage, completion.usage);
                    (Some(completion.text), None)
                }
                Err(e) => {
                    tracing::warn!("Summary of section '{}' failed: {}", section.heading, e);
                    (None, Some(e.to_string()))
                }
            };
            rec.sections.push(SectionSummary {
                section_index: index,
                heading: section.heading.clone(),
                kind: section.kind,
                summary,
                error,
            });
        }
        Ok(rec)
    }

    async fn summarize_section(&self, doc: &Document, index: usize, section: &Section) -> Result<Completion> {
        let template = section_template(section.kind);
        let room = self
            .assembler
            .room_for_single(template, &section.heading, &section.heading);
        let text = clip_chars(&section.text(), room);
        let offset = doc.section_offsets().get(index).copied().unwrap_or(0);
        let evidence = [Evidence::section(&section.heading, text, offset)];
        self.complete(template, &section.heading, &evidence).await
    }

    async fn custom(&self, doc: &Document, keywords: &[String], template: Option<&str>) -> Result<SummaryRecord> {
        let keywords: Vec<String> = keywords
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        let template = match template {
            Some(id) => {
                let id: TemplateId = id.parse()?;
                if !id.is_structured() {
                    return Err(Error::invalid(format!(
                        "Template '{}' cannot be used for custom summaries",
                        id
                    )));
                }
                id
            }
            None if !keywords.is_empty() => TemplateId::KeywordSummary,
            None => TemplateId::ProblemMethodConclusion,
        };

        let (query, evidence) = if keywords.is_empty() {
            (doc.title.clone(), self.section_excerpts(doc))
        } else {
            let hits = self
                .retriever
                .search_keywords(doc.id, &keywords, self.top_k)
                .await?;
            let evidence = hits
                .iter()
                .map(|h| Evidence::from_chunk(&h.chunk, h.score))
                .collect();
            (keywords.join(", "), evidence)
        };

        let completion = self.complete(template, &query, &evidence).await?;
        Ok(with_text(record(doc, SummaryKind::Custom, template, keywords), completion))
    }

    async fn complete(&self, template: TemplateId, query: &str, evidence: &[Evidence]) -> Result<Completion> {
        let assembled = self.assembler.assemble(template, query, evidence, &[])?;
        tracing::debug!(
            "{} prompt: {} chars, {}/{} evidence blocks",
            template,
            assembled.char_len(),
            assembled.evidence_used.len(),
            evidence.len()
        );
        self.llm.complete(&assembled.prompt).await
    }

    /// Each non-reference section clipped to the excerpt length, in document order
    fn section_excerpts(&self, doc: &Document) -> Vec<Evidence> {
        doc.sections
            .iter()
            .zip(doc.section_offsets())
            .filter(|(s, _)| !s.is_empty() && !matches!(s.kind, SectionKind::References | SectionKind::Acknowledgements))
            .map(|(s, offset)| Evidence::section(&s.heading, clip_chars(&s.text(), self.excerpt_chars), offset))
            .collect()
    }
}

/// Keyword suggestions: declared keywords first, then frequent content words
pub fn suggest_keywords(doc: &Document) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for keyword in &doc.metadata.keywords {
        if seen.insert(keyword.to_lowercase()) {
            out.push(keyword.clone());
        }
    }

    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut first_seen: HashMap<String, usize> = HashMap::new();
    let sources = doc
        .metadata
        .abstract_text
        .iter()
        .map(String::as_str)
        .chain(doc.sections.iter().map(|s| s.heading.as_str()))
        .chain(
            doc.sections
                .iter()
                .filter(|s| s.kind != SectionKind::References)
                .flat_map(|s| s.paragraphs.iter().map(String::as_str)),
        );
    for text in sources {
        for word in text.unicode_words() {
            let word = word.to_lowercase();
            if word.chars().count() < 4
                || word.chars().any(|c| c.is_ascii_digit())
                || STOPWORDS.contains(&word.as_str())
            {
                continue;
            }
            let order = first_seen.len();
            first_seen.entry(word.clone()).or_insert(order);
            *counts.entry(word).or_default() += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().filter(|(_, n)| *n >= 2).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(first_seen[&a.0].cmp(&first_seen[&b.0])));
    for (word, _) in ranked {
        if out.len() >= MAX_KEYWORD_SUGGESTIONS {
            break;
        }
        if seen.insert(word.clone()) {
            out.push(word);
        }
    }
    out
}

fn resolve_section<'a>(doc: &'a Document, selector: &SectionSelector) -> Result<(usize, &'a Section)> {
    match selector {
        SectionSelector::Index(i) => doc
            .sections
            .get(*i)
            .map(|s| (*i, s))
            .ok_or_else(|| Error::not_found(Missing::Section, i)),
        SectionSelector::Heading(h) => doc
            .find_section(h)
            .ok_or_else(|| Error::not_found(Missing::Section, h)),
    }
}

fn section_template(kind: SectionKind) -> TemplateId {
    match kind {
        SectionKind::Method => TemplateId::MethodSection,
        SectionKind::Result => TemplateId::ResultSection,
        _ => TemplateId::SectionSummary,
    }
}

/// First `max` chars, cut back to a whitespace boundary when one is near
fn clip_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let head: String = text.chars().take(max).collect();
    match head.rfind(char::is_whitespace) {
        Some(pos) if head[..pos].chars().count() * 5 >= max * 4 => head[..pos].to_string(),
        _ => head,
    }
}

fn add_usage(total: &mut Option<TokenUsage>, usage: Option<TokenUsage>) {
    if let Some(u) = usage {
        let t = total.get_or_insert_with(TokenUsage::default);
        t.prompt_tokens += u.prompt_tokens;
        t.completion_tokens += u.completion_tokens;
        t.total_tokens += u.total_tokens;
    }
}

fn record(doc: &Document, kind: SummaryKind, template: TemplateId, keywords: Vec<String>) -> SummaryRecord {
    SummaryRecord {
        id: Uuid::new_v4(),
        document_id: doc.id,
        kind,
        template: template.to_string(),
        keywords,
        text: None,
        sections: Vec::new(),
        usage: None,
        created_at: Utc::now(),
        processing_ms: 0,
    }
}

fn with_text(mut rec: SummaryRecord, completion: Completion) -> SummaryRecord {
    rec.text = Some(completion.text);
    add_usage(&mut rec.usage, completion.usage);
    rec
}
