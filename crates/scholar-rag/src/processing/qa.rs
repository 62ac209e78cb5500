//! Question answering and multi-turn conversations

use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::config::PromptConfig;
use crate::error::{Error, Result};
use crate::generation::{Evidence, PromptAssembler, TemplateId};
use crate::providers::LlmProvider;
use crate::retrieval::Retriever;
use crate::storage::{ConversationStore, DocumentStore};
use crate::types::{
    AnswerResponse, AskRequest, Conversation, ConversationStatus, Document,
    QuestionType, SectionKind, SourceRef, StartConversationRequest, Turn,
};

const ANALYTICAL_KEYWORDS: &[&str] = &[
    "分析", "评价", "比较", "影响", "意义", "局限性", "analyze", "analyse", "evaluate", "compare",
    "impact", "limitation",
];
const LOGICAL_KEYWORDS: &[&str] = &["为什么", "如何", "怎么", "why", "how"];

/// Upper bound on chunks a caller may request
const MAX_TOP_K: usize = 20;
const MAX_SUGGESTIONS: usize = 8;

/// Grounded answers over a single document
pub struct QaService {
    documents: Arc<DocumentStore>,
    conversations: Arc<ConversationStore>,
    retriever: Arc<Retriever>,
    assembler: PromptAssembler,
    llm: Arc<dyn LlmProvider>,
    top_k: usize,
}

impl QaService {
    pub fn new(
        documents: Arc<DocumentStore>,
        conversations: Arc<ConversationStore>,
        retriever: Arc<Retriever>,
        llm: Arc<dyn LlmProvider>,
        config: &PromptConfig,
    ) -> Self {
        Self {
            documents,
            conversations,
            retriever,
            assembler: PromptAssembler::new(config),
            llm,
            top_k: config.top_k,
        }
    }

    /// Answer a question, inside a conversation when one is given
    pub async fn ask(&self, request: &AskRequest) -> Result<AnswerResponse> {
        match request.conversation_id {
            Some(conversation_id) => {
                let conversation = self.conversations.get(conversation_id).await?;
                if conversation.document_id != request.document_id {
                    return Err(Error::invalid(format!(
                        "Conversation {} belongs to document {}, not {}",
                        conversation_id, conversation.document_id, request.document_id
                    )));
                }
                self.answer_in(conversation, &request.question, request.top_k).await
            }
            None => {
                let doc = self.answerable(request.document_id)?;
                let (response, _) = self
                    .answer(&doc, &request.question, &[], request.top_k)
                    .await?;
                Ok(response)
            }
        }
    }

    /// Open a conversation, answering its first question when present
    pub async fn start_conversation(
        &self,
        request: &StartConversationRequest,
    ) -> Result<(Conversation, Option<AnswerResponse>)> {
        let doc = self.answerable(request.document_id)?;
        let question = request
            .question
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty());

        // answer before persisting so a failed first question leaves nothing behind
        let first = match question {
            Some(q) => Some(self.answer(&doc, q, &[], None).await?),
            None => None,
        };

        let mut conversation = Conversation::new(doc.id, &doc.title);
        let response = first.map(|(mut response, turn)| {
            conversation.append(turn);
            response.conversation_id = Some(conversation.id);
            response
        });
        self.conversations.create(&conversation).await?;
        tracing::info!("Started conversation {} on '{}'", conversation.id, doc.title);
        Ok((conversation, response))
    }

    /// Ask the next question of an existing conversation
    pub async fn continue_conversation(
        &self,
        conversation_id: Uuid,
        question: &str,
        top_k: Option<usize>,
    ) -> Result<AnswerResponse> {
        let conversation = self.conversations.get(conversation_id).await?;
        self.answer_in(conversation, question, top_k).await
    }

    async fn answer_in(
        &self,
        conversation: Conversation,
        question: &str,
        top_k: Option<usize>,
    ) -> Result<AnswerResponse> {
        if conversation.status == ConversationStatus::Archived {
            return Err(Error::invalid(format!("Conversation {} is archived", conversation.id)));
        }
        let doc = self.answerable(conversation.document_id)?;
        let (mut response, turn) = self
            .answer(&doc, question, conversation.turns(), top_k)
            .await?;
        self.conversations.append_turn(conversation.id, turn).await?;
        response.conversation_id = Some(conversation.id);
        Ok(response)
    }

    /// Retrieval decides answerability: a document without an index yields `NotFound`
    fn answerable(&self, document_id: Uuid) -> Result<Document> {
        self.documents.get(document_id)
    }

    async fn answer(
        &self,
        doc: &Document,
        question: &str,
        history: &[Turn],
        top_k: Option<usize>,
    ) -> Result<(AnswerResponse, Turn)> {
        let start = Instant::now();
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::invalid("Question must not be empty"));
        }

        let k = top_k.unwrap_or(self.top_k).clamp(1, MAX_TOP_K);
        let hits = self.retriever.search(doc.id, question, k).await?;
        let evidence: Vec<Evidence> = hits
            .iter()
            .map(|h| Evidence::from_chunk(&h.chunk, h.score))
            .collect();

        let assembled = self
            .assembler
            .assemble(TemplateId::QuestionAnswer, question, &evidence, history)?;
        tracing::debug!(
            "QA prompt for {}: {} chars, {} evidence, {} history turns",
            doc.id,
            assembled.char_len(),
            assembled.evidence_used.len(),
            assembled.history_turns
        );
        let completion = self.llm.complete(&assembled.prompt).await?;

        // only evidence the model actually saw counts as a source
        let used: Vec<_> = assembled.evidence_used.iter().map(|&i| &hits[i]).collect();
        let question_type = classify_question(question);
        let confidence = used
            .first()
            .map(|h| h.score)
            .filter(|s| s.is_finite())
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);
        let processing_ms = start.elapsed().as_millis() as u64;

        let turn = Turn {
            question: question.to_string(),
            answer: completion.text.clone(),
            retrieved_chunk_ids: used.iter().map(|h| h.chunk.id).collect(),
            scores: used.iter().map(|h| h.score).collect(),
            question_type: Some(question_type),
            asked_at: Utc::now(),
            usage: completion.usage,
            processing_ms,
        };
        let response = AnswerResponse {
            document_id: doc.id,
            conversation_id: None,
            question: question.to_string(),
            answer: completion.text,
            question_type,
            confidence,
            sources: used.iter().map(|h| SourceRef::new(&h.chunk, h.score)).collect(),
            follow_up_questions: follow_up_questions(question_type),
            usage: completion.usage,
            attempts: completion.attempts,
            processing_ms,
        };
        tracing::info!(
            "Answered {:?} question on '{}' with {} sources in {}ms",
            question_type,
            doc.title,
            response.sources.len(),
            processing_ms
        );
        Ok((response, turn))
    }
}

/// Analytical cues win over logical ones; everything else is factual
pub fn classify_question(question: &str) -> QuestionType {
    let lower = question.to_lowercase();
    if ANALYTICAL_KEYWORDS.iter().any(|k| lower.contains(k)) {
        QuestionType::Analytical
    } else if LOGICAL_KEYWORDS.iter().any(|k| lower.contains(k)) {
        QuestionType::Logical
    } else {
        QuestionType::Factual
    }
}

pub fn follow_up_questions(question_type: QuestionType) -> Vec<String> {
    let questions: [&str; 3] = match question_type {
        QuestionType::Factual => [
            "Can you explain this result in more detail?",
            "What is the significance of this finding?",
            "Are there other related data in the paper?",
        ],
        QuestionType::Logical => [
            "What are the strengths and weaknesses of this method?",
            "Why did the authors choose this method?",
            "Are there alternative approaches?",
        ],
        QuestionType::Analytical => [
            "What are the limitations of this study?",
            "What future research does the paper suggest?",
            "How could the method be improved?",
        ],
    };
    questions.iter().map(|q| q.to_string()).collect()
}

/// Questions worth asking about `doc`, drawn from its metadata and the
/// sections it has, optionally limited to one question type
pub fn question_suggestions(doc: &Document, question_type: Option<QuestionType>) -> Vec<String> {
    use QuestionType::*;

    let mut candidates: Vec<(QuestionType, String)> = Vec::new();
    if !doc.title.trim().is_empty() {
        candidates.push((Factual, "What is the main research question of this paper?".to_string()));
        candidates.push((Factual, format!("What are the key claims of \"{}\"?", doc.title.trim())));
    }
    if !doc.metadata.authors.is_empty() {
        candidates.push((Factual, "Who are the authors of this paper?".to_string()));
    }

    let has = |kind: SectionKind| doc.sections.iter().any(|s| s.kind == kind);
    if has(SectionKind::Method) {
        candidates.push((Factual, "What research methods does the paper use?".to_string()));
        candidates.push((Logical, "How was the experiment designed?".to_string()));
    }
    if has(SectionKind::Result) {
        candidates.push((Factual, "What are the main results?".to_string()));
        candidates.push((Analytical, "What is the significance of the results?".to_string()));
    }
    if has(SectionKind::Discussion) {
        candidates.push((Logical, "How do the authors interpret their results?".to_string()));
        candidates.push((Analytical, "What are the limitations of this study?".to_string()));
    }
    if has(SectionKind::Conclusion) {
        candidates.push((Factual, "What is the main conclusion?".to_string()));
        candidates.push((Analytical, "What future research do the authors suggest?".to_string()));
    }

    // generic follow-ups fill whatever the document itself does not suggest
    let types = match question_type {
        Some(t) => vec![t],
        None => vec![Factual, Logical, Analytical],
    };
    for t in &types {
        candidates.extend(follow_up_questions(*t).into_iter().map(|q| (*t, q)));
    }

    let mut suggestions: Vec<String> = Vec::new();
    for (t, question) in candidates {
        if types.contains(&t) && !suggestions.contains(&question) {
            suggestions.push(question);
        }
    }
    suggestions.truncate(MAX_SUGGESTIONS);
    suggestions
}
