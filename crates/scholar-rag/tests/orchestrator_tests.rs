//! Summaries, questions and conversations over a parsed paper

mod common;

use common::{ingest_paper, test_state, MockLlm, PAPER};
use scholar_rag::error::{Error, Missing};
use scholar_rag::types::{
    AskRequest, ConversationStatus, QuestionType, SectionSelector, StartConversationRequest,
    SummaryKind, SummaryRequest,
};
use uuid::Uuid;

fn ask(document_id: Uuid, question: &str) -> AskRequest {
    AskRequest {
        document_id,
        question: question.to_string(),
        conversation_id: None,
        top_k: None,
    }
}

fn summary(document_id: Uuid, kind: SummaryKind) -> SummaryRequest {
    SummaryRequest {
        document_id,
        kind,
        section: None,
        keywords: Vec::new(),
        template: None,
    }
}

#[tokio::test]
async fn question_without_index_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), MockLlm::new()).await;
    let intake = state.worker().accept("paper.txt", PAPER.as_bytes(), None).await.unwrap();

    let err = state
        .qa()
        .ask(&ask(intake.document().id, "What is proposed?"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { what: Missing::Index, .. }));

    let err = state.qa().ask(&ask(Uuid::new_v4(), "Anything?")).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { what: Missing::Document, .. }));
}

#[tokio::test]
async fn answer_cites_retrieved_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let llm = MockLlm::new();
    let state = test_state(dir.path(), llm.clone()).await;
    let doc = ingest_paper(&state).await;

    let answer = state
        .qa()
        .ask(&ask(doc.id, "How are atoms and bonds encoded?"))
        .await
        .unwrap();
    assert_eq!(answer.question_type, QuestionType::Logical);
    assert!(!answer.sources.is_empty());
    assert!(answer.sources.len() <= state.config().prompt.top_k);
    assert!((0.0..=1.0).contains(&answer.confidence));
    assert_eq!(answer.follow_up_questions.len(), 3);
    assert!(answer.conversation_id.is_none());

    let prompts = llm.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].char_len() <= state.config().prompt.max_chars);
    assert!(prompts[0].user.contains("How are atoms and bonds encoded?"));

    let err = state.qa().ask(&ask(doc.id, "   ")).await.unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));
}

#[tokio::test]
async fn conversation_keeps_history() {
    let dir = tempfile::tempdir().unwrap();
    let llm = MockLlm::new();
    let state = test_state(dir.path(), llm.clone()).await;
    let doc = ingest_paper(&state).await;

    llm.push_reply(Ok("It uses message passing over atoms and bonds.".to_string()));
    let (conversation, first) = state
        .qa()
        .start_conversation(&StartConversationRequest {
            document_id: doc.id,
            question: Some("What does the paper propose?".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(conversation.turns().len(), 1);
    assert_eq!(conversation.title, "What does the paper propose?");
    assert_eq!(first.unwrap().conversation_id, Some(conversation.id));

    let second = state
        .qa()
        .continue_conversation(conversation.id, "What are its limitations?", None)
        .await
        .unwrap();
    assert_eq!(second.question_type, QuestionType::Analytical);

    // the second prompt carries the first exchange
    let prompts = llm.prompts();
    let last = &prompts[prompts.len() - 1].user;
    assert!(last.contains("What does the paper propose?"));
    assert!(last.contains("It uses message passing over atoms and bonds."));

    let stored = state.conversations().get(conversation.id).await.unwrap();
    let questions: Vec<&str> = stored.turns().iter().map(|t| t.question.as_str()).collect();
    assert_eq!(questions, vec!["What does the paper propose?", "What are its limitations?"]);
    assert!(stored.to_markdown().contains("## Q2: What are its limitations?"));

    state.conversations().archive(conversation.id).await.unwrap();
    let err = state
        .qa()
        .continue_conversation(conversation.id, "One more?", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));
    let archived = state
        .conversations()
        .list(Some(doc.id), Some(ConversationStatus::Archived))
        .await
        .unwrap();
    assert_eq!(archived.len(), 1);
}

#[tokio::test]
async fn conversation_must_match_document() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), MockLlm::new()).await;
    let doc = ingest_paper(&state).await;
    let (conversation, _) = state
        .qa()
        .start_conversation(&StartConversationRequest {
            document_id: doc.id,
            question: None,
        })
        .await
        .unwrap();

    let mut request = ask(Uuid::new_v4(), "What is proposed?");
    request.conversation_id = Some(conversation.id);
    let err = state.qa().ask(&request).await.unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));
}

#[tokio::test]
async fn failed_first_question_creates_no_conversation() {
    let dir = tempfile::tempdir().unwrap();
    let llm = MockLlm::new();
    let state = test_state(dir.path(), llm.clone()).await;
    let doc = ingest_paper(&state).await;

    llm.push_reply(Err(Error::fatal("insufficient_quota")));
    let err = state
        .qa()
        .start_conversation(&StartConversationRequest {
            document_id: doc.id,
            question: Some("What is proposed?".to_string()),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::GatewayFatal(_)));
    assert!(state.conversations().list(Some(doc.id), None).await.unwrap().is_empty());
}

#[tokio::test]
async fn full_and_section_summaries_are_logged() {
    let dir = tempfile::tempdir().unwrap();
    let llm = MockLlm::new();
    let state = test_state(dir.path(), llm.clone()).await;
    let doc = ingest_paper(&state).await;

    let full = state
        .summarizer()
        .summarize(&summary(doc.id, SummaryKind::Full))
        .await
        .unwrap();
    assert_eq!(full.template, "full_summary");
    assert!(full.text.is_some());
    assert_eq!(full.usage.unwrap().total_tokens, 120);

    let mut request = summary(doc.id, SummaryKind::Section);
    request.section = Some(SectionSelector::Heading("methods".to_string()));
    let method = state.summarizer().summarize(&request).await.unwrap();
    assert_eq!(method.template, "method_section");
    assert_eq!(method.sections.len(), 1);
    let prompts = llm.prompts();
    assert!(prompts[prompts.len() - 1].user.contains("Message passing runs for six rounds"));

    let all_sections = state
        .summarizer()
        .summarize(&summary(doc.id, SummaryKind::Section))
        .await
        .unwrap();
    assert!(all_sections.sections.len() >= 4);
    assert!(all_sections.sections.iter().all(|s| s.summary.is_some()));

    let log = state.documents().summaries(doc.id).await.unwrap();
    assert_eq!(log.len(), 3);
    assert_eq!(log[0].id, full.id);

    request.section = Some(SectionSelector::Heading("Appendix Z".to_string()));
    let err = state.summarizer().summarize(&request).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { what: Missing::Section, .. }));
}

#[tokio::test]
async fn custom_summaries_check_templates() {
    let dir = tempfile::tempdir().unwrap();
    let llm = MockLlm::new();
    let state = test_state(dir.path(), llm.clone()).await;
    let doc = ingest_paper(&state).await;

    let mut request = summary(doc.id, SummaryKind::Custom);
    request.keywords = vec!["message passing".to_string()];
    let focused = state.summarizer().summarize(&request).await.unwrap();
    assert_eq!(focused.template, "keyword_summary");
    assert_eq!(focused.keywords, vec!["message passing".to_string()]);

    request.keywords.clear();
    request.template = Some("limitation-future".to_string());
    let structured = state.summarizer().summarize(&request).await.unwrap();
    assert_eq!(structured.template, "limitation_future");

    request.template = Some("question_answer".to_string());
    let err = state.summarizer().summarize(&request).await.unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));

    request.template = Some("haiku".to_string());
    let err = state.summarizer().summarize(&request).await.unwrap_err();
    assert!(matches!(err, Error::UnknownTemplate(_)));
}

#[tokio::test]
async fn summaries_need_a_parsed_document() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), MockLlm::new()).await;
    let intake = state.worker().accept("paper.txt", PAPER.as_bytes(), None).await.unwrap();

    let err = state
        .summarizer()
        .summarize(&summary(intake.document().id, SummaryKind::Full))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));
}
