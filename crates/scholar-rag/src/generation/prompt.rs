//! Prompt assembly under a character budget
//!
//! The budget covers the system instruction plus the user message. History
//! gets its own cap and is filled newest-first; evidence is added in score
//! order until the next block would not fit, so the evidence that makes it
//! in is always a prefix of the ranking. Blocks are never cut.

use crate::config::PromptConfig;
use crate::error::{Error, Result};
use crate::generation::templates::TemplateId;
use crate::providers::llm::Prompt;
use crate::retrieval::search::rank_order;
use crate::types::{Chunk, Turn};

const NO_EVIDENCE: &str = "(no evidence available)";
const HISTORY_HEADER: &str = "Previous conversation:\n";
const BLOCK_SEPARATOR: &str = "\n\n";

/// One piece of evidence offered to the assembler
#[derive(Debug, Clone, PartialEq)]
pub struct Evidence {
    /// Shown next to the block number, e.g. the section heading
    pub label: String,
    pub text: String,
    pub score: f32,
    /// Document-level char offset, used to break score ties
    pub offset: usize,
}

impl Evidence {
    pub fn from_chunk(chunk: &Chunk, score: f32) -> Self {
        Self {
            label: chunk.section_heading.clone(),
            text: chunk.text.clone(),
            score,
            offset: chunk.char_offset,
        }
    }

    /// Whole-section evidence; equal scores keep document order
    pub fn section(heading: &str, text: String, offset: usize) -> Self {
        Self {
            label: heading.to_string(),
            text,
            score: 1.0,
            offset,
        }
    }

    fn render(&self, number: usize) -> String {
        if self.label.is_empty() {
            format!("[{}]\n{}", number, self.text.trim())
        } else {
            format!("[{}] {}\n{}", number, self.label, self.text.trim())
        }
    }
}

/// A prompt that fits the budget, plus what went into it
#[derive(Debug, Clone)]
pub struct AssembledPrompt {
    pub prompt: Prompt,
    /// Indices into the offered evidence, in the order they were included
    pub evidence_used: Vec<usize>,
    /// Number of prior turns kept
    pub history_turns: usize,
}

impl AssembledPrompt {
    pub fn char_len(&self) -> usize {
        self.prompt.char_len()
    }
}

/// Builds prompts from a template, evidence and history
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    max_chars: usize,
    history_max_chars: usize,
}

impl PromptAssembler {
    pub fn new(config: &PromptConfig) -> Self {
        Self {
            max_chars: config.max_chars,
            history_max_chars: config.history_max_chars,
        }
    }

    pub fn budget(&self) -> usize {
        self.max_chars
    }

    /// Largest evidence text that fits as a single labeled block
    pub fn room_for_single(&self, template: TemplateId, query: &str, label: &str) -> usize {
        let base = template.system().chars().count() + fill(template.skeleton(), query, "", "").chars().count();
        let overhead = Evidence::section(label, String::new(), 0).render(1).chars().count();
        self.max_chars.saturating_sub(base + overhead)
    }

    /// Assemble a prompt, or fail with `BudgetExceeded`
    pub fn assemble(
        &self,
        template: TemplateId,
        query: &str,
        evidence: &[Evidence],
        history: &[Turn],
    ) -> Result<AssembledPrompt> {
        let system = template.system();
        let skeleton = template.skeleton();
        let system_len = system.chars().count();

        let empty_evidence = if evidence.is_empty() { NO_EVIDENCE } else { "" };
        let base_len = system_len + fill(skeleton, query, empty_evidence, "").chars().count();
        if base_len > self.max_chars {
            return Err(Error::BudgetExceeded {
                budget: self.max_chars,
                required: base_len,
            });
        }

        let history_cap = self.history_max_chars.min(self.max_chars - base_len);
        let (history_text, history_turns) = if skeleton.contains("{history}") {
            render_history(history, history_cap)
        } else {
            (String::new(), 0)
        };
        let history_len = history_text.chars().count();

        let mut remaining = self.max_chars - base_len - history_len;
        let mut order: Vec<usize> = (0..evidence.len()).collect();
        order.sort_by(|&a, &b| {
            rank_order(
                (evidence[a].score, evidence[a].offset),
                (evidence[b].score, evidence[b].offset),
            )
        });

        let mut evidence_used = Vec::new();
        let mut blocks = Vec::new();
        for &index in &order {
            let block = evidence[index].render(blocks.len() + 1);
            let cost = block.chars().count() + if blocks.is_empty() { 0 } else { BLOCK_SEPARATOR.len() };
            if cost > remaining {
                break;
            }
            remaining -= cost;
            blocks.push(block);
            evidence_used.push(index);
        }

        if !evidence.is_empty() && blocks.is_empty() {
            let first = evidence[order[0]].render(1).chars().count();
            return Err(Error::BudgetExceeded {
                budget: self.max_chars,
                required: base_len + history_len + first,
            });
        }

        if evidence_used.len() < evidence.len() {
            tracing::debug!(
                "Prompt budget kept {}/{} evidence blocks",
                evidence_used.len(),
                evidence.len()
            );
        }

        let evidence_text = if blocks.is_empty() {
            NO_EVIDENCE.to_string()
        } else {
            blocks.join(BLOCK_SEPARATOR)
        };
        let user = fill(skeleton, query, &evidence_text, &history_text);
        let prompt = Prompt::new(system, user);
        debug_assert!(prompt.char_len() <= self.max_chars);

        Ok(AssembledPrompt {
            prompt,
            evidence_used,
            history_turns,
        })
    }
}

/// Newest turns first until the cap; rendered oldest-first
fn render_history(history: &[Turn], cap: usize) -> (String, usize) {
    if history.is_empty() {
        return (String::new(), 0);
    }

    let header_len = HISTORY_HEADER.chars().count();
    let mut used = header_len;
    let mut kept = Vec::new();
    for turn in history.iter().rev() {
        let block = format!("Q: {}\nA: {}\n\n", turn.question.trim(), turn.answer.trim());
        let len = block.chars().count();
        if used + len > cap {
            break;
        }
        used += len;
        kept.push(block);
    }

    if kept.is_empty() {
        return (String::new(), 0);
    }
    kept.reverse();
    let count = kept.len();
    (format!("{}{}", HISTORY_HEADER, kept.concat()), count)
}

/// Single-pass placeholder substitution, so values containing braces are
/// never expanded again
fn fill(skeleton: &str, query: &str, evidence: &str, history: &str) -> String {
    let mut out = String::with_capacity(skeleton.len() + query.len() + evidence.len() + history.len());
    let mut rest = skeleton;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let (value, len) = if tail.starts_with("{query}") {
            (Some(query), "{query}".len())
        } else if tail.starts_with("{evidence}") {
            (Some(evidence), "{evidence}".len())
        } else if tail.starts_with("{history}") {
            (Some(history), "{history}".len())
        } else {
            (None, 1)
        };
        match value {
            Some(v) => out.push_str(v),
            None => out.push('{'),
        }
        rest = &tail[len..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn assembler(max_chars: usize, history_max_chars: usize) -> PromptAssembler {
        PromptAssembler::new(&PromptConfig {
            max_chars,
            history_max_chars,
            ..PromptConfig::default()
        })
    }

    fn ev(label: &str, len: usize, score: f32, offset: usize) -> Evidence {
        Evidence {
            label: label.to_string(),
            text: "x".repeat(len),
            score,
            offset,
        }
    }

    fn turn(q: &str, a: &str) -> Turn {
        Turn {
            question: q.to_string(),
            answer: a.to_string(),
            retrieved_chunk_ids: Vec::new(),
            scores: Vec::new(),
            question_type: None,
            asked_at: Utc::now(),
            usage: None,
            processing_ms: 0,
        }
    }

    fn base_len(template: TemplateId, query: &str) -> usize {
        template.system().chars().count() + fill(template.skeleton(), query, "", "").chars().count()
    }

    #[test]
    fn test_fill_is_single_pass() {
        let out = fill("Q={query} E={evidence}", "{evidence}", "body", "");
        assert_eq!(out, "Q={evidence} E=body");
    }

    #[test]
    fn test_never_exceeds_budget_and_keeps_prefix() {
        let t = TemplateId::QuestionAnswer;
        let budget = base_len(t, "q") + 700;
        let evidence = vec![
            ev("low", 300, 0.2, 0),
            ev("top", 300, 0.9, 500),
            ev("mid", 300, 0.5, 100),
        ];
        let assembled = assembler(budget, 100).assemble(t, "q", &evidence, &[]).unwrap();
        assert!(assembled.char_len() <= budget);
        // top then mid fit; low does not
        assert_eq!(assembled.evidence_used, vec![1, 2]);
        assert!(assembled.prompt.user.find("[1] top").unwrap() < assembled.prompt.user.find("[2] mid").unwrap());
    }

    #[test]
    fn test_stops_at_first_block_that_does_not_fit() {
        let t = TemplateId::QuestionAnswer;
        let budget = base_len(t, "q") + 400;
        let evidence = vec![ev("a", 100, 0.9, 0), ev("b", 500, 0.8, 10), ev("c", 10, 0.7, 20)];
        let assembled = assembler(budget, 100).assemble(t, "q", &evidence, &[]).unwrap();
        // "c" would fit on its own but must not skip past "b"
        assert_eq!(assembled.evidence_used, vec![0]);
    }

    #[test]
    fn test_room_for_single_fits_exactly() {
        let t = TemplateId::SectionSummary;
        let a = assembler(2_000, 100);
        let room = a.room_for_single(t, "Methods", "Methods");
        let fits = Evidence::section("Methods", "m".repeat(room), 0);
        assert!(a.assemble(t, "Methods", &[fits], &[]).is_ok());
        let too_big = Evidence::section("Methods", "m".repeat(room + 1), 0);
        assert!(a.assemble(t, "Methods", &[too_big], &[]).is_err());
    }

    #[test]
    fn test_ties_break_by_offset() {
        let t = TemplateId::QuestionAnswer;
        let evidence = vec![ev("later", 10, 0.5, 900), ev("earlier", 10, 0.5, 10)];
        let assembled = assembler(12_000, 1_000).assemble(t, "q", &evidence, &[]).unwrap();
        assert_eq!(assembled.evidence_used, vec![1, 0]);
    }

    #[test]
    fn test_no_evidence_fits_is_budget_exceeded() {
        let t = TemplateId::QuestionAnswer;
        let budget = base_len(t, "q") + 50;
        let err = assembler(budget, 10)
            .assemble(t, "q", &[ev("big", 500, 1.0, 0)], &[])
            .unwrap_err();
        assert!(matches!(err, Error::BudgetExceeded { budget: b, required } if b == budget && required > budget));
    }

    #[test]
    fn test_skeleton_over_budget() {
        let err = assembler(10, 5)
            .assemble(TemplateId::FullSummary, "title", &[], &[])
            .unwrap_err();
        assert!(matches!(err, Error::BudgetExceeded { .. }));
    }

    #[test]
    fn test_empty_evidence_placeholder() {
        let assembled = assembler(12_000, 1_000)
            .assemble(TemplateId::QuestionAnswer, "anything?", &[], &[])
            .unwrap();
        assert!(assembled.prompt.user.contains(NO_EVIDENCE));
        assert!(assembled.evidence_used.is_empty());
    }

    #[test]
    fn test_history_drops_oldest_first() {
        let history = vec![
            turn("oldest question", &"a".repeat(100)),
            turn("middle question", &"b".repeat(100)),
            turn("newest question", &"c".repeat(100)),
        ];
        // room for the header and two turns only
        let cap = HISTORY_HEADER.len() + 2 * (4 + 15 + 4 + 100 + 2) + 5;
        let assembled = assembler(12_000, cap)
            .assemble(TemplateId::QuestionAnswer, "next?", &[ev("s", 10, 1.0, 0)], &history)
            .unwrap();
        let user = &assembled.prompt.user;
        assert_eq!(assembled.history_turns, 2);
        assert!(!user.contains("oldest question"));
        assert!(user.find("middle question").unwrap() < user.find("newest question").unwrap());
    }

    #[test]
    fn test_history_ignored_by_summary_templates() {
        let assembled = assembler(12_000, 1_000)
            .assemble(
                TemplateId::SectionSummary,
                "Intro",
                &[ev("Intro", 50, 1.0, 0)],
                &[turn("q", "a")],
            )
            .unwrap();
        assert_eq!(assembled.history_turns, 0);
        assert!(!assembled.prompt.user.contains("Previous conversation"));
    }
}
