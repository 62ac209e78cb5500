//! Fixed table of prompt templates
//!
//! Every template has a system instruction and a user skeleton with
//! `{query}`, `{evidence}` and `{history}` placeholders. Ids outside the
//! table are rejected with [`Error::UnknownTemplate`].

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Registered templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateId {
    FullSummary,
    SectionSummary,
    MethodSection,
    ResultSection,
    KeywordSummary,
    ProblemMethodConclusion,
    BackgroundMethodResult,
    ObjectiveMethodFinding,
    LimitationFuture,
    ContributionImpact,
    QuestionAnswer,
}

const SUMMARY_SYSTEM: &str = "You are an expert research assistant who writes accurate, concise \
summaries of academic papers. Use only the paper excerpts provided. Do not invent results, numbers \
or citations. If the excerpts do not cover something, say so.";

const QA_SYSTEM: &str = "You are a research assistant answering questions about one academic paper. \
Answer ONLY from the numbered evidence excerpts. Cite the excerpts you rely on as [1], [2], ... \
If the evidence does not contain the answer, reply that the paper does not say.";

impl TemplateId {
    /// All templates, in listing order
    pub fn all() -> &'static [TemplateId] {
        &[
            TemplateId::FullSummary,
            TemplateId::SectionSummary,
            TemplateId::MethodSection,
            TemplateId::ResultSection,
            TemplateId::KeywordSummary,
            TemplateId::ProblemMethodConclusion,
            TemplateId::BackgroundMethodResult,
            TemplateId::ObjectiveMethodFinding,
            TemplateId::LimitationFuture,
            TemplateId::ContributionImpact,
            TemplateId::QuestionAnswer,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateId::FullSummary => "full_summary",
            TemplateId::SectionSummary => "section_summary",
            TemplateId::MethodSection => "method_section",
            TemplateId::ResultSection => "result_section",
            TemplateId::KeywordSummary => "keyword_summary",
            TemplateId::ProblemMethodConclusion => "problem_method_conclusion",
            TemplateId::BackgroundMethodResult => "background_method_result",
            TemplateId::ObjectiveMethodFinding => "objective_method_finding",
            TemplateId::LimitationFuture => "limitation_future",
            TemplateId::ContributionImpact => "contribution_impact",
            TemplateId::QuestionAnswer => "question_answer",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            TemplateId::FullSummary => "Whole-paper summary from section excerpts",
            TemplateId::SectionSummary => "Summary of a single section",
            TemplateId::MethodSection => "Method section: approach, data, setup",
            TemplateId::ResultSection => "Results section: findings and numbers",
            TemplateId::KeywordSummary => "Summary focused on given keywords",
            TemplateId::ProblemMethodConclusion => "Problem / Method / Conclusion",
            TemplateId::BackgroundMethodResult => "Background / Method / Result",
            TemplateId::ObjectiveMethodFinding => "Objective / Method / Finding",
            TemplateId::LimitationFuture => "Limitations / Future work",
            TemplateId::ContributionImpact => "Contributions / Impact",
            TemplateId::QuestionAnswer => "Grounded answer to a question",
        }
    }

    /// Templates usable for custom summaries
    pub fn is_structured(&self) -> bool {
        matches!(
            self,
            TemplateId::ProblemMethodConclusion
                | TemplateId::BackgroundMethodResult
                | TemplateId::ObjectiveMethodFinding
                | TemplateId::LimitationFuture
                | TemplateId::ContributionImpact
                | TemplateId::KeywordSummary
        )
    }

    pub fn system(&self) -> &'static str {
        match self {
            TemplateId::QuestionAnswer => QA_SYSTEM,
            _ => SUMMARY_SYSTEM,
        }
    }

    /// User message skeleton
    pub fn skeleton(&self) -> &'static str {
        match self {
            TemplateId::FullSummary => {
                "Summarize the paper \"{query}\" from the section excerpts below.\n\
                 Cover: research problem, approach, key results, and conclusions. \
                 Write 200-400 words.\n\n\
                 Excerpts:\n{evidence}"
            }
            TemplateId::SectionSummary => {
                "Summarize the section \"{query}\" in 80-150 words. Keep its key claims and any \
                 numbers exactly as stated.\n\n\
                 Section text:\n{evidence}"
            }
            TemplateId::MethodSection => {
                "Summarize the method section \"{query}\". Describe the approach, the data or \
                 materials, the experimental setup, and what is novel about it.\n\n\
                 Section text:\n{evidence}"
            }
            TemplateId::ResultSection => {
                "Summarize the results section \"{query}\". List the main findings with their \
                 reported numbers and the comparisons they are made against.\n\n\
                 Section text:\n{evidence}"
            }
            TemplateId::KeywordSummary => {
                "Summarize what the paper says about: {query}\n\
                 Focus only on these topics and note where each is discussed.\n\n\
                 Excerpts:\n{evidence}"
            }
            TemplateId::ProblemMethodConclusion => {
                "Summarize the paper in three labeled parts.\n\
                 Problem: what question does it address?\n\
                 Method: how is it addressed?\n\
                 Conclusion: what is concluded?\n\
                 Focus: {query}\n\n\
                 Excerpts:\n{evidence}"
            }
            TemplateId::BackgroundMethodResult => {
                "Summarize the paper in three labeled parts.\n\
                 Background: context and motivation.\n\
                 Method: approach and setup.\n\
                 Result: main findings.\n\
                 Focus: {query}\n\n\
                 Excerpts:\n{evidence}"
            }
            TemplateId::ObjectiveMethodFinding => {
                "Summarize the paper in three labeled parts.\n\
                 Objective: what the authors set out to do.\n\
                 Method: how they did it.\n\
                 Finding: what they found.\n\
                 Focus: {query}\n\n\
                 Excerpts:\n{evidence}"
            }
            TemplateId::LimitationFuture => {
                "From the excerpts, list the limitations the authors acknowledge and the future \
                 work they propose. Mark anything you infer rather than read as inferred.\n\
                 Focus: {query}\n\n\
                 Excerpts:\n{evidence}"
            }
            TemplateId::ContributionImpact => {
                "List the paper's main contributions, then describe their likely impact on the \
                 field as argued by the authors.\n\
                 Focus: {query}\n\n\
                 Excerpts:\n{evidence}"
            }
            TemplateId::QuestionAnswer => {
                "Evidence:\n{evidence}\n\n\
                 {history}\
                 Question: {query}\n\n\
                 Answer using only the evidence above, citing excerpts as [n]."
            }
        }
    }
}

impl std::fmt::Display for TemplateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_lowercase().replace(['-', ' '], "_");
        TemplateId::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == key)
            .ok_or_else(|| Error::UnknownTemplate(s.to_string()))
    }
}

/// Listing entry for the templates endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateInfo {
    pub id: TemplateId,
    pub description: String,
    pub structured: bool,
}

impl From<TemplateId> for TemplateInfo {
    fn from(id: TemplateId) -> Self {
        Self {
            id,
            description: id.description().to_string(),
            structured: id.is_structured(),
        }
    }
}
