//! Document processing and the summary/QA orchestrators

mod qa;
mod summarizer;
mod worker;

pub use qa::{classify_question, follow_up_questions, question_suggestions, QaService};
pub use summarizer::{suggest_keywords, Summarizer};
pub use worker::{Intake, ProcessingWorker};
