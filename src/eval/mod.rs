//! Evaluation of the retrieval chain against a labelled dataset.
//!
//! This module provides:
//! - Dataset loading (JSON array of question/reference pairs)
//! - LLM-as-judge grading (CORRECT / INCORRECT)
//! - The evaluation driver, which records one tracking run per item

pub mod dataset;
pub mod judge;
pub mod runner;

pub use dataset::{Dataset, EvalItem, SkippedItem};
pub use judge::{AnswerGrader, Grade, Verdict};
pub use runner::{EvalOptions, EvaluationRecord, EvaluationSummary, Evaluator};
