//! Prompt templates.
//!
//! Answer prompts are versioned files (`<prompts_dir>/<version>.txt`) with a
//! `{context}` and a `{question}` placeholder. The prompts used internally by
//! the chain and the grader live in [`Prompts`].

use crate::error::{RagError, Result};
use std::path::{Path, PathBuf};

pub const CONTEXT_PLACEHOLDER: &str = "{context}";
pub const QUESTION_PLACEHOLDER: &str = "{question}";

/// A versioned answer prompt loaded from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    version: String,
    path: PathBuf,
    text: String,
}

impl PromptTemplate {
    /// Load `{prompts_dir}/{version}.txt`.
    pub fn load(prompts_dir: &Path, version: &str) -> Result<Self> {
        let path = Self::path_for(prompts_dir, version);
        if !path.is_file() {
            return Err(RagError::PromptNotFound(path));
        }

        let text = std::fs::read_to_string(&path).map_err(|e| RagError::io(&path, e))?;
        Self::from_text(version, path, text)
    }

    /// Build a template from text, checking both placeholders are present.
    pub fn from_text(
        version: impl Into<String>,
        path: impl Into<PathBuf>,
        text: impl Into<String>,
    ) -> Result<Self> {
        let template = Self {
            version: version.into(),
            path: path.into(),
            text: text.into(),
        };

        for (name, placeholder) in [("context", CONTEXT_PLACEHOLDER), ("question", QUESTION_PLACEHOLDER)] {
            if !template.text.contains(placeholder) {
                return Err(RagError::InvalidPrompt {
                    path: template.path,
                    placeholder: name.to_string(),
                });
            }
        }

        Ok(template)
    }

    /// Expected file location for a prompt version.
    pub fn path_for(prompts_dir: &Path, version: &str) -> PathBuf {
        prompts_dir.join(format!("{}.txt", version))
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Substitute the placeholders in one left-to-right pass.
    ///
    /// Substituted values are not scanned again, so a question that itself
    /// contains `{context}` is inserted verbatim.
    pub fn render(&self, context: &str, question: &str) -> String {
        fill_placeholders(&self.text, &[("context", context), ("question", question)])
    }
}

/// Replace each `{name}` of `template` with its value in one left-to-right
/// pass. Values are inserted verbatim and never rescanned; unknown braces are
/// kept as they are.
pub fn fill_placeholders(template: &str, values: &[(&str, &str)]) -> String {
    let extra: usize = values.iter().map(|(_, v)| v.len()).sum();
    let mut out = String::with_capacity(template.len() + extra);
    let mut rest = template;

    while let Some(pos) = rest.find('{') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        let matched = values.iter().find_map(|(name, value)| {
            tail[1..]
                .strip_prefix(name)
                .and_then(|after| after.strip_prefix('}'))
                .map(|after| (*value, after))
        });

        match matched {
            Some((value, after)) => {
                out.push_str(value);
                rest = after;
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);

    out
}

/// Built-in prompts for question condensing and grading.
pub struct Prompts;

impl Prompts {
    /// Rewrite a follow-up into a standalone question given the chat history.
    pub fn condense_question() -> &'static str {
        r#"Given the following conversation and a follow up question, rephrase the follow up question to be a standalone question, in its original language.

Chat History:
{chat_history}
Follow Up Input: {question}
Standalone question:"#
    }

    /// Grade a generated answer against the reference answer.
    ///
    /// The answer is CORRECT when it is factually consistent with the
    /// reference: wording, punctuation and additional non-conflicting detail
    /// do not matter; a contradiction or a missing key fact does.
    pub fn grade_answer() -> &'static str {
        r#"You are a teacher grading a quiz.
You are given a question, the context retrieved to answer it, the reference answer, and the student's answer. Score the student's answer as either CORRECT or INCORRECT.

Grade the student answer based ONLY on its factual accuracy with respect to the reference answer. Ignore differences in punctuation and phrasing. It is OK if the student answer contains more information than the reference answer, as long as it does not contain any conflicting statements. An answer that omits the key fact of the reference answer is INCORRECT.

QUESTION: {question}
CONTEXT: {context}
REFERENCE ANSWER: {reference}
STUDENT ANSWER: {answer}

Reply in the following format, and nothing else:
GRADE: <CORRECT or INCORRECT>"#
    }

    /// System prompt for the grader.
    pub fn system_grader() -> &'static str {
        "You are a strict but fair grader of question-answering systems. Always follow the requested output format."
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TEMPLATE: &str = "Use the context to answer.\n\nContext:\n{context}\n\nQuestion: {question}\nAnswer:";

    #[test]
    fn test_prompts_are_not_empty() {
        assert!(Prompts::condense_question().contains("{question}"));
        assert!(Prompts::grade_answer().contains("{reference}"));
        assert!(!Prompts::system_grader().is_empty());
    }

    #[test]
    fn test_load_from_versioned_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("v2.txt"), TEMPLATE).unwrap();

        let prompt = PromptTemplate::load(dir.path(), "v2").unwrap();
        assert_eq!(prompt.version(), "v2");
        assert_eq!(prompt.path(), dir.path().join("v2.txt"));
    }

    #[test]
    fn test_missing_prompt_names_expected_path() {
        let dir = TempDir::new().unwrap();
        let err = PromptTemplate::load(dir.path(), "v9_unknown").unwrap_err();

        match &err {
            RagError::PromptNotFound(path) => {
                assert_eq!(path, &dir.path().join("v9_unknown.txt"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("v9_unknown.txt"));
    }

    #[test]
    fn test_template_requires_both_placeholders() {
        let err = PromptTemplate::from_text("v", "v.txt", "Only {context}").unwrap_err();
        assert!(matches!(
            err,
            RagError::InvalidPrompt { ref placeholder, .. } if placeholder == "question"
        ));
        assert!(PromptTemplate::from_text("v", "v.txt", "Only {question}").is_err());
    }

    #[test]
    fn test_render_substitutes_each_placeholder_once() {
        let prompt = PromptTemplate::from_text("v", "v.txt", TEMPLATE).unwrap();
        let rendered = prompt.render("Employees receive 20 vacation days annually.", "What is the vacation policy?");

        assert_eq!(rendered.matches("Employees receive 20 vacation days annually.").count(), 1);
        assert_eq!(rendered.matches("What is the vacation policy?").count(), 1);
        assert!(!rendered.contains("{context}"));
        assert!(!rendered.contains("{question}"));
        assert!(rendered.starts_with("Use the context to answer."));
    }

    #[test]
    fn test_render_does_not_rescan_values() {
        let prompt = PromptTemplate::from_text("v", "v.txt", "{context}|{question}").unwrap();
        let rendered = prompt.render("ctx {question}", "q {context}");
        assert_eq!(rendered, "ctx {question}|q {context}");
    }

    #[test]
    fn test_render_keeps_other_braces() {
        let prompt = PromptTemplate::from_text("v", "v.txt", "{\"a\": 1} {context} {question} {other}").unwrap();
        assert_eq!(prompt.render("C", "Q"), "{\"a\": 1} C Q {other}");
    }

    #[test]
    fn test_fill_placeholders_inserts_values_verbatim() {
        let filled = fill_placeholders(
            "Q: {question}\nR: {reference}\nA: {answer}",
            &[
                ("question", "mentions {reference}?"),
                ("reference", "SECRET_REF"),
                ("answer", "{question}"),
            ],
        );
        assert_eq!(filled, "Q: mentions {reference}?\nR: SECRET_REF\nA: {question}");
    }

    #[test]
    fn test_fill_placeholders_handles_unclosed_and_multibyte() {
        let filled = fill_placeholders("{ñ {name} {name", &[("name", "días")]);
        assert_eq!(filled, "{ñ días {name");
    }
}
