//! LLM-as-judge grading of generated answers.
//!
//! The grader asks the chat model for `GRADE: CORRECT` or `GRADE: INCORRECT`
//! against the reference answer. CORRECT scores 1; INCORRECT and
//! unparseable replies score 0.

use crate::error::Result;
use crate::llm::{ChatModel, Prompts, fill_placeholders};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Categorical grader verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Correct,
    Incorrect,
    /// The grader reply did not contain a recognizable grade.
    Unknown,
}

impl Verdict {
    /// Binary correctness score.
    pub fn score(&self) -> u8 {
        match self {
            Verdict::Correct => 1,
            Verdict::Incorrect | Verdict::Unknown => 0,
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        let word: String = token
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .to_uppercase();
        match word.as_str() {
            "CORRECT" => Some(Verdict::Correct),
            "INCORRECT" => Some(Verdict::Incorrect),
            _ => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Correct => write!(f, "CORRECT"),
            Verdict::Incorrect => write!(f, "INCORRECT"),
            Verdict::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Result from grading a single answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grade {
    pub verdict: Verdict,
    /// 1 for a correct answer, else 0.
    pub score: u8,
    /// Raw grader reply.
    pub reasoning: String,
}

/// LLM-as-judge for answer correctness.
pub struct AnswerGrader {
    client: Arc<dyn ChatModel>,
}

impl AnswerGrader {
    /// Create a new grader with the given chat model.
    pub fn new(client: Arc<dyn ChatModel>) -> Self {
        Self { client }
    }

    /// Grade `answer` to `question` against `reference`, given the retrieved `context`.
    pub async fn grade(
        &self,
        question: &str,
        answer: &str,
        reference: &str,
        context: &str,
    ) -> Result<Grade> {
        let prompt = fill_placeholders(
            Prompts::grade_answer(),
            &[
                ("question", question),
                ("context", context),
                ("reference", reference),
                ("answer", answer),
            ],
        );

        let response = self
            .client
            .complete(Some(Prompts::system_grader()), &prompt)
            .await?;

        let grade = Self::parse_grade_response(&response);
        if grade.verdict == Verdict::Unknown {
            warn!(response = %response, "grader reply had no recognizable grade");
        }
        Ok(grade)
    }

    /// Parse a grader reply.
    ///
    /// Looks for the word after `GRADE:`, then falls back to the first and
    /// last words of the reply.
    fn parse_grade_response(response: &str) -> Grade {
        let upper = response.to_uppercase();

        let after_label = upper
            .rfind("GRADE:")
            .and_then(|pos| upper[pos + "GRADE:".len()..].split_whitespace().next())
            .and_then(Verdict::from_token);

        let verdict = after_label
            .or_else(|| upper.split_whitespace().next().and_then(Verdict::from_token))
            .or_else(|| upper.split_whitespace().last().and_then(Verdict::from_token))
            .unwrap_or(Verdict::Unknown);

        Grade {
            verdict,
            score: verdict.score(),
            reasoning: response.trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedChat;

    #[test]
    fn test_parse_grade_label() {
        let grade = AnswerGrader::parse_grade_response("GRADE: CORRECT");
        assert_eq!(grade.verdict, Verdict::Correct);
        assert_eq!(grade.score, 1);

        let grade = AnswerGrader::parse_grade_response("The answer conflicts.\nGrade: incorrect");
        assert_eq!(grade.verdict, Verdict::Incorrect);
        assert_eq!(grade.score, 0);
    }

    #[test]
    fn test_incorrect_is_not_read_as_correct() {
        let grade = AnswerGrader::parse_grade_response("INCORRECT");
        assert_eq!(grade.verdict, Verdict::Incorrect);
    }

    #[test]
    fn test_parse_grade_fallbacks() {
        assert_eq!(
            AnswerGrader::parse_grade_response("Correct. Both say 20 days.").verdict,
            Verdict::Correct
        );
        assert_eq!(
            AnswerGrader::parse_grade_response("The student is wrong, so: INCORRECT.").verdict,
            Verdict::Incorrect
        );
        let unknown = AnswerGrader::parse_grade_response("I cannot tell.");
        assert_eq!(unknown.verdict, Verdict::Unknown);
        assert_eq!(unknown.score, 0);
    }

    #[tokio::test]
    async fn test_grade_sends_all_fields() {
        let chat = Arc::new(ScriptedChat::answering("GRADE: CORRECT"));
        let grader = AnswerGrader::new(chat.clone());

        let grade = grader
            .grade(
                "What is the vacation policy?",
                "You get 20 vacation days per year.",
                "20 days per year",
                "Employees receive 20 vacation days annually.",
            )
            .await
            .unwrap();
        assert_eq!(grade.verdict, Verdict::Correct);

        let calls = chat.calls();
        let user = &calls[0][1].content;
        assert!(user.contains("QUESTION: What is the vacation policy?"));
        assert!(user.contains("REFERENCE ANSWER: 20 days per year"));
        assert!(user.contains("STUDENT ANSWER: You get 20 vacation days per year."));
        assert!(user.contains("CONTEXT: Employees receive 20 vacation days annually."));
    }

    #[tokio::test]
    async fn test_grade_keeps_brace_bearing_inputs_in_place() {
        let chat = Arc::new(ScriptedChat::answering("GRADE: INCORRECT"));
        let grader = AnswerGrader::new(chat.clone());

        grader
            .grade("Q mentions {reference}?", "ANS", "SECRET_REF", "ctx with {answer} braces")
            .await
            .unwrap();

        let calls = chat.calls();
        let user = &calls[0][1].content;
        assert!(user.contains("QUESTION: Q mentions {reference}?\n"));
        assert!(user.contains("CONTEXT: ctx with {answer} braces\n"));
        assert!(user.contains("REFERENCE ANSWER: SECRET_REF\n"));
        assert!(user.contains("STUDENT ANSWER: ANS\n"));
        assert_eq!(user.matches("SECRET_REF").count(), 1);
    }

    #[test]
    fn test_verdict_display() {
        assert_eq!(Verdict::Correct.to_string(), "CORRECT");
        assert_eq!(Verdict::Unknown.to_string(), "UNKNOWN");
    }
}
