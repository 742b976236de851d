//! Evaluation dataset loading.
//!
//! The dataset is a JSON array of objects with string fields `question` and
//! `answer`:
//!
//! ```json
//! [
//!   {"question": "What is the vacation policy?", "answer": "20 days per year"}
//! ]
//! ```
//!
//! Entries that lack either field are kept aside as [`SkippedItem`]s so one bad
//! row does not sink the whole batch.

use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// A question with its reference answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalItem {
    /// 0-indexed position in the dataset file.
    pub index: usize,
    pub question: String,
    /// Reference answer.
    pub answer: String,
}

/// A dataset entry that could not be used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedItem {
    pub index: usize,
    pub reason: String,
}

/// A collection of evaluation items.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    /// Dataset name (file stem).
    pub name: String,
    pub items: Vec<EvalItem>,
    pub skipped: Vec<SkippedItem>,
}

impl Dataset {
    /// Create a new empty dataset.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Add a question/answer pair at the next position.
    pub fn add_item(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        let index = self.items.len() + self.skipped.len();
        self.items.push(EvalItem {
            index,
            question: question.into(),
            answer: answer.into(),
        });
    }

    /// Number of usable items in the dataset.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if dataset has no usable items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Keep only the first `n` usable items (for quick runs).
    pub fn take(&self, n: usize) -> Self {
        Self {
            name: self.name.clone(),
            items: self.items.iter().take(n).cloned().collect(),
            skipped: self.skipped.clone(),
        }
    }

    /// Load from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(RagError::DatasetNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| RagError::io(path, e))?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("dataset");

        Self::from_json_str(name, &content)
    }

    /// Parse dataset JSON. The top level must be an array.
    pub fn from_json_str(name: &str, content: &str) -> Result<Self> {
        let entries: Vec<Value> = serde_json::from_str(content).map_err(|e| {
            RagError::Serialization(format!(
                "Dataset must be a JSON array of {{\"question\", \"answer\"}} objects: {}",
                e
            ))
        })?;

        let mut dataset = Dataset::new(name);
        for (index, entry) in entries.iter().enumerate() {
            match parse_entry(index, entry) {
                Ok(item) => dataset.items.push(item),
                Err(reason) => dataset.skipped.push(SkippedItem { index, reason }),
            }
        }

        Ok(dataset)
    }
}

fn parse_entry(index: usize, entry: &Value) -> std::result::Result<EvalItem, String> {
    let object = entry
        .as_object()
        .ok_or_else(|| "entry is not a JSON object".to_string())?;

    let field = |name: &str| -> std::result::Result<String, String> {
        match object.get(name) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
            Some(Value::String(_)) => Err(format!("field '{}' is empty", name)),
            Some(_) => Err(format!("field '{}' is not a string", name)),
            None => Err(format!("missing field '{}'", name)),
        }
    };

    Ok(EvalItem {
        index,
        question: field("question")?,
        answer: field("answer")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_dataset_operations() {
        let mut dataset = Dataset::new("test");
        assert!(dataset.is_empty());

        dataset.add_item("What is the vacation policy?", "20 days per year");
        dataset.add_item("Can I work remotely?", "Two days per week");

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.items[1].index, 1);
        assert_eq!(dataset.take(1).len(), 1);
    }

    #[test]
    fn test_load_json_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("eval_dataset.json");
        fs::write(
            &path,
            r#"[{"question":"What is the vacation policy?","answer":"20 days per year"}]"#,
        )
        .unwrap();

        let dataset = Dataset::load_json(&path).unwrap();
        assert_eq!(dataset.name, "eval_dataset");
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.items[0].question, "What is the vacation policy?");
        assert_eq!(dataset.items[0].answer, "20 days per year");
        assert!(dataset.skipped.is_empty());
    }

    #[test]
    fn test_malformed_entries_are_skipped_with_reason() {
        let json = r#"[
            {"question": "Q1", "answer": "A1"},
            {"question": "Q2"},
            {"question": 3, "answer": "A3"},
            "not an object",
            {"question": "Q5", "answer": "A5", "extra": true}
        ]"#;

        let dataset = Dataset::from_json_str("mixed", json).unwrap();
        let indices: Vec<_> = dataset.items.iter().map(|i| i.index).collect();
        assert_eq!(indices, vec![0, 4]);

        assert_eq!(dataset.skipped.len(), 3);
        assert_eq!(dataset.skipped[0].index, 1);
        assert!(dataset.skipped[0].reason.contains("missing field 'answer'"));
        assert!(dataset.skipped[1].reason.contains("not a string"));
        assert!(dataset.skipped[2].reason.contains("not a JSON object"));
    }

    #[test]
    fn test_top_level_must_be_array() {
        let result = Dataset::from_json_str("bad", r#"{"question": "Q", "answer": "A"}"#);
        assert!(matches!(result, Err(RagError::Serialization(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = Dataset::load_json(Path::new("/nonexistent/eval_dataset.json"));
        assert!(matches!(result, Err(RagError::DatasetNotFound(_))));
    }
}
