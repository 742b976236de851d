//! Evaluation driver: runs the chain over a labelled dataset, grades each
//! answer and records one tracking run per item.

use super::dataset::{Dataset, EvalItem};
use super::judge::{AnswerGrader, Verdict};
use crate::chain::RetrievalChain;
use crate::error::{RagError, Result};
use crate::tracking::{ExperimentTracker, RunRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Metric holding the binary correctness score of one item.
pub const CORRECTNESS_METRIC: &str = "lc_is_correct";

/// Run name of the aggregate run logged after all items.
pub const SUMMARY_RUN_NAME: &str = "eval_summary";

/// Evaluation options.
#[derive(Debug, Clone, Default)]
pub struct EvalOptions {
    /// Maximum items to evaluate (for quick testing).
    pub max_items: Option<usize>,
}

/// Outcome for a single dataset item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRecord {
    /// 0-indexed dataset position.
    pub index: usize,
    pub question: String,
    pub reference: String,
    pub generated_answer: String,
    pub context: String,
    pub verdict: Verdict,
    pub score: u8,
}

/// Aggregated evaluation results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub experiment: String,
    pub prompt_version: String,
    pub dataset_name: String,
    pub evaluated: usize,
    pub correct: usize,
    pub skipped: usize,
    /// `correct / evaluated`, 0 when nothing was evaluated.
    pub accuracy: f64,
    pub records: Vec<EvaluationRecord>,
    pub total_time_secs: f64,
}

impl EvaluationSummary {
    /// Print summary to stdout.
    pub fn print_summary(&self) {
        println!("\n========== Evaluation Results ==========");
        println!("Experiment:     {}", self.experiment);
        println!("Dataset:        {}", self.dataset_name);
        println!("Prompt version: {}", self.prompt_version);
        println!("----------------------------------------");
        println!("Evaluated: {}", self.evaluated);
        println!("Correct:   {}", self.correct);
        println!("Skipped:   {}", self.skipped);
        println!("Accuracy:  {:.1}%", self.accuracy * 100.0);
        println!("----------------------------------------");
        println!("Total time: {:.1}s", self.total_time_secs);
        println!("========================================\n");
    }
}

/// Experiment name for a prompt version.
pub fn experiment_name(prompt_version: &str) -> String {
    format!("eval_{}", prompt_version)
}

/// Run name for the item at dataset position `index`.
pub fn run_name(index: usize) -> String {
    format!("eval_q{}", index + 1)
}

/// Sequential evaluation driver.
pub struct Evaluator {
    chain: RetrievalChain,
    grader: AnswerGrader,
    tracker: Arc<dyn ExperimentTracker>,
    options: EvalOptions,
}

impl Evaluator {
    pub fn new(
        chain: RetrievalChain,
        grader: AnswerGrader,
        tracker: Arc<dyn ExperimentTracker>,
        options: EvalOptions,
    ) -> Self {
        Self {
            chain,
            grader,
            tracker,
            options,
        }
    }

    /// Evaluate every usable item of `dataset`.
    ///
    /// Each item's run is recorded before the next item starts, so an
    /// upstream failure aborts the batch but keeps completed runs.
    pub async fn run(&self, dataset: &Dataset) -> Result<EvaluationSummary> {
        let start_time = Instant::now();
        let prompt_version = self.chain.prompt().version().to_string();
        let experiment = experiment_name(&prompt_version);

        for skipped in &dataset.skipped {
            let err = RagError::MalformedItem {
                index: skipped.index,
                message: skipped.reason.clone(),
            };
            warn!(experiment = %experiment, "{}", err);
        }

        let items: Vec<&EvalItem> = match self.options.max_items {
            Some(max) => dataset.items.iter().take(max).collect(),
            None => dataset.items.iter().collect(),
        };

        info!(
            experiment = %experiment,
            items = items.len(),
            skipped = dataset.skipped.len(),
            "starting evaluation"
        );

        let mut records = Vec::with_capacity(items.len());
        for (n, item) in items.iter().enumerate() {
            let record = self.evaluate_item(&experiment, &prompt_version, item).await?;
            info!(
                item = n + 1,
                total = items.len(),
                run = %run_name(item.index),
                verdict = %record.verdict,
                "item evaluated"
            );
            records.push(record);
        }

        let evaluated = records.len();
        let correct = records.iter().filter(|r| r.score == 1).count();
        let accuracy = if evaluated > 0 {
            correct as f64 / evaluated as f64
        } else {
            0.0
        };

        let summary = EvaluationSummary {
            experiment,
            prompt_version,
            dataset_name: dataset.name.clone(),
            evaluated,
            correct,
            skipped: dataset.skipped.len(),
            accuracy,
            records,
            total_time_secs: start_time.elapsed().as_secs_f64(),
        };

        self.record_summary(&summary).await?;
        Ok(summary)
    }

    async fn evaluate_item(
        &self,
        experiment: &str,
        prompt_version: &str,
        item: &EvalItem,
    ) -> Result<EvaluationRecord> {
        let output = self.chain.invoke(&item.question, &[]).await?;
        let grade = self
            .grader
            .grade(&item.question, &output.answer, &item.answer, &output.context)
            .await?;

        let metadata = self.chain.index().metadata();
        let run = RunRecord::new(experiment, run_name(item.index))
            .param("question", &item.question)
            .param("prompt_version", prompt_version)
            .param("chunk_size", metadata.chunk_size)
            .param("chunk_overlap", metadata.chunk_overlap)
            .metric(CORRECTNESS_METRIC, grade.score as f64)
            .tag("verdict", grade.verdict)
            .finish();
        self.tracker.record(&run).await?;

        Ok(EvaluationRecord {
            index: item.index,
            question: item.question.clone(),
            reference: item.answer.clone(),
            generated_answer: output.answer,
            context: output.context,
            verdict: grade.verdict,
            score: grade.score,
        })
    }

    async fn record_summary(&self, summary: &EvaluationSummary) -> Result<()> {
        let metadata = self.chain.index().metadata();
        let run = RunRecord::new(&summary.experiment, SUMMARY_RUN_NAME)
            .param("prompt_version", &summary.prompt_version)
            .param("dataset", &summary.dataset_name)
            .param("chunk_size", metadata.chunk_size)
            .param("chunk_overlap", metadata.chunk_overlap)
            .metric("accuracy", summary.accuracy)
            .metric("n_evaluated", summary.evaluated as f64)
            .metric("n_correct", summary.correct as f64)
            .metric("n_skipped", summary.skipped as f64)
            .finish();
        self.tracker.record(&run).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainOptions;
    use crate::chunk::{ChunkConfig, split_pages};
    use crate::document::Page;
    use crate::index::VectorIndex;
    use crate::llm::PromptTemplate;
    use crate::testing::{HashEmbedder, MemoryTracker, ScriptedChat};

    const PROMPT: &str = "Answer from the context.\n\nContext:\n{context}\n\nQuestion: {question}\nAnswer:";

    async fn evaluator(
        chat: Arc<ScriptedChat>,
        tracker: Arc<MemoryTracker>,
        options: EvalOptions,
    ) -> Evaluator {
        let embedder = Arc::new(HashEmbedder::default());
        let config = ChunkConfig {
            chunk_size: 200,
            chunk_overlap: 20,
        };
        let pages = vec![
            Page::new("handbook.pdf", 1, "Employees receive 20 vacation days annually."),
            Page::new("handbook.pdf", 2, "Remote work is allowed two days per week with manager approval."),
        ];
        let chunks = split_pages(&pages, &config).unwrap();
        let index = VectorIndex::build(chunks, embedder.as_ref(), config, 1)
            .await
            .unwrap();

        let prompt = PromptTemplate::from_text("v1_asistente_rrhh", "v1_asistente_rrhh.txt", PROMPT).unwrap();
        let chain = RetrievalChain::new(
            Arc::new(index),
            embedder,
            chat.clone(),
            prompt,
            ChainOptions { top_k: 1 },
        );

        Evaluator::new(chain, AnswerGrader::new(chat), tracker, options)
    }

    #[tokio::test]
    async fn test_vacation_policy_scenario() {
        let chat = Arc::new(ScriptedChat::new(vec![
            "You get 20 vacation days per year.".to_string(),
            "GRADE: CORRECT".to_string(),
        ]));
        let tracker = Arc::new(MemoryTracker::default());
        let evaluator = evaluator(chat.clone(), tracker.clone(), EvalOptions::default()).await;

        let mut dataset = Dataset::new("eval_dataset");
        dataset.add_item("What is the vacation policy?", "20 days per year");

        let summary = evaluator.run(&dataset).await.unwrap();
        assert_eq!(summary.experiment, "eval_v1_asistente_rrhh");
        assert_eq!(summary.evaluated, 1);
        assert_eq!(summary.correct, 1);
        assert_eq!(summary.accuracy, 1.0);

        let record = &summary.records[0];
        assert!(!record.generated_answer.is_empty());
        assert!(record.context.contains("20 vacation days"));
        assert!(record.score <= 1);

        let runs = tracker.runs();
        let item_runs: Vec<_> = runs.iter().filter(|r| r.run_name == "eval_q1").collect();
        assert_eq!(item_runs.len(), 1);
        let run = item_runs[0];
        assert_eq!(run.experiment, "eval_v1_asistente_rrhh");
        assert_eq!(run.params["question"], "What is the vacation policy?");
        assert_eq!(run.params["prompt_version"], "v1_asistente_rrhh");
        assert_eq!(run.params["chunk_size"], "200");
        assert_eq!(run.params["chunk_overlap"], "20");
        assert_eq!(run.metrics[CORRECTNESS_METRIC], 1.0);
        assert_eq!(run.tags["verdict"], "CORRECT");

        // The grader saw the retrieved context.
        let calls = chat.calls();
        assert!(calls[1][1].content.contains("CONTEXT: Employees receive 20 vacation days annually."));
    }

    #[tokio::test]
    async fn test_skipped_items_and_summary_run() {
        let chat = Arc::new(ScriptedChat::new(vec![
            "Three days.".to_string(),
            "GRADE: INCORRECT".to_string(),
        ]));
        let tracker = Arc::new(MemoryTracker::default());
        let evaluator = evaluator(chat, tracker.clone(), EvalOptions::default()).await;

        let dataset = Dataset::from_json_str(
            "mixed",
            r#"[{"question": "How many remote days?"}, {"question": "How many remote days?", "answer": "Two"}]"#,
        )
        .unwrap();

        let summary = evaluator.run(&dataset).await.unwrap();
        assert_eq!(summary.evaluated, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.correct, 0);
        assert_eq!(summary.accuracy, 0.0);

        let runs = tracker.runs();
        let names: Vec<_> = runs.iter().map(|r| r.run_name.as_str()).collect();
        assert_eq!(names, vec!["eval_q2", SUMMARY_RUN_NAME]);
        assert_eq!(runs[0].tags["verdict"], "INCORRECT");
        assert_eq!(runs[1].metrics["n_skipped"], 1.0);
    }

    #[tokio::test]
    async fn test_max_items_limits_runs() {
        let chat = Arc::new(ScriptedChat::answering("GRADE: CORRECT"));
        let tracker = Arc::new(MemoryTracker::default());
        let evaluator = evaluator(
            chat,
            tracker.clone(),
            EvalOptions { max_items: Some(1) },
        )
        .await;

        let mut dataset = Dataset::new("eval_dataset");
        dataset.add_item("What is the vacation policy?", "20 days per year");
        dataset.add_item("Can I work remotely?", "Two days per week");

        let summary = evaluator.run(&dataset).await.unwrap();
        assert_eq!(summary.evaluated, 1);
        assert_eq!(tracker.runs().len(), 2);
    }

    #[test]
    fn test_names() {
        assert_eq!(experiment_name("v2"), "eval_v2");
        assert_eq!(run_name(0), "eval_q1");
    }
}
