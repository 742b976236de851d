//! Evaluation CLI binary: grades the assistant's answers to a labelled dataset.
//!
//! Usage:
//!   eval                         # Run on the configured dataset
//!   eval --dataset <path>        # Run on another JSON dataset
//!
//! Options:
//!   --max-items <N>          # Limit number of items
//!   --prompt-version <V>     # Evaluate another prompt version
//!   --top-k <N>              # Number of chunks to retrieve
//!   --output <path>          # Save results to JSON file

use anyhow::{Context, Result};
use clap::Parser;
use rag_assistant::chain::{ChainOptions, RetrievalChain};
use rag_assistant::config::Config;
use rag_assistant::eval::{AnswerGrader, Dataset, EvalOptions, Evaluator};
use rag_assistant::llm::{AzureChatClient, AzureEmbeddingClient, PromptTemplate};
use rag_assistant::persistence::load_index_for_embedder;
use rag_assistant::tracking::tracker_from_config;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "eval")]
#[command(about = "Evaluate the RAG assistant against a reference dataset", long_about = None)]
struct Cli {
    /// Path to the evaluation dataset (JSON array of {question, answer})
    #[arg(short, long)]
    dataset: Option<PathBuf>,

    /// Maximum number of items to evaluate
    #[arg(long)]
    max_items: Option<usize>,

    /// Prompt version to evaluate
    #[arg(short, long)]
    prompt_version: Option<String>,

    /// Number of chunks to retrieve
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// Save results to JSON file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(version) = cli.prompt_version {
        config.pipeline.prompt_version = version;
    }
    if let Some(k) = cli.top_k {
        config.pipeline.top_k = k;
    }

    // Prompt problems surface before any hosted call is made.
    let prompt = PromptTemplate::load(&config.paths.prompts_dir, &config.pipeline.prompt_version)
        .context("Failed to load prompt")?;
    config.validate().context("Invalid configuration")?;

    let dataset_path = cli.dataset.unwrap_or_else(|| config.paths.dataset_path.clone());
    println!("Loading dataset from {:?}...", dataset_path);
    let dataset = Dataset::load_json(&dataset_path).context("Failed to load dataset")?;
    println!(
        "Dataset: {} ({} items, {} malformed)",
        dataset.name,
        dataset.len(),
        dataset.skipped.len()
    );

    println!("Chat deployment: {}", config.azure.chat_deployment);
    println!("Prompt version:  {}", prompt.version());

    let embedder = Arc::new(
        AzureEmbeddingClient::new(config.azure.clone())
            .context("Failed to create embeddings client")?,
    );
    let chat = Arc::new(
        AzureChatClient::new(config.azure.clone()).context("Failed to create chat client")?,
    );
    let index = load_index_for_embedder(&config.paths.index_dir, embedder.as_ref())
        .await
        .context("Failed to load vector index")?;

    let meta = index.metadata();
    if meta.chunk_size != config.pipeline.chunk_size
        || meta.chunk_overlap != config.pipeline.chunk_overlap
    {
        warn!(
            index_chunk_size = meta.chunk_size,
            index_chunk_overlap = meta.chunk_overlap,
            configured_chunk_size = config.pipeline.chunk_size,
            configured_chunk_overlap = config.pipeline.chunk_overlap,
            "index was built with a different chunking; runs record the index values"
        );
    }

    let chain = RetrievalChain::new(
        Arc::new(index),
        embedder,
        chat.clone(),
        prompt,
        ChainOptions {
            top_k: config.pipeline.top_k,
        },
    );
    let tracker = tracker_from_config(&config.tracking).context("Failed to set up tracking")?;

    let evaluator = Evaluator::new(
        chain,
        AnswerGrader::new(chat),
        tracker,
        EvalOptions {
            max_items: cli.max_items,
        },
    );

    let summary = evaluator
        .run(&dataset)
        .await
        .context("Evaluation failed")?;

    for record in &summary.records {
        println!(
            "[eval_q{}] {} -> {}",
            record.index + 1,
            record.question,
            record.verdict
        );
    }
    summary.print_summary();

    if let Some(output_path) = cli.output {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(&output_path, json)
            .with_context(|| format!("Failed to write results to {:?}", output_path))?;
        println!("Results saved to {:?}", output_path);
    }

    Ok(())
}
