//! RAG Assistant CLI
//!
//! Builds the vector index from the documents directory and answers
//! questions about it.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rag_assistant::{
    chain::{ChainOptions, ChatTurn, RetrievalChain},
    chunk::ChunkConfig,
    config::Config,
    indexer::{Indexer, IndexerOptions},
    llm::{AzureChatClient, AzureEmbeddingClient, Embedder, PromptTemplate},
    persistence::{index_exists, index_size, load_index_for_embedder, load_metadata},
    tracking::tracker_from_config,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

/// RAG Assistant - question answering over HR documents
#[derive(Parser)]
#[command(name = "rag-assistant")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the vector index from a directory of PDFs
    Index {
        /// Directory containing the PDF files
        #[arg(short, long)]
        documents: Option<PathBuf>,

        /// Output directory for the vector index
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Characters per chunk
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Characters shared by consecutive chunks
        #[arg(long)]
        chunk_overlap: Option<usize>,
    },

    /// Ask a question (starts an interactive conversation when omitted)
    Ask {
        /// The question to answer
        question: Option<String>,

        /// Number of chunks to retrieve
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Prompt version to use
        #[arg(short, long)]
        prompt_version: Option<String>,

        /// Print the retrieved chunks
        #[arg(long)]
        show_sources: bool,
    },

    /// Show information about the vector index
    Info {
        /// Path to the vector index directory
        index: Option<PathBuf>,
    },

    /// Test the chat and embedding deployments
    Test,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Index {
            documents,
            output,
            chunk_size,
            chunk_overlap,
        } => cmd_index(documents, output, chunk_size, chunk_overlap).await,
        Commands::Ask {
            question,
            top_k,
            prompt_version,
            show_sources,
        } => cmd_ask(question, top_k, prompt_version, show_sources).await,
        Commands::Info { index } => cmd_info(index),
        Commands::Test => cmd_test().await,
    }
}

async fn cmd_index(
    documents: Option<PathBuf>,
    output: Option<PathBuf>,
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
) -> Result<()> {
    println!("Loading configuration...");
    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(size) = chunk_size {
        config.pipeline.chunk_size = size;
    }
    if let Some(overlap) = chunk_overlap {
        config.pipeline.chunk_overlap = overlap;
    }
    config.validate().context("Invalid configuration")?;

    let options = IndexerOptions {
        documents_dir: documents.unwrap_or_else(|| config.paths.documents_dir.clone()),
        index_dir: output.unwrap_or_else(|| config.paths.index_dir.clone()),
        chunk_config: config.pipeline.chunk_config(),
    };

    println!("Indexing documents in: {}", options.documents_dir.display());
    println!("Using embeddings deployment: {}", config.azure.embeddings_deployment);
    print_chunk_config(&options.chunk_config);

    let embedder = Arc::new(
        AzureEmbeddingClient::new(config.azure.clone())
            .context("Failed to create embeddings client")?,
    );
    let tracker = tracker_from_config(&config.tracking).context("Failed to set up tracking")?;

    let start = Instant::now();
    let (_, stats) = Indexer::new(embedder, tracker, options)
        .run()
        .await
        .context("Failed to build vector index")?;

    println!("\nVector Index Built:");
    println!("  Documents:   {}", stats.n_documents);
    println!("  Pages:       {}", stats.n_pages);
    println!("  Chunks:      {}", stats.n_chunks);
    println!("  Dimension:   {}", stats.dimension);
    println!("  Build time:  {:.2?}", start.elapsed());

    let size = index_size(&stats.index_dir)?;
    println!("\nIndex saved to: {}", stats.index_dir.display());
    println!("  Size: {:.1} KB", size as f64 / 1024.0);

    Ok(())
}

async fn cmd_ask(
    question: Option<String>,
    top_k: Option<usize>,
    prompt_version: Option<String>,
    show_sources: bool,
) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(version) = prompt_version {
        config.pipeline.prompt_version = version;
    }
    if let Some(k) = top_k {
        config.pipeline.top_k = k;
    }

    // Prompt problems surface before any hosted call is made.
    let prompt = PromptTemplate::load(&config.paths.prompts_dir, &config.pipeline.prompt_version)
        .context("Failed to load prompt")?;
    config.validate().context("Invalid configuration")?;

    if !index_exists(&config.paths.index_dir) {
        anyhow::bail!(
            "Vector index not found at '{}'. Run 'index' command first.",
            config.paths.index_dir.display()
        );
    }

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

    let chain = RetrievalChain::new(
        Arc::new(index),
        embedder,
        chat,
        prompt,
        ChainOptions {
            top_k: config.pipeline.top_k,
        },
    );

    match question {
        Some(question) => {
            answer(&chain, &question, &[], show_sources).await?;
        }
        None => converse(&chain, show_sources).await?,
    }

    Ok(())
}

/// Interactive session; each answer becomes history for the next question.
async fn converse(chain: &RetrievalChain, show_sources: bool) -> Result<()> {
    println!(
        "Prompt version: {} (empty line or Ctrl-D to quit)",
        chain.prompt().version()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut history: Vec<ChatTurn> = Vec::new();

    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            break;
        }

        let reply = answer(chain, question, &history, show_sources).await?;
        history.push(ChatTurn::new(question, reply));
    }

    Ok(())
}

async fn answer(
    chain: &RetrievalChain,
    question: &str,
    history: &[ChatTurn],
    show_sources: bool,
) -> Result<String> {
    let start = Instant::now();
    let output = chain
        .invoke(question, history)
        .await
        .context("Failed to answer question")?;

    if output.standalone_question != question {
        println!("(searching for: \"{}\")", output.standalone_question);
    }
    println!("\n{}\n", output.answer);

    if show_sources {
        println!("Sources:");
        println!("{}", "─".repeat(60));
        for (i, source) in output.sources.iter().enumerate() {
            println!(
                "{:>2}. {} p.{} (score {:.3})",
                i + 1,
                source.chunk.source,
                source.chunk.page,
                source.score
            );
            let preview: String = source.chunk.text.chars().take(200).collect();
            for line in preview.lines().take(3) {
                println!("      {}", line);
            }
            if source.chunk.text.chars().count() > 200 {
                println!("      ...");
            }
        }
        println!("{}", "─".repeat(60));
    }
    println!("Answered in {:.2?}", start.elapsed());

    Ok(output.answer)
}

fn cmd_info(index: Option<PathBuf>) -> Result<()> {
    let index_dir = match index {
        Some(dir) => dir,
        None => {
            Config::load()
                .context("Failed to load configuration")?
                .paths
                .index_dir
        }
    };

    if !index_exists(&index_dir) {
        anyhow::bail!(
            "Vector index not found at '{}'. Run 'index' command first.",
            index_dir.display()
        );
    }

    let meta = load_metadata(&index_dir).context("Failed to load index metadata")?;
    let size = index_size(&index_dir)?;

    println!("Vector Index Information");
    println!("{}", "─".repeat(40));
    println!("  Embedding model: {}", meta.embedding_model);
    println!("  Dimension:       {}", meta.dimension);
    println!("  Documents:       {}", meta.n_documents);
    println!("  Chunks:          {}", meta.n_chunks);
    println!("  Chunk size:      {}", meta.chunk_size);
    println!("  Chunk overlap:   {}", meta.chunk_overlap);
    println!("  Format version:  {}", meta.format_version);
    println!("  Size:            {:.1} KB", size as f64 / 1024.0);
    println!("  Index path:      {}", index_dir.display());

    Ok(())
}

async fn cmd_test() -> Result<()> {
    println!("Testing Azure OpenAI deployments...\n");

    let config = Config::load().context("Failed to load configuration")?;

    println!("Configuration:");
    println!("  Endpoint:     {}", config.azure.endpoint);
    println!("  API version:  {}", config.azure.api_version);
    println!("  Chat:         {}", config.azure.chat_deployment);
    println!("  Embeddings:   {}", config.azure.embeddings_deployment);
    println!(
        "  API Key:      {}...",
        config.azure.api_key.chars().take(8).collect::<String>()
    );
    println!();

    if let Err(e) = config.validate() {
        println!("Configuration error: {}", e);
        return Ok(());
    }

    let chat = AzureChatClient::new(config.azure.clone())?;
    println!("Sending chat test request...");
    match chat.test_connection().await {
        Ok(()) => println!("Chat deployment OK"),
        Err(e) => println!("Chat deployment failed: {}", e),
    }

    let embedder = AzureEmbeddingClient::new(config.azure.clone())?;
    println!("Sending embeddings test request...");
    match embedder.embed("connection test").await {
        Ok(vector) => println!("Embeddings deployment OK (dimension {})", vector.len()),
        Err(e) => println!("Embeddings deployment failed: {}", e),
    }

    if index_exists(&config.paths.index_dir) {
        println!("Checking vector index against the embeddings deployment...");
        match load_index_for_embedder(&config.paths.index_dir, &embedder).await {
            Ok(_) => println!("Vector index is compatible"),
            Err(e) => println!("Vector index check failed: {}", e),
        }
    }

    Ok(())
}

fn print_chunk_config(config: &ChunkConfig) {
    println!(
        "Chunking: {} chars, {} overlap",
        config.chunk_size, config.chunk_overlap
    );
}
