use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use voice_rag_agent::retrieval::{CorpusIndex, Embedder, load_text_files};
use voice_rag_agent::{Config, Coordinator, RunHandle};

/// Voicerag - speculative retrieval-augmented voice assistant
#[derive(Parser)]
#[command(name = "voicerag", version, about)]
struct Cli {
    /// Config file (defaults to ~/.config/voice-rag-agent/config.toml)
    #[arg(short, long, env = "VOICERAG_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable spoken output (log responses instead)
    #[arg(long, env = "VOICERAG_DISABLE_VOICE")]
    disable_voice: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Read partial transcripts from stdin, one per line (default)
    Listen,
    /// Answer a single query
    Ask {
        /// The query to answer
        query: String,
    },
    /// Build the corpus index from the data directory
    Ingest {
        /// Directory of .txt/.md documents (overrides config)
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
        /// Skip embeddings; the index serves lexical retrieval only
        #[arg(long)]
        no_embed: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,voice_rag_agent=info",
        1 => "info,voice_rag_agent=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if cli.disable_voice {
        config.voice.enabled = false;
    }
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Command::Listen) {
        Command::Listen => listen(&config).await,
        Command::Ask { query } => ask(&config, query).await,
        Command::Ingest { data_dir, no_embed } => ingest(&config, data_dir, no_embed).await,
    }
}

/// Feed stdin lines to the coordinator until EOF or an empty line
async fn listen(config: &Config) -> anyhow::Result<()> {
    let coordinator = Coordinator::from_config(config)?;
    tracing::info!(
        retrieval = ?coordinator.retrieval_strategy(),
        "voicerag ready, type partial transcripts (empty line to finish)"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last: Option<RunHandle> = None;

    while let Some(line) = lines.next_line().await? {
        let transcript = line.trim();
        if transcript.is_empty() {
            break;
        }
        last = Some(coordinator.handle_partial(transcript).await);
    }

    if let Some(handle) = last {
        let state = handle.wait().await;
        tracing::debug!(generation = handle.generation(), ?state, "last run finished");
    }

    finish(&coordinator, config).await
}

async fn ask(config: &Config, query: String) -> anyhow::Result<()> {
    let coordinator = Coordinator::from_config(config)?;
    let handle = coordinator.handle_partial(query).await;
    handle.wait().await;

    if let Some(answer) = coordinator.history().await.last() {
        println!("{answer}");
    }

    finish(&coordinator, config).await
}

async fn finish(coordinator: &Coordinator, config: &Config) -> anyhow::Result<()> {
    match coordinator.metrics_summary().await {
        Some(summary) => tracing::info!(
            runs = summary.runs,
            avg_retrieval_time = summary.avg_retrieval_time,
            avg_total_time = summary.avg_total_time,
            "session metrics"
        ),
        None => tracing::info!("no completed runs"),
    }

    coordinator.dump_metrics(&config.pipeline.metrics_path).await?;
    Ok(())
}

async fn ingest(config: &Config, data_dir: Option<PathBuf>, no_embed: bool) -> anyhow::Result<()> {
    let retrieval = &config.retrieval;
    let data_dir = data_dir.unwrap_or_else(|| retrieval.data_dir.clone());

    let documents = load_text_files(&data_dir)?;
    if documents.is_empty() {
        anyhow::bail!("no .txt or .md documents found in {}", data_dir.display());
    }

    let mut index = CorpusIndex::build(&documents, retrieval.chunk_words, retrieval.chunk_stride);
    tracing::info!(
        documents = documents.len(),
        chunks = index.chunks.len(),
        "chunked corpus"
    );

    match (&retrieval.embedding_api_key, no_embed) {
        (Some(key), false) => {
            let embedder = Embedder::with_model(key.clone(), retrieval.embedding_model.clone())?;
            let embedder = match &retrieval.embedding_base_url {
                Some(url) => embedder.with_base_url(url.clone()),
                None => embedder,
            };
            index.embed(&embedder, embedder.model()).await?;
        }
        (None, false) => {
            tracing::warn!("no embedding API key, building a lexical-only index");
        }
        (_, true) => {}
    }

    index.save(&retrieval.index_path)?;
    println!(
        "Indexed {} chunks from {} documents into {}",
        index.chunks.len(),
        documents.len(),
        retrieval.index_path.display()
    );

    Ok(())
}
