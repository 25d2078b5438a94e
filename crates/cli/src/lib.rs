use anyhow::{bail, Context as AnyhowContext, Result};
use clap::{ArgGroup, Args, Parser, Subcommand};
use retrieval_chunker::{Chunk, Chunker, ChunkingStrategy};
use retrieval_search::{Filters, IngestRequest, Ingestor, Retriever};
use retrieval_vector_store::{EmbeddingProvider, HashEmbedder, StoreHandle};
use std::path::PathBuf;
use std::sync::Arc;

mod config;
mod flags;
mod output;

pub use config::{EmbeddingConfig, EmbeddingMode, RetrievalConfig, StoreConfig};

use flags::{parse_key_val, BackendFlag};
use output::{
    render_compact, render_delete, render_ingest, render_search, render_stats, CompactOutput,
    DeleteOutput, IngestOutput, Output, SearchOutput, StatsOutput,
};

#[derive(Parser)]
#[command(name = "retrieval")]
#[command(about = "Chunk, embed, and search documents with exact cosine similarity", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ./retrieval.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Snapshot directory (overrides store.data_dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Print results as JSON on stdout
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk, embed, and store a plain-text document
    Ingest(IngestArgs),

    /// Search stored chunks
    Search(SearchArgs),

    /// Soft-delete a document or a chunk
    Delete(DeleteArgs),

    /// Drop soft-deleted records and renumber the store
    Compact(CompactArgs),

    /// Show store statistics
    Stats,
}

#[derive(Args)]
struct IngestArgs {
    /// Plain-text file to ingest
    file: PathBuf,

    /// Document id (default: random)
    #[arg(long)]
    doc_id: Option<String>,

    /// Source label (default: the file name)
    #[arg(long)]
    source_name: Option<String>,

    /// Extra metadata copied onto every chunk
    #[arg(long = "meta", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    meta: Vec<(String, String)>,

    /// Use parent/child chunking regardless of config
    #[arg(long)]
    hierarchical: bool,
}

#[derive(Args)]
struct SearchArgs {
    /// Query text
    query: String,

    /// Number of results
    #[arg(short = 'k', long, default_value_t = 5)]
    k: usize,

    /// Exclude results whose metadata does not equal this value
    #[arg(long = "filter", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    filters: Vec<(String, String)>,

    /// Boost matching results without excluding others (implies --rerank)
    #[arg(long = "boost", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    boosts: Vec<(String, String)>,

    /// Apply metadata-boost reranking
    #[arg(long)]
    rerank: bool,

    /// Rerank candidate pool size (default: search.rerank_pool_size)
    #[arg(long)]
    pool: Option<usize>,

    /// Include parent-expanded context blocks
    #[arg(long)]
    with_context: bool,
}

#[derive(Args)]
#[command(group(ArgGroup::new("target").required(true).args(["doc_id", "chunk_id"])))]
struct DeleteArgs {
    /// Delete every chunk of this document
    #[arg(long)]
    doc_id: Option<String>,

    /// Delete every record carrying this chunk id
    #[arg(long)]
    chunk_id: Option<String>,
}

#[derive(Args)]
struct CompactArgs {
    /// Rebuild into this backend (default: store.backend)
    #[arg(long, value_enum)]
    backend: Option<BackendFlag>,
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let mut config = RetrievalConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.store.data_dir = dir;
    }
    let out = Output { json: cli.json };

    match cli.command {
        Commands::Ingest(args) => run_ingest(args, &config, out).await,
        Commands::Search(args) => run_search(args, &config, out).await,
        Commands::Delete(args) => run_delete(args, &config, out).await,
        Commands::Compact(args) => run_compact(args, &config, out).await,
        Commands::Stats => run_stats(&config, out).await,
    }
}

async fn open_store(config: &RetrievalConfig) -> Result<(StoreHandle, Vec<String>)> {
    let layout = config.layout();
    StoreHandle::open(&layout, config.store.dim, config.store.backend)
        .await
        .with_context(|| format!("Failed to open store at {}", config.store.data_dir.display()))
}

async fn save_store(handle: &StoreHandle, config: &RetrievalConfig) -> Result<()> {
    handle
        .snapshot(&config.layout())
        .await
        .with_context(|| format!("Failed to save store to {}", config.store.data_dir.display()))
}

fn embedder(config: &RetrievalConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.embedding.mode {
        EmbeddingMode::Stub => Ok(Arc::new(HashEmbedder::new(config.store.dim)?)),
    }
}

async fn run_ingest(args: IngestArgs, config: &RetrievalConfig, out: Output) -> Result<()> {
    let text = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let mut chunking = config.chunking.clone();
    if args.hierarchical {
        chunking.strategy = ChunkingStrategy::ParentChild;
    }
    let chunker = Chunker::new(chunking)?;
    let ingestor =
        Ingestor::new(chunker, embedder(config)?).with_batch_size(config.embedding.batch_size);

    let source_name = args.source_name.or_else(|| {
        args.file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    });
    let mut template = Chunk::default();
    template.source_name = source_name;
    for (key, value) in args.meta {
        template.set_field(key, value);
    }

    let (handle, _) = open_store(config).await?;
    let report = ingestor
        .ingest(
            &handle,
            IngestRequest {
                text,
                doc_id: args.doc_id,
                template,
            },
        )
        .await?;
    save_store(&handle, config).await?;

    out.emit(
        &IngestOutput {
            doc_id: report.doc_id,
            chunks: report.embedded,
            parents: report.parents,
            first_position: report.positions.start,
            end_position: report.positions.end,
        },
        render_ingest,
    )
}

async fn run_search(args: SearchArgs, config: &RetrievalConfig, out: Output) -> Result<()> {
    if args.query.trim().is_empty() {
        bail!("Query must not be empty");
    }
    let (handle, _) = open_store(config).await?;
    let query = embedder(config)?.embed(&args.query).await?;
    let retriever = Retriever::new(config.search.clone())?;

    let mut filters = Filters::exact(args.filters);
    for (key, value) in args.boosts.iter().cloned() {
        filters = filters.soft(key, value);
    }
    let reranked = args.rerank || !args.boosts.is_empty();

    let (results, context) = {
        let (store, parents) = handle.read_all();
        let results = if reranked {
            retriever.search_with_reranking(&store, &query, args.k, &filters, args.pool)?
        } else {
            retriever.search(&store, &query, args.k, &filters)?
        };
        let context = args
            .with_context
            .then(|| retriever.assemble_context(&parents, &results));
        (results, context)
    };

    out.emit(
        &SearchOutput {
            query: args.query,
            k: args.k,
            reranked,
            results,
            context,
        },
        render_search,
    )
}

async fn run_delete(args: DeleteArgs, config: &RetrievalConfig, out: Output) -> Result<()> {
    let (handle, _) = open_store(config).await?;
    let output = match (args.doc_id, args.chunk_id) {
        (Some(doc_id), _) => {
            let report = handle.delete_document(&doc_id);
            DeleteOutput {
                target: format!("document {doc_id}"),
                records: report.records,
                parents: report.parents,
            }
        }
        (None, Some(chunk_id)) => {
            let records = handle.write().soft_delete_by_chunk_id(&chunk_id);
            DeleteOutput {
                target: format!("chunk {chunk_id}"),
                records,
                parents: 0,
            }
        }
        (None, None) => bail!("Either --doc-id or --chunk-id is required"),
    };
    if output.records == 0 {
        log::warn!("Nothing matched {}", output.target);
    } else {
        save_store(&handle, config).await?;
    }
    out.emit(&output, render_delete)
}

async fn run_compact(args: CompactArgs, config: &RetrievalConfig, out: Output) -> Result<()> {
    let backend = args
        .backend
        .map_or(config.store.backend, BackendFlag::as_domain);
    let (handle, _) = open_store(config).await?;
    let removed = handle.compact_into(backend)?;
    save_store(&handle, config).await?;

    let remaining = handle.read().len();
    out.emit(&CompactOutput { removed, remaining }, render_compact)
}

async fn run_stats(config: &RetrievalConfig, out: Output) -> Result<()> {
    let (handle, warnings) = open_store(config).await?;
    let parents = handle.parents().len();
    out.emit(
        &StatsOutput {
            data_dir: config.store.data_dir.clone(),
            store: handle.stats(),
            parents,
            warnings,
        },
        render_stats,
    )
}
