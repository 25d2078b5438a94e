use anyhow::Result;
use retrieval_search::{ContextBlock, SearchResult};
use retrieval_vector_store::StoreStats;
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Debug, Serialize)]
pub(crate) struct IngestOutput {
    pub doc_id: String,
    pub chunks: usize,
    pub parents: usize,
    pub first_position: usize,
    pub end_position: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct SearchOutput {
    pub query: String,
    pub k: usize,
    pub reranked: bool,
    pub results: Vec<SearchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Vec<ContextBlock>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct DeleteOutput {
    pub target: String,
    pub records: usize,
    pub parents: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct CompactOutput {
    pub removed: usize,
    pub remaining: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct StatsOutput {
    pub data_dir: PathBuf,
    pub store: StoreStats,
    pub parents: usize,
    pub warnings: Vec<String>,
}

/// Renders command results as JSON or plain text on stdout
#[derive(Debug, Clone, Copy)]
pub(crate) struct Output {
    pub json: bool,
}

impl Output {
    pub(crate) fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce(&T) -> String) -> Result<()> {
        let text = if self.json {
            serde_json::to_string_pretty(value)?
        } else {
            human(value)
        };
        print_stdout(&text)
    }
}

fn print_stdout(text: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

pub(crate) fn render_ingest(out: &IngestOutput) -> String {
    format!(
        "Ingested {} ({} chunks, {} parents) at positions {}..{}",
        out.doc_id, out.chunks, out.parents, out.first_position, out.end_position
    )
}

pub(crate) fn render_search(out: &SearchOutput) -> String {
    if out.results.is_empty() {
        return format!("No results for \"{}\"", out.query);
    }

    let mut text = String::new();
    for (rank, result) in out.results.iter().enumerate() {
        text.push_str(&format!(
            "{}. [{:.4}] {} ({})",
            rank + 1,
            result.score,
            result.chunk_id,
            result.metadata.doc_id
        ));
        if out.reranked {
            text.push_str(&format!(" similarity={:.4}", result.similarity));
        }
        text.push('\n');
        text.push_str(&format!("    {}\n", truncate_one_line(&result.content, 120)));
    }

    if let Some(context) = &out.context {
        text.push_str("\nContext:\n");
        for block in context {
            let label = if block.expanded { "parent" } else { "chunk" };
            text.push_str(&format!(
                "--- {label} {} (covers {})\n{}\n",
                block.id,
                block.chunk_ids.join(", "),
                block.text
            ));
        }
    }
    text.trim_end().to_string()
}

pub(crate) fn render_delete(out: &DeleteOutput) -> String {
    format!(
        "Deleted {}: {} records soft-deleted, {} parents removed",
        out.target, out.records, out.parents
    )
}

pub(crate) fn render_compact(out: &CompactOutput) -> String {
    format!(
        "Compacted store: removed {}, {} remaining",
        out.removed, out.remaining
    )
}

pub(crate) fn render_stats(out: &StatsOutput) -> String {
    let s = &out.store;
    let mut text = format!(
        "Data dir:     {}\nBackend:      {} (dim {})\nRecords:      {} ({} active, {} soft-deleted, {} detached)\nDocuments:    {}\nParents:      {}\nIndex bytes:  {}",
        out.data_dir.display(),
        s.index.backend.as_str(),
        s.index.dim,
        s.records,
        s.active,
        s.soft_deleted,
        s.detached,
        s.documents,
        out.parents,
        s.index.bytes
    );
    for warning in &out.warnings {
        text.push_str(&format!("\nWarning:      {warning}"));
    }
    text
}

fn truncate_one_line(text: &str, max_chars: usize) -> String {
    let line: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if line.chars().count() <= max_chars {
        return line;
    }
    let mut cut: String = line.chars().take(max_chars).collect();
    cut.push('…');
    cut
}
