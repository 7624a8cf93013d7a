mod aggregate;
mod config;
mod error;
mod evidence;
mod markup;
mod matcher;
mod normalize;
mod pipeline;
mod scanner;
mod table;
mod topics;
mod types;
mod weights;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use score_types::{ResultsKind, RunSummary};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use config::ScoringConfig;
use pipeline::Pipeline;
use scanner::ResultsDocument;
use table::InputTable;
use topics::TopicVocabulary;

#[derive(Parser)]
#[command(
    name = "theme_score",
    about = "Topic scoring for annotated extraction results"
)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Score a results CSV, or every results CSV under a directory
    Score {
        #[arg(default_value = ".")]
        path: PathBuf,
        #[arg(long, value_enum, default_value_t = Kind::Batch)]
        kind: Kind,
        /// JSON file overriding weights, labels, markers or topics
        #[arg(long)]
        config: Option<PathBuf>,
        /// Write artifacts here instead of next to each input
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Parse every annotation and report the rows that fail
    Check {
        path: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the topic vocabulary with display names
    Topics {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum Kind {
    Batch,
    Api,
}

impl From<Kind> for ResultsKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Batch => ResultsKind::Batch,
            Kind::Api => ResultsKind::Api,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Command::Score {
            path,
            kind,
            config,
            output_dir,
        }) => run_score(&path, kind.into(), config.as_deref(), output_dir.as_deref()),
        Some(Command::Check { path, config }) => run_check(&path, config.as_deref()),
        Some(Command::Topics { config }) => run_topics(config.as_deref()),
        // Default: score the current directory
        None => run_score(Path::new("."), ResultsKind::Batch, None, None),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<(ScoringConfig, TopicVocabulary)> {
    let config = ScoringConfig::load(path).context("cannot load scoring config")?;
    let vocab = config.vocabulary();
    Ok((config, vocab))
}

// ═══════════════════════════════════════════════════════════════════════
//  OUTPUT FILE HELPERS
// ═══════════════════════════════════════════════════════════════════════

fn render_json<T: serde::Serialize>(data: &T) -> Result<Vec<u8>> {
    let json = serde_json::to_string_pretty(data).context("JSON serialization failed")?;
    Ok(json.into_bytes())
}

/// Write a document's artifacts all together or not at all.
fn write_outputs(artifacts: &[(PathBuf, Vec<u8>)]) -> Result<()> {
    scanner::write_artifacts(artifacts)?;
    for (path, bytes) in artifacts {
        eprintln!("  {} ({} bytes)", path.display(), bytes.len());
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
//  TOPICS MODE: print the vocabulary
// ═══════════════════════════════════════════════════════════════════════

fn run_topics(config: Option<&Path>) -> Result<()> {
    let (_, vocab) = load_config(config)?;
    for pos in vocab.presentation_order() {
        let id = &vocab.ids()[pos];
        println!("{id}\t{}", vocab.display_name(id));
    }
    eprintln!("\nTotal: {} topics", vocab.len());
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
//  CHECK MODE: report unparseable annotations
// ═══════════════════════════════════════════════════════════════════════

fn run_check(root: &Path, config: Option<&Path>) -> Result<()> {
    let (config, vocab) = load_config(config)?;
    let pipeline = Pipeline::new(&config, &vocab, ResultsKind::Batch);

    let docs = scanner::scan_documents(root);
    if docs.is_empty() {
        bail!("no results documents found under {}", root.display());
    }

    let mut failed = 0usize;
    for doc in &docs {
        let table = InputTable::read_path(&doc.path)?;
        let failures = pipeline
            .check(&table)
            .with_context(|| format!("cannot check {}", doc.path.display()))?;
        eprintln!(
            "{}: {} rows, {} unparseable",
            doc.path.display(),
            table.len(),
            failures.len()
        );
        for (row, e) in failures.iter().take(30) {
            eprintln!("  row {row}: {e}");
        }
        if failures.len() > 30 {
            eprintln!("  ... and {} more", failures.len() - 30);
        }
        failed += failures.len();
    }

    if failed > 0 {
        bail!("{failed} annotation(s) cannot be parsed");
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
//  SCORE MODE: results CSV → scored, aggregated and evidence CSVs
// ═══════════════════════════════════════════════════════════════════════

fn run_score(
    root: &Path,
    kind: ResultsKind,
    config: Option<&Path>,
    output_dir: Option<&Path>,
) -> Result<()> {
    let (config, vocab) = load_config(config)?;
    info!(topics = vocab.len(), "vocabulary loaded");

    eprintln!("Scanning for results documents at: {}", root.display());
    let docs = scanner::scan_documents(root);
    if docs.is_empty() {
        bail!("no results documents found under {}", root.display());
    }
    eprintln!("Found {} document(s)", docs.len());

    if let Some(dir) = output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("cannot create {}", dir.display()))?;
    }

    let pipeline = Pipeline::new(&config, &vocab, kind);
    let mut failed = Vec::new();
    for doc in &docs {
        match score_document(&pipeline, &vocab, doc, output_dir) {
            Ok(summary) => print_report(&summary),
            Err(e) => {
                error!(document = %doc.path.display(), "{e:#}");
                failed.push(doc.path.display().to_string());
            }
        }
    }

    if !failed.is_empty() {
        eprintln!("\n══════════════════════════════════════════");
        eprintln!("  FAILED DOCUMENTS ({} total)", failed.len());
        eprintln!("══════════════════════════════════════════");
        for f in &failed {
            eprintln!("  {f}");
        }
        bail!("{} of {} document(s) failed", failed.len(), docs.len());
    }
    Ok(())
}

/// Run the pipeline for one document; files are written only after it succeeds.
fn score_document(
    pipeline: &Pipeline,
    vocab: &TopicVocabulary,
    doc: &ResultsDocument,
    output_dir: Option<&Path>,
) -> Result<RunSummary> {
    let table = InputTable::read_path(&doc.path)?;
    let output = pipeline
        .run(&table)
        .with_context(|| format!("cannot score {}", doc.path.display()))?;

    let mut artifacts = vec![
        (
            doc.artifact(output_dir, "_wScoring", "csv"),
            table::render_scored(&table, &output.rows, vocab)?,
        ),
        (
            doc.artifact(output_dir, "_wAggregateScoring", "csv"),
            table::render_aggregated(&output.aggregation.rows, &output.layout, vocab)?,
        ),
        (
            doc.artifact(output_dir, "_wText_Extraction", "csv"),
            table::render_evidence(&output.evidence.rows, &output.layout, vocab)?,
        ),
    ];

    let mut summary = pipeline.summary(&output);
    summary.document = doc.path.display().to_string();
    summary.outputs = artifacts
        .iter()
        .map(|(path, _)| path.display().to_string())
        .collect();
    artifacts.push((
        doc.artifact(output_dir, "_summary", "json"),
        render_json(&summary)?,
    ));

    eprintln!("\nWriting output files for {}:", doc.stem);
    write_outputs(&artifacts)
        .with_context(|| format!("cannot write outputs for {}", doc.path.display()))?;
    Ok(summary)
}

fn print_report(summary: &RunSummary) {
    eprintln!("\n══════════════════════════════════════════");
    eprintln!("  SCORING STATISTICS");
    eprintln!("══════════════════════════════════════════");
    eprintln!("\n{} ({})", summary.document, summary.kind.as_str());
    eprintln!("  Rows:       {}", summary.rows);
    eprintln!("  Matched:    {}", summary.matched_rows);
    eprintln!("  Unmatched:  {}", summary.unmatched_rows);
    eprintln!("  Negated:    {}", summary.negated_rows);
    eprintln!("  Groups:     {}", summary.groups);
    eprintln!("  Evidence:   {} rows", summary.evidence_rows);
    if summary.skipped_rows > 0 {
        eprintln!("  Skipped:    {} (empty grouping value)", summary.skipped_rows);
    }
    if !summary.dropped_columns.is_empty() {
        eprintln!("  Dropped:    {}", summary.dropped_columns.join(", "));
    }

    let mut topics: Vec<_> = summary.topics.iter().collect();
    topics.sort_by_key(|t| std::cmp::Reverse(t.positive_groups + t.negative_groups));
    eprintln!("\nTopics (top 15 by groups):");
    for t in topics.iter().take(15) {
        eprintln!(
            "  {}: +{} / -{} groups",
            t.name, t.positive_groups, t.negative_groups
        );
    }

    if !summary.unknown_topics.is_empty() {
        eprintln!("\nUnknown topics:");
        for (topic, count) in &summary.unknown_topics {
            eprintln!("  {topic}: {count} rows");
        }
    }
}
