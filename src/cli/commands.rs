//! Command implementations for the Quarry CLI.

use std::time::Instant;

use crate::batch;
use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::EvalConfig;
use crate::error::Result;
use crate::index::{IndexStore, MemoryIndex};
use crate::query::QueryParser;
use crate::search::engine::SearchEngine;

/// Execute a CLI command.
pub fn execute_command(args: QuarryArgs) -> Result<()> {
    match &args.command {
        Command::Run(run_args) => run_batch(run_args, &args),
        Command::Search(search_args) => search_index(search_args, &args),
        Command::Stats(stats_args) => show_stats(stats_args, &args),
    }
}

/// Run a query file.
fn run_batch(args: &RunArgs, cli_args: &QuarryArgs) -> Result<()> {
    let mut config = EvalConfig::load(&args.param_file)?;
    if args.parallel {
        config.parallel = true;
    }
    let model = config.retrieval_model()?;

    let start = Instant::now();
    let report = batch::run_config(&config)?;

    output_result(
        "Batch run finished",
        &RunResult {
            output_path: config.trec_eval_output_path.to_string_lossy().to_string(),
            model: model.to_string(),
            queries: report.queries,
            failed: report.failed,
            lines: report.lines,
            duration_ms: start.elapsed().as_millis() as u64,
        },
        cli_args,
    )
}

/// Evaluate one query and print the top documents.
fn search_index(args: &SearchArgs, cli_args: &QuarryArgs) -> Result<()> {
    let model = args.retrieval_model()?;
    let index = MemoryIndex::from_jsonl(&args.index_path)?;
    let parser = QueryParser::new()
        .with_default_field(&args.field)
        .with_analyzer(index.analyzer().clone());
    let engine = SearchEngine::new(&index).with_parser(parser);

    let start = Instant::now();
    let results = engine.search(&args.query, &model)?;
    let duration_ms = start.elapsed().as_millis() as u64;

    let mut hits = Vec::with_capacity(results.len().min(args.limit));
    for (rank, entry) in results.iter().take(args.limit).enumerate() {
        hits.push(SearchHit {
            rank: rank + 1,
            doc_id: index.external_id(entry.doc_id)?,
            score: entry.score,
        });
    }

    output_result(
        &format!("Results for {} under {model}", args.query),
        &SearchResults {
            query: args.query.clone(),
            model: model.to_string(),
            hits,
            total_hits: results.len(),
            duration_ms,
        },
        cli_args,
    )
}

/// Show per-field statistics of a collection.
fn show_stats(args: &StatsArgs, cli_args: &QuarryArgs) -> Result<()> {
    let index = MemoryIndex::from_jsonl(&args.index_path)?;

    let mut fields = Vec::new();
    for name in index.field_names() {
        fields.push(FieldStats {
            documents: index.doc_count_with_field(&name)?,
            total_length: index.sum_field_lengths(&name)?,
            average_length: index.average_field_length(&name)?,
            unique_terms: index.num_terms(&name),
            name,
        });
    }

    output_result(
        "Collection statistics",
        &IndexStats {
            path: args.index_path.to_string_lossy().to_string(),
            total_documents: index.num_docs(),
            fields,
        },
        cli_args,
    )
}
