//! Batch evaluation of a query file into a TREC run file.
//!
//! Queries are read as `qid:query` lines, evaluated under one retrieval
//! model and written in the six-column TREC format:
//!
//! ```text
//! 10 Q0 clueweb09-en0000-00-00000 1 0.123456789012345678 quarry
//! ```
//!
//! A query that fails is logged and skipped; the rest of the batch still
//! runs.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use ahash::AHashMap;
use anyhow::Context;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_OUTPUT_LENGTH, DEFAULT_RUN_ID, EvalConfig};
use crate::error::{QuarryError, Result};
use crate::feedback::{FeedbackParams, QueryExpander};
use crate::index::{IndexStore, MemoryIndex};
use crate::model::RetrievalModel;
use crate::search::collector::ScoreList;
use crate::search::engine::SearchEngine;

/// One line of a query file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchQuery {
    /// Query id, written in the first column of the run file.
    pub qid: String,
    /// Query text.
    pub query: String,
}

impl BatchQuery {
    /// Parse a `qid:query` line. The line is split at the first `:`.
    pub fn parse(line: &str) -> Result<Self> {
        let Some((qid, query)) = line.split_once(':') else {
            return Err(QuarryError::query(format!("missing ':' in query line '{line}'")));
        };
        let qid = qid.trim();
        if qid.is_empty() {
            return Err(QuarryError::query(format!("missing query id in '{line}'")));
        }
        Ok(BatchQuery {
            qid: qid.to_string(),
            query: query.trim().to_string(),
        })
    }
}

/// Parse a query file. Every non-blank line yields an entry, malformed lines
/// included, so failures can be reported in order.
pub fn parse_queries(text: &str) -> Vec<Result<BatchQuery>> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(BatchQuery::parse)
        .collect()
}

/// Read and parse a query file.
pub fn read_queries<P: AsRef<Path>>(path: P) -> Result<Vec<Result<BatchQuery>>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read query file {}", path.display()))?;
    Ok(parse_queries(&text))
}

/// Format the TREC lines of one query.
///
/// At most `max_lines` results are written; an empty result list is written
/// as a single `dummy` line so the query still appears in the run.
pub fn format_trec_lines(
    qid: &str,
    results: &ScoreList,
    index: &dyn IndexStore,
    max_lines: usize,
    run_id: &str,
) -> Result<Vec<String>> {
    if results.is_empty() {
        return Ok(vec![format!("{qid} Q0 dummy 1 0 {run_id}")]);
    }
    let mut lines = Vec::with_capacity(results.len().min(max_lines));
    for (rank, entry) in results.iter().take(max_lines).enumerate() {
        let external_id = index.external_id(entry.doc_id)?;
        lines.push(format!(
            "{qid} Q0 {external_id} {} {:.18} {run_id}",
            rank + 1,
            entry.score
        ));
    }
    Ok(lines)
}

/// Read an initial ranking in TREC format.
///
/// Only the first `max_docs` documents of each query are kept, in file order.
/// Document ids are translated to internal ids through the index.
pub fn read_trec_run<R: BufRead>(
    reader: R,
    index: &dyn IndexStore,
    max_docs: usize,
) -> Result<AHashMap<String, ScoreList>> {
    let mut rankings: AHashMap<String, ScoreList> = AHashMap::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let columns: Vec<&str> = line.split_whitespace().collect();
        if columns.is_empty() {
            continue;
        }
        let &[qid, _, external_id, _, score, ..] = columns.as_slice() else {
            return Err(QuarryError::other(format!(
                "line {}: expected 'qid Q0 docid rank score run', found '{line}'",
                line_no + 1
            )));
        };
        let ranking = rankings.entry(qid.to_string()).or_default();
        if ranking.len() >= max_docs {
            continue;
        }
        let score: f64 = score.parse().map_err(|_| {
            QuarryError::other(format!("line {}: invalid score '{score}'", line_no + 1))
        })?;
        ranking.add(index.internal_id(external_id)?, score);
    }
    Ok(rankings)
}

/// Result of one query of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    /// Ranked results, sorted.
    pub results: ScoreList,
    /// Expansion query, when feedback produced one.
    pub expansion: Option<String>,
}

/// Summary of a batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Query lines seen.
    pub queries: usize,
    /// Queries that failed and were skipped.
    pub failed: usize,
    /// Lines written to the run file.
    pub lines: usize,
}

/// Runs a list of queries under one retrieval model.
#[derive(Debug, Clone)]
pub struct BatchRunner<'a> {
    engine: SearchEngine<'a>,
    model: RetrievalModel,
    output_length: usize,
    run_id: String,
    parallel: bool,
    feedback: Option<FeedbackParams>,
    initial_rankings: Option<AHashMap<String, ScoreList>>,
}

impl<'a> BatchRunner<'a> {
    /// Create a sequential runner without feedback.
    pub fn new(index: &'a dyn IndexStore, model: RetrievalModel) -> Self {
        BatchRunner {
            engine: SearchEngine::new(index),
            model,
            output_length: DEFAULT_OUTPUT_LENGTH,
            run_id: DEFAULT_RUN_ID.to_string(),
            parallel: false,
            feedback: None,
            initial_rankings: None,
        }
    }

    /// Create a runner from a configuration, reading the initial ranking
    /// file when one is configured.
    pub fn from_config(index: &'a dyn IndexStore, config: &EvalConfig) -> Result<Self> {
        let mut runner = BatchRunner::new(index, config.retrieval_model()?)
            .with_output_length(config.trec_eval_output_length)
            .with_run_id(config.run_id.clone())
            .with_parallel(config.parallel);

        if let Some(params) = config.feedback()? {
            runner = runner.with_feedback(params);
            if let Some(path) = &config.fb_initial_ranking_file {
                let file = File::open(path).with_context(|| {
                    format!("cannot open initial ranking file {}", path.display())
                })?;
                let reader = BufReader::new(file);
                let rankings = read_trec_run(reader, index, params.docs)?;
                log::debug!(
                    "read initial rankings for {} queries from {}",
                    rankings.len(),
                    path.display()
                );
                runner = runner.with_initial_rankings(rankings);
            }
        }
        Ok(runner)
    }

    /// Maximum number of lines written per query.
    pub fn with_output_length(mut self, output_length: usize) -> Self {
        self.output_length = output_length;
        self
    }

    /// Tag written in the last column.
    pub fn with_run_id<S: Into<String>>(mut self, run_id: S) -> Self {
        self.run_id = run_id.into();
        self
    }

    /// Evaluate queries on the rayon thread pool.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Expand every query with pseudo relevance feedback.
    pub fn with_feedback(mut self, params: FeedbackParams) -> Self {
        self.feedback = Some(params);
        self
    }

    /// Use precomputed initial rankings, keyed by query id, for feedback.
    pub fn with_initial_rankings(mut self, rankings: AHashMap<String, ScoreList>) -> Self {
        self.initial_rankings = Some(rankings);
        self
    }

    /// The retrieval model.
    pub fn model(&self) -> &RetrievalModel {
        &self.model
    }

    /// Evaluate one query, with feedback when enabled.
    pub fn run_query(&self, query: &BatchQuery) -> Result<QueryOutcome> {
        let Some(params) = self.feedback else {
            return Ok(QueryOutcome {
                results: self.engine.search(&query.query, &self.model)?,
                expansion: None,
            });
        };

        let initial = match self
            .initial_rankings
            .as_ref()
            .and_then(|rankings| rankings.get(&query.qid))
        {
            Some(ranking) => ranking.clone(),
            None => self.engine.search(&query.query, &self.model)?,
        };

        let expander = QueryExpander::new(self.engine.index(), params);
        let Some(expansion) = expander.expansion_query(&initial)? else {
            log::debug!("query {}: no expansion terms", query.qid);
            return Ok(QueryOutcome {
                results: self.engine.search(&query.query, &self.model)?,
                expansion: None,
            });
        };

        let expanded = expander.expanded_query(&query.query, &expansion);
        log::debug!("query {}: expanded to {expanded}", query.qid);
        Ok(QueryOutcome {
            results: self.engine.search(&expanded, &self.model)?,
            expansion: Some(expansion),
        })
    }

    /// Evaluate every query, in parallel when enabled. Outcomes are returned
    /// in input order.
    pub fn evaluate_all(&self, queries: &[BatchQuery]) -> Vec<Result<QueryOutcome>> {
        if self.parallel {
            queries.par_iter().map(|query| self.run_query(query)).collect()
        } else {
            queries.iter().map(|query| self.run_query(query)).collect()
        }
    }

    /// Evaluate the queries and write the run file.
    ///
    /// Expansion queries are written to `expansions` as `qid: query` lines
    /// when a writer is given. Malformed lines and failed queries are logged
    /// and skipped.
    pub fn run<W: Write>(
        &self,
        queries: &[Result<BatchQuery>],
        out: &mut W,
        mut expansions: Option<&mut dyn Write>,
    ) -> Result<BatchReport> {
        let mut report = BatchReport {
            queries: queries.len(),
            ..BatchReport::default()
        };
        let mut valid = Vec::with_capacity(queries.len());
        for query in queries {
            match query {
                Ok(query) => valid.push(query.clone()),
                Err(e) => {
                    log::warn!("skipping query line: {e}");
                    report.failed += 1;
                }
            }
        }

        let outcomes = self.evaluate_all(&valid);
        for (query, outcome) in valid.iter().zip(outcomes) {
            let outcome = match outcome {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::warn!("skipping query {}: {e}", query.qid);
                    report.failed += 1;
                    continue;
                }
            };

            let lines = format_trec_lines(
                &query.qid,
                &outcome.results,
                self.engine.index(),
                self.output_length,
                &self.run_id,
            );
            let lines = match lines {
                Ok(lines) => lines,
                Err(e) => {
                    log::warn!("skipping query {}: {e}", query.qid);
                    report.failed += 1;
                    continue;
                }
            };
            for line in &lines {
                writeln!(out, "{line}")?;
            }
            report.lines += lines.len();

            if let (Some(writer), Some(expansion)) = (expansions.as_mut(), &outcome.expansion) {
                writeln!(writer, "{}: {expansion}", query.qid)?;
            }
        }
        out.flush()?;

        log::info!(
            "{} queries, {} failed, {} lines written",
            report.queries,
            report.failed,
            report.lines
        );
        Ok(report)
    }
}

/// Run a whole batch as described by a configuration: load the index, read
/// the query file and write the run file.
pub fn run_config(config: &EvalConfig) -> Result<BatchReport> {
    let index = MemoryIndex::from_jsonl(&config.index_path)?;
    let queries = read_queries(&config.query_file_path)?;
    let runner = BatchRunner::from_config(&index, config)?;
    log::info!(
        "running {} queries from {} under {}",
        queries.len(),
        config.query_file_path.display(),
        runner.model()
    );

    let output_path = &config.trec_eval_output_path;
    let file = File::create(output_path)
        .with_context(|| format!("cannot create run file {}", output_path.display()))?;
    let mut out = BufWriter::new(file);
    match &config.fb_expansion_query_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open expansion file {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            let report = runner.run(&queries, &mut out, Some(&mut writer))?;
            writer.flush()?;
            Ok(report)
        }
        None => runner.run(&queries, &mut out, None),
    }
}
