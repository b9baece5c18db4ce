//! Command line argument parsing for the Quarry CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{Bm25Params, IndriParams, RetrievalModel};

/// Quarry - structured queries ranked with boolean, BM25 and Indri models
#[derive(Parser, Debug, Clone)]
#[command(name = "quarry")]
#[command(about = "Evaluate structured queries against a document collection")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct QuarryArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl QuarryArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run a query file as described by a parameter file
    Run(RunArgs),

    /// Evaluate a single query
    Search(SearchArgs),

    /// Show collection statistics
    Stats(StatsArgs),
}

/// Arguments for a batch run
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Parameter file (`key=value` lines, or JSON with a .json extension)
    #[arg(value_name = "PARAM_FILE")]
    pub param_file: PathBuf,

    /// Evaluate queries in parallel
    #[arg(long)]
    pub parallel: bool,
}

/// Arguments for searching
#[derive(Parser, Debug, Clone)]
pub struct SearchArgs {
    /// Document collection (JSON lines)
    #[arg(value_name = "INDEX_PATH")]
    pub index_path: PathBuf,

    /// Query string
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Retrieval model
    #[arg(short, long, default_value = "bm25")]
    pub model: ModelChoice,

    /// Field searched by terms without a field prefix
    #[arg(long, default_value = "body")]
    pub field: String,

    /// BM25 k1
    #[arg(long)]
    pub k1: Option<f64>,

    /// BM25 k3
    #[arg(long)]
    pub k3: Option<f64>,

    /// BM25 b
    #[arg(long)]
    pub b: Option<f64>,

    /// Indri Dirichlet prior
    #[arg(long)]
    pub mu: Option<f64>,

    /// Indri collection mixing weight
    #[arg(long)]
    pub lambda: Option<f64>,

    /// Maximum number of results to return
    #[arg(short, long, default_value = "10")]
    pub limit: usize,
}

impl SearchArgs {
    /// Build the retrieval model, filling unset parameters with defaults.
    pub fn retrieval_model(&self) -> Result<RetrievalModel> {
        let model = match self.model {
            ModelChoice::UnrankedBoolean => RetrievalModel::UnrankedBoolean,
            ModelChoice::RankedBoolean => RetrievalModel::RankedBoolean,
            ModelChoice::Bm25 => {
                let defaults = Bm25Params::default();
                RetrievalModel::Bm25(Bm25Params::new(
                    self.k1.unwrap_or(defaults.k1),
                    self.k3.unwrap_or(defaults.k3),
                    self.b.unwrap_or(defaults.b),
                )?)
            }
            ModelChoice::Indri => {
                let defaults = IndriParams::default();
                RetrievalModel::Indri(IndriParams::new(
                    self.mu.unwrap_or(defaults.mu),
                    self.lambda.unwrap_or(defaults.lambda),
                )?)
            }
        };
        Ok(model)
    }
}

/// Arguments for showing statistics
#[derive(Parser, Debug, Clone)]
pub struct StatsArgs {
    /// Document collection (JSON lines)
    #[arg(value_name = "INDEX_PATH")]
    pub index_path: PathBuf,
}

/// Retrieval model selectable on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelChoice {
    /// Boolean matching, every match scores 1
    #[value(name = "unrankedboolean")]
    UnrankedBoolean,
    /// Boolean matching scored by term frequency
    #[value(name = "rankedboolean")]
    RankedBoolean,
    /// Okapi BM25
    Bm25,
    /// Indri query likelihood
    Indri,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        let args = QuarryArgs::try_parse_from(["quarry", "stats", "docs.jsonl"]).unwrap();
        assert_eq!(args.verbosity(), 1);

        let args = QuarryArgs::try_parse_from(["quarry", "-vv", "stats", "docs.jsonl"]).unwrap();
        assert_eq!(args.verbosity(), 2);

        let args =
            QuarryArgs::try_parse_from(["quarry", "--quiet", "-vvv", "stats", "docs.jsonl"])
                .unwrap();
        assert_eq!(args.verbosity(), 0);
    }

    #[test]
    fn test_output_format() {
        let args =
            QuarryArgs::try_parse_from(["quarry", "--format", "json", "stats", "docs.jsonl"])
                .unwrap();
        assert_eq!(args.output_format, OutputFormat::Json);
    }

    #[test]
    fn test_run_args() {
        let args =
            QuarryArgs::try_parse_from(["quarry", "run", "params.txt", "--parallel"]).unwrap();
        let Command::Run(run) = args.command else {
            panic!("Expected Run command");
        };
        assert_eq!(run.param_file, PathBuf::from("params.txt"));
        assert!(run.parallel);
    }

    #[test]
    fn test_search_model_parameters() {
        let args = QuarryArgs::try_parse_from([
            "quarry",
            "search",
            "docs.jsonl",
            "#and(apple pie)",
            "--model",
            "indri",
            "--mu",
            "1000",
        ])
        .unwrap();
        let Command::Search(search) = args.command else {
            panic!("Expected Search command");
        };
        assert_eq!(search.limit, 10);
        assert_eq!(
            search.retrieval_model().unwrap(),
            RetrievalModel::Indri(IndriParams::new(1000.0, 0.4).unwrap())
        );

        let args = QuarryArgs::try_parse_from(["quarry", "search", "docs.jsonl", "apple"]).unwrap();
        let Command::Search(search) = args.command else {
            panic!("Expected Search command");
        };
        assert_eq!(search.retrieval_model().unwrap(), RetrievalModel::default());
        assert_eq!(search.field, "body");

        let args = QuarryArgs::try_parse_from([
            "quarry",
            "search",
            "docs.jsonl",
            "apple",
            "--field",
            "title",
        ])
        .unwrap();
        let Command::Search(search) = args.command else {
            panic!("Expected Search command");
        };
        assert_eq!(search.field, "title");
    }

    #[test]
    fn test_invalid_model_parameter() {
        let args = QuarryArgs::try_parse_from([
            "quarry", "search", "docs.jsonl", "apple", "--model", "bm25", "--b", "2",
        ])
        .unwrap();
        let Command::Search(search) = args.command else {
            panic!("Expected Search command");
        };
        assert!(search.retrieval_model().is_err());
    }
}
