//! Output formatting for CLI commands.

use serde::{Deserialize, Serialize};

use crate::cli::args::{OutputFormat, QuarryArgs};
use crate::error::Result;

/// Result structure for a batch run.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunResult {
    pub output_path: String,
    pub model: String,
    pub queries: usize,
    pub failed: usize,
    pub lines: usize,
    pub duration_ms: u64,
}

/// One ranked document.
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchHit {
    pub rank: usize,
    pub doc_id: String,
    pub score: f64,
}

/// Result structure for search operations.
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResults {
    pub query: String,
    pub model: String,
    pub hits: Vec<SearchHit>,
    pub total_hits: usize,
    pub duration_ms: u64,
}

/// Collection statistics.
#[derive(Debug, Serialize, Deserialize)]
pub struct IndexStats {
    pub path: String,
    pub total_documents: u64,
    pub fields: Vec<FieldStats>,
}

/// Field-specific statistics.
#[derive(Debug, Serialize, Deserialize)]
pub struct FieldStats {
    pub name: String,
    pub documents: u64,
    pub total_length: u64,
    pub average_length: f64,
    pub unique_terms: usize,
}

/// Human-readable rendering of a command result.
pub trait HumanOutput {
    fn print_human(&self);
}

impl HumanOutput for RunResult {
    fn print_human(&self) {
        println!("Run file: {}", self.output_path);
        println!("Model: {}", self.model);
        println!(
            "Queries: {} ({} failed), {} lines written in {}ms",
            self.queries, self.failed, self.lines, self.duration_ms
        );
    }
}

impl HumanOutput for SearchResults {
    fn print_human(&self) {
        println!("Search Results:");
        println!("═══════════════");
        for hit in &self.hits {
            println!("{:>4}  {:<24} {:.6}", hit.rank, hit.doc_id, hit.score);
        }
        println!();
        println!("Total hits: {}", self.total_hits);
        println!("Search time: {}ms", self.duration_ms);
    }
}

impl HumanOutput for IndexStats {
    fn print_human(&self) {
        println!("Index Statistics:");
        println!("════════════════");
        println!("Path: {}", self.path);
        println!("Total documents: {}", self.total_documents);
        if !self.fields.is_empty() {
            println!();
            println!("Field Statistics:");
            println!("────────────────");
            for field in &self.fields {
                println!(
                    "{}: {} docs, {} tokens (avg {:.2}), {} unique terms",
                    field.name,
                    field.documents,
                    field.total_length,
                    field.average_length,
                    field.unique_terms
                );
            }
        }
    }
}

/// Output a result in the specified format.
pub fn output_result<T: Serialize + HumanOutput>(
    message: &str,
    result: &T,
    args: &QuarryArgs,
) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => {
            if args.verbosity() > 1 {
                println!("{message}");
                println!();
            }
            result.print_human();
            Ok(())
        }
        OutputFormat::Json => output_json(result, args),
    }
}

/// Output in JSON format.
fn output_json<T: Serialize>(result: &T, args: &QuarryArgs) -> Result<()> {
    println!("{}", format_json(result, args.pretty)?);
    Ok(())
}

fn format_json<T: Serialize>(result: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    Ok(json)
}
