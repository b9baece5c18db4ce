//! Run configuration.
//!
//! A run is described by a flat set of named parameters. They can be read
//! from a `key=value` parameter file:
//!
//! ```text
//! indexPath=data/index.jsonl
//! queryFilePath=queries.txt
//! trecEvalOutputPath=run.teIn
//! retrievalAlgorithm=BM25
//! BM25:k_1=1.2
//! BM25:b=0.75
//! BM25:k_3=0
//! ```
//!
//! or from a JSON object with the same keys.

use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{QuarryError, Result};
use crate::feedback::FeedbackParams;
use crate::model::{Bm25Params, IndriParams, RetrievalModel};

/// Default number of result lines written per query.
pub const DEFAULT_OUTPUT_LENGTH: usize = 100;

/// Default run tag written in the last column of the TREC output.
pub const DEFAULT_RUN_ID: &str = "quarry";

/// Settings of a batch evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// JSONL file holding the documents to search.
    #[serde(rename = "indexPath")]
    pub index_path: PathBuf,

    /// File with one `qid:query` per line.
    #[serde(rename = "queryFilePath")]
    pub query_file_path: PathBuf,

    /// Where the TREC run file is written.
    #[serde(rename = "trecEvalOutputPath")]
    pub trec_eval_output_path: PathBuf,

    /// Maximum number of results written per query.
    #[serde(rename = "trecEvalOutputLength")]
    pub trec_eval_output_length: usize,

    /// `unrankedboolean`, `rankedboolean`, `bm25` or `indri`.
    #[serde(rename = "retrievalAlgorithm")]
    pub retrieval_algorithm: String,

    #[serde(rename = "BM25:k_1", skip_serializing_if = "Option::is_none")]
    pub bm25_k1: Option<f64>,

    #[serde(rename = "BM25:k_3", skip_serializing_if = "Option::is_none")]
    pub bm25_k3: Option<f64>,

    #[serde(rename = "BM25:b", skip_serializing_if = "Option::is_none")]
    pub bm25_b: Option<f64>,

    #[serde(rename = "Indri:mu", skip_serializing_if = "Option::is_none")]
    pub indri_mu: Option<f64>,

    #[serde(rename = "Indri:lambda", skip_serializing_if = "Option::is_none")]
    pub indri_lambda: Option<f64>,

    /// Enable pseudo relevance feedback.
    pub fb: bool,

    #[serde(rename = "fbDocs", skip_serializing_if = "Option::is_none")]
    pub fb_docs: Option<usize>,

    #[serde(rename = "fbTerms", skip_serializing_if = "Option::is_none")]
    pub fb_terms: Option<usize>,

    #[serde(rename = "fbMu", skip_serializing_if = "Option::is_none")]
    pub fb_mu: Option<f64>,

    #[serde(rename = "fbOrigWeight", skip_serializing_if = "Option::is_none")]
    pub fb_orig_weight: Option<f64>,

    /// TREC run file used as the initial ranking instead of a fresh search.
    #[serde(rename = "fbInitialRankingFile", skip_serializing_if = "Option::is_none")]
    pub fb_initial_ranking_file: Option<PathBuf>,

    /// File that receives the generated expansion queries.
    #[serde(rename = "fbExpansionQueryFile", skip_serializing_if = "Option::is_none")]
    pub fb_expansion_query_file: Option<PathBuf>,

    /// Run tag written in the last column of the TREC output.
    #[serde(rename = "runId")]
    pub run_id: String,

    /// Evaluate queries on the rayon thread pool.
    pub parallel: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            index_path: PathBuf::new(),
            query_file_path: PathBuf::new(),
            trec_eval_output_path: PathBuf::new(),
            trec_eval_output_length: DEFAULT_OUTPUT_LENGTH,
            retrieval_algorithm: String::new(),
            bm25_k1: None,
            bm25_k3: None,
            bm25_b: None,
            indri_mu: None,
            indri_lambda: None,
            fb: false,
            fb_docs: None,
            fb_terms: None,
            fb_mu: None,
            fb_orig_weight: None,
            fb_initial_ranking_file: None,
            fb_expansion_query_file: None,
            run_id: DEFAULT_RUN_ID.to_string(),
            parallel: false,
        }
    }
}

impl EvalConfig {
    /// Load a configuration file, as JSON when the extension is `.json` and
    /// as a parameter file otherwise.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            QuarryError::config(format!("can't read {}: {e}", path.display()))
        })?;
        log::debug!("loading configuration from {}", path.display());

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json(&text)
        } else {
            Self::from_parameters(&text)
        }
    }

    /// Load a `key=value` parameter file.
    pub fn from_parameter_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            QuarryError::config(format!("can't read {}: {e}", path.display()))
        })?;
        Self::from_parameters(&text)
    }

    /// Parse `key=value` lines. Blank lines and lines starting with `#` are
    /// skipped.
    pub fn from_parameters(text: &str) -> Result<Self> {
        let mut config = EvalConfig::default();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(QuarryError::config(format!(
                    "line {}: expected key=value, found '{line}'",
                    line_no + 1
                )));
            };
            config.set(key.trim(), value.trim())?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON object with the parameter file keys.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: EvalConfig = serde_json::from_str(text)
            .map_err(|e| QuarryError::config(format!("invalid JSON configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Set one parameter from its textual value.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "indexPath" => self.index_path = PathBuf::from(value),
            "queryFilePath" => self.query_file_path = PathBuf::from(value),
            "trecEvalOutputPath" => self.trec_eval_output_path = PathBuf::from(value),
            "trecEvalOutputLength" => self.trec_eval_output_length = parse_value(key, value)?,
            "retrievalAlgorithm" => self.retrieval_algorithm = value.to_string(),
            "BM25:k_1" => self.bm25_k1 = Some(parse_value(key, value)?),
            "BM25:k_3" => self.bm25_k3 = Some(parse_value(key, value)?),
            "BM25:b" => self.bm25_b = Some(parse_value(key, value)?),
            "Indri:mu" => self.indri_mu = Some(parse_value(key, value)?),
            "Indri:lambda" => self.indri_lambda = Some(parse_value(key, value)?),
            "fb" => self.fb = parse_value(key, &value.to_ascii_lowercase())?,
            "fbDocs" => self.fb_docs = Some(parse_value(key, value)?),
            "fbTerms" => self.fb_terms = Some(parse_value(key, value)?),
            "fbMu" => self.fb_mu = Some(parse_value(key, value)?),
            "fbOrigWeight" => self.fb_orig_weight = Some(parse_value(key, value)?),
            "fbInitialRankingFile" => self.fb_initial_ranking_file = Some(PathBuf::from(value)),
            "fbExpansionQueryFile" => self.fb_expansion_query_file = Some(PathBuf::from(value)),
            "runId" => self.run_id = value.to_string(),
            "parallel" => self.parallel = parse_value(key, &value.to_ascii_lowercase())?,
            _ => log::warn!("ignoring unknown parameter {key}"),
        }
        Ok(())
    }

    /// Check that the required parameters are present and consistent.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("indexPath", self.index_path.as_os_str().is_empty()),
            ("queryFilePath", self.query_file_path.as_os_str().is_empty()),
            ("trecEvalOutputPath", self.trec_eval_output_path.as_os_str().is_empty()),
            ("retrievalAlgorithm", self.retrieval_algorithm.is_empty()),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, absent)| *absent)
            .map(|(key, _)| *key)
            .collect();
        if !missing.is_empty() {
            return Err(QuarryError::config(format!(
                "required parameters missing: {}",
                missing.join(", ")
            )));
        }

        let model = self.retrieval_model()?;
        if self.feedback()?.is_some() && !matches!(model, RetrievalModel::Indri(_)) {
            return Err(QuarryError::config(format!(
                "query expansion needs the Indri model, not {}",
                model.name()
            )));
        }
        Ok(())
    }

    /// Build the retrieval model. Missing model parameters take their
    /// defaults.
    pub fn retrieval_model(&self) -> Result<RetrievalModel> {
        let model = match RetrievalModel::from_name(&self.retrieval_algorithm)? {
            RetrievalModel::Bm25(defaults) => RetrievalModel::Bm25(Bm25Params::new(
                self.bm25_k1.unwrap_or(defaults.k1),
                self.bm25_k3.unwrap_or(defaults.k3),
                self.bm25_b.unwrap_or(defaults.b),
            )?),
            RetrievalModel::Indri(defaults) => RetrievalModel::Indri(IndriParams::new(
                self.indri_mu.unwrap_or(defaults.mu),
                self.indri_lambda.unwrap_or(defaults.lambda),
            )?),
            boolean => boolean,
        };
        Ok(model)
    }

    /// Feedback parameters, or `None` when feedback is disabled.
    ///
    /// With feedback enabled, `fbDocs`, `fbTerms`, `fbMu` and
    /// `fbOrigWeight` are all required.
    pub fn feedback(&self) -> Result<Option<FeedbackParams>> {
        if !self.fb {
            return Ok(None);
        }
        let (Some(docs), Some(terms), Some(mu), Some(orig_weight)) =
            (self.fb_docs, self.fb_terms, self.fb_mu, self.fb_orig_weight)
        else {
            return Err(QuarryError::config(
                "fb=true requires fbDocs, fbTerms, fbMu and fbOrigWeight",
            ));
        };
        FeedbackParams::new(docs, terms, mu, orig_weight).map(Some)
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|e| QuarryError::config(format!("invalid value '{value}' for {key}: {e}")))
}
