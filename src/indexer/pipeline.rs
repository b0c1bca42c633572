//! Incremental analysis pipeline.
//!
//! Discover → hash → skip or process, file by file:
//!
//! - **Skip** when the SHA-256 of the file's bytes equals the stored hash
//!   (unless forced).
//! - **Process** deletes the file's previous rows, parses it, stores the
//!   new entities and relationships with resolution, back-links earlier
//!   unresolved references, and only then records the new hash.
//!
//! A failure while processing one file is logged and counted; the run
//! continues with the next file.

use std::path::{Path, PathBuf};
use std::time::Instant;

use sha2::{Digest, Sha256};

use crate::config::GraphConfig;
use crate::error::{GraphError, Result};
use crate::graph::store::GraphStore;
use crate::indexer::discovery::{discover_files, DiscoveredFile};
use crate::parser::{detect_language, ParserDispatcher};
use crate::paths::normalize_path;

/// Recorded in metadata after every run.
pub const ANALYSIS_PARSER_VERSION: &str = "1.0";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Options controlling an analysis run.
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// Project root; module names and relative imports resolve against it.
    pub root: PathBuf,
    /// Directory or file to analyze. Defaults to `root`.
    pub target: Option<PathBuf>,
    /// Re-analyze even when the content hash is unchanged.
    pub force: bool,
    /// Only list the files that would be analyzed.
    pub dry_run: bool,
}

impl AnalyzeOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            target: None,
            force: false,
            dry_run: false,
        }
    }
}

/// Summary of an analysis run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisReport {
    pub files_total: usize,
    pub files_analyzed: usize,
    pub files_skipped: usize,
    pub errors: usize,
    pub entities_stored: usize,
    pub relationships_stored: usize,
    /// References in other files linked to newly stored entities.
    pub relinked: usize,
    pub duration_ms: u128,
    /// Normalized paths of every discovered file, in analysis order.
    pub discovered: Vec<String>,
}

impl std::fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Analyzed {} of {} files ({} skipped, {} errors): {} entities, {} relationships, {} relinked in {}ms",
            self.files_analyzed,
            self.files_total,
            self.files_skipped,
            self.errors,
            self.entities_stored,
            self.relationships_stored,
            self.relinked,
            self.duration_ms,
        )
    }
}

enum FileOutcome {
    Skipped,
    Analyzed {
        entities: usize,
        relationships: usize,
        relinked: usize,
    },
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Sequential, single-writer analysis driver.
#[derive(Debug)]
pub struct AnalysisPipeline<'a> {
    store: &'a GraphStore,
    dispatcher: &'a ParserDispatcher,
    config: GraphConfig,
}

impl<'a> AnalysisPipeline<'a> {
    pub fn new(store: &'a GraphStore, dispatcher: &'a ParserDispatcher) -> Self {
        Self {
            store,
            dispatcher,
            config: GraphConfig::default(),
        }
    }

    /// Use `config` for discovery filters and analysis limits.
    pub fn with_config(mut self, config: GraphConfig) -> Self {
        self.config = config;
        self
    }

    /// Analyze every supported file under the target.
    pub fn analyze(&self, options: &AnalyzeOptions) -> Result<AnalysisReport> {
        let start = Instant::now();
        let target = options.target.as_deref().unwrap_or(&options.root);
        let files = discover_files(&options.root, target, &self.config)?;

        let mut report = AnalysisReport {
            files_total: files.len(),
            discovered: files.iter().map(|f| normalize_path(&f.path)).collect(),
            ..AnalysisReport::default()
        };

        if options.dry_run {
            report.duration_ms = start.elapsed().as_millis();
            return Ok(report);
        }

        for file in &files {
            match self.process_file(file, options.force) {
                Ok(FileOutcome::Skipped) => report.files_skipped += 1,
                Ok(FileOutcome::Analyzed {
                    entities,
                    relationships,
                    relinked,
                }) => {
                    report.files_analyzed += 1;
                    report.entities_stored += entities;
                    report.relationships_stored += relationships;
                    report.relinked += relinked;
                }
                Err(e) => {
                    report.errors += 1;
                    tracing::warn!(path = %file.path.display(), error = %e, "analysis failed");
                }
            }
        }

        self.store.set_metadata_now("analysis_timestamp")?;
        self.store
            .set_metadata("analysis_parser_version", ANALYSIS_PARSER_VERSION)?;

        report.duration_ms = start.elapsed().as_millis();
        tracing::info!(
            analyzed = report.files_analyzed,
            skipped = report.files_skipped,
            errors = report.errors,
            entities = report.entities_stored,
            relationships = report.relationships_stored,
            "{report}"
        );
        Ok(report)
    }

    /// Re-analyze one file regardless of its stored hash.
    ///
    /// # Errors
    ///
    /// [`GraphError::UnsupportedLanguage`] when no parser handles the file's
    /// extension; storage and I/O failures propagate.
    pub fn analyze_file(&self, path: &Path) -> Result<AnalysisReport> {
        let start = Instant::now();
        let language = detect_language(path).ok_or_else(|| {
            GraphError::UnsupportedLanguage(
                path.extension()
                    .map(|e| e.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string()),
            )
        })?;
        let file = DiscoveredFile {
            path: path.to_path_buf(),
            language,
        };

        let mut report = AnalysisReport {
            files_total: 1,
            discovered: vec![normalize_path(path)],
            ..AnalysisReport::default()
        };
        if let FileOutcome::Analyzed {
            entities,
            relationships,
            relinked,
        } = self.process_file(&file, true)?
        {
            report.files_analyzed = 1;
            report.entities_stored = entities;
            report.relationships_stored = relationships;
            report.relinked = relinked;
        }
        report.duration_ms = start.elapsed().as_millis();
        Ok(report)
    }

    fn process_file(&self, file: &DiscoveredFile, force: bool) -> Result<FileOutcome> {
        let bytes = std::fs::read(&file.path)?;
        let hash = content_hash(&bytes);
        let key = normalize_path(&file.path);

        if !force && self.store.get_analysis_file_hash(&key)?.as_deref() == Some(hash.as_str()) {
            tracing::debug!(path = %key, "unchanged, skipping");
            return Ok(FileOutcome::Skipped);
        }

        let output = self.dispatcher.parse_file(&file.path, file.language)?;
        let counts = self.store.replace_file_output(&key, &output)?;
        let relinked = if self.config.analysis.relink_unresolved {
            self.store.relink_unresolved_targets(&key)?
        } else {
            0
        };
        self.store.set_analysis_file_hash(&key, &hash)?;

        tracing::debug!(
            path = %key,
            language = file.language,
            entities = counts.entities,
            relationships = counts.relationships,
            relinked,
            "analyzed"
        );
        Ok(FileOutcome::Analyzed {
            entities: counts.entities,
            relationships: counts.relationships,
            relinked,
        })
    }
}

// ---------------------------------------------------------------------------
// SHA-256 hashing
// ---------------------------------------------------------------------------

/// Lowercase hex SHA-256 of raw file bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
