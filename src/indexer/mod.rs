//! Analysis driver: discover source files, skip unchanged ones, and store
//! the rest in the code graph.

pub mod discovery;
pub mod pipeline;

pub use discovery::{discover_files, DiscoveredFile};
pub use pipeline::{content_hash, AnalysisPipeline, AnalysisReport, AnalyzeOptions, ANALYSIS_PARSER_VERSION};
