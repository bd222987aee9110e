//! Video Analyzer - download a social video, sample it, and ask a hosted model what makes it work
//!
//! The library wires three external capabilities together: `yt-dlp` for downloading,
//! `ffmpeg` for frame and audio extraction, and an OpenAI-compatible API for
//! transcription, vision analysis and the final write-up.

pub mod cli;
pub mod config;
pub mod extractors;
pub mod insight;
pub mod media;
pub mod output;
pub mod pipeline;
pub mod server;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use extractors::{MediaFetcher, VideoDownloader};
pub use insight::InsightEngine;
pub use media::{AssetKind, MediaAsset, Transcoder};
pub use pipeline::{AnalysisReport, Orchestrator};

/// Result type used for configuration and CLI plumbing
pub type Result<T> = anyhow::Result<T>;

/// Result type used by the analysis pipeline
pub type PipelineResult<T> = std::result::Result<T, AnalyzerError>;

/// Error kinds surfaced by the analysis pipeline
#[derive(thiserror::Error, Debug)]
pub enum AnalyzerError {
    #[error("video_url is required")]
    MissingInput,

    #[error("Failed to download video: {0}")]
    FetchFailure(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailure(String),

    #[error("Inference failed: {0}")]
    InferenceFailure(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Temporary storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl AnalyzerError {
    /// Stable machine-readable code for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            AnalyzerError::MissingInput => "missing_input",
            AnalyzerError::FetchFailure(_) => "fetch_failure",
            AnalyzerError::ExtractionFailure(_) => "extraction_failure",
            AnalyzerError::InferenceFailure(_) => "inference_failure",
            AnalyzerError::NotFound(_) => "not_found",
            AnalyzerError::Storage(_) => "storage_failure",
        }
    }

    /// Whether the caller can fix the failure by changing the request
    pub fn is_client_error(&self) -> bool {
        matches!(self, AnalyzerError::MissingInput)
    }
}
