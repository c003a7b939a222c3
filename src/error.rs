use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum EnrichError {
    #[error("no supported organism found: {0}")]
    #[diagnostic(help("use one of human, mouse, fly, yeast, worm, fish"))]
    UnsupportedOrganism(String),

    #[error("no valid gene set library or GMT file provided")]
    #[diagnostic(help("run `kira-enrich libraries` to view the full list of supported names"))]
    NoGeneSets,

    #[error("unsupported background: {0}")]
    InvalidBackground(String),

    #[error("background unavailable: {0}")]
    BackgroundUnavailable(String),

    #[error("gene list is empty")]
    EmptyGeneList,

    #[error("invalid gene list input: {0}")]
    InvalidGeneList(String),

    #[error("failed to read {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("missing config file at {0}")]
    MissingConfig(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("Enrichr request failed: {0}")]
    EnrichrHttp(String),

    #[error("Enrichr returned status {status}: {message}")]
    EnrichrStatus { status: u16, message: String },

    #[error("Enrichr export for {library} failed after {attempts} attempts: {message}")]
    RetriesExhausted {
        library: String,
        attempts: usize,
        message: String,
    },

    #[error("failed to parse Enrichr response: {0}")]
    EnrichrParse(String),

    #[error("BioMart request failed: {0}")]
    BiomartHttp(String),

    #[error("BioMart returned status {status}: {message}")]
    BiomartStatus { status: u16, message: String },

    #[error("statistics error: {0}")]
    Statistics(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("plot rendering failed: {0}")]
    Plot(String),
}

impl EnrichError {
    // Configuration errors abort the whole run; the rest stay scoped to one source.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            EnrichError::UnsupportedOrganism(_)
                | EnrichError::NoGeneSets
                | EnrichError::InvalidBackground(_)
                | EnrichError::EmptyGeneList
                | EnrichError::InvalidGeneList(_)
                | EnrichError::MissingConfig(_)
                | EnrichError::ConfigParse(_)
        )
    }

    pub fn is_network(&self) -> bool {
        matches!(
            self,
            EnrichError::EnrichrHttp(_)
                | EnrichError::EnrichrStatus { .. }
                | EnrichError::RetriesExhausted { .. }
                | EnrichError::BiomartHttp(_)
                | EnrichError::BiomartStatus { .. }
        )
    }
}
