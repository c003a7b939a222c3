pub mod app;
pub mod background;
pub mod biomart;
pub mod config;
pub mod domain;
pub mod enrichment;
pub mod enrichr;
pub mod error;
pub mod genes;
pub mod genesets;
pub mod gmt;
pub mod output;
pub mod remote;
pub mod retry;
pub mod stats;
