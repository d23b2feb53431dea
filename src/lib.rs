//! Bounded, polite crawl of a public site that harvests photographs,
//! collapses near-duplicates by perceptual hash and writes a reviewable
//! manifest.

pub mod config;
pub mod core;
pub mod pipeline;

pub use config::{ConfigError, CrawlConfig, FilterConfig};
pub use pipeline::{PipelineError, RunSummary, run};
