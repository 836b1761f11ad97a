//! paperwatch science: arXiv identifiers, metadata lookups, PDF fetching and
//! the link-to-citation pipeline.

pub mod error;
pub mod http;
pub mod identifiers;
pub mod arxiv;
pub mod sources;
pub mod resolver;
pub mod fetcher;
pub mod links;
pub mod pipeline;

pub use error::{Result, ScienceError};
pub use fetcher::AssetFetcher;
pub use identifiers::arxiv::ArxivId;
pub use links::{LinkOccurrence, extract_links};
pub use pipeline::{FileReport, Pipeline, RunSummary};
pub use resolver::{MetadataResolver, Resolution};
