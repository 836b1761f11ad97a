pub mod arxiv;

pub use arxiv::ArxivId;
