//! Finding arXiv links in note text and replacing them with citations.

pub mod extract;
pub mod format;
pub mod paths;
pub mod rewrite;

pub use extract::{LinkOccurrence, distinct_ids, extract_links};
pub use format::format_citation;
pub use paths::relative_link;
pub use rewrite::rewrite_content;
