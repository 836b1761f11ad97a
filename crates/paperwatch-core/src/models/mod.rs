pub mod identifier;
pub mod record;

pub use identifier::PaperIdentifier;
pub use record::{PaperMetadata, ProcessingRecord, RecordStatus};
