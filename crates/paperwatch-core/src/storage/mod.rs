pub mod atomic;
pub mod state;

pub use atomic::write_atomic;
pub use state::{StateStore, StateSummary};
