pub mod engine;
pub mod executor;
pub mod types;

pub use engine::FsCopyExecutor;
pub use executor::CopyExecutor;
pub use types::{CopyError, CopyOptions, CopyOutcome};
