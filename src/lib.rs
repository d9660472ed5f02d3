pub mod cli;
pub mod config;
pub mod error;
pub mod generator;
pub mod llm;
pub mod memory;
pub mod search;
#[cfg(any(test, feature = "testing"))]
#[doc(hidden)]
pub mod testing;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::ResearchError;
pub use generator::workflow::launch;
