pub mod cli;
pub mod config;
pub mod executor;
pub mod extract;
pub mod model;
pub mod pipeline;
pub mod traits;

// Re-export common types for convenience
pub use config::*;
pub use executor::*;
pub use extract::Md5Extractor;
pub use model::*;
pub use pipeline::FileInfoLogger;
pub use traits::*;
