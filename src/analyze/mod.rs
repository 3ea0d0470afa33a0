pub mod analyzer;
pub mod model;
pub mod stats;

pub use analyzer::Analyzer;
pub use model::{DataAnalysis, RepoPullRequests};
