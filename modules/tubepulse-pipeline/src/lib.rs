pub mod aggregate;
pub mod battle;
pub mod classify;
pub mod export;
pub mod fetcher;
pub mod insights;
pub mod pipeline;
pub mod preprocess;
pub mod resolver;
pub mod stats;
pub mod summary;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use pipeline::{Analyzer, BattleReport, RunReport, VideoAnalysis, VideoOutcome};
pub use resolver::VideoQuery;
