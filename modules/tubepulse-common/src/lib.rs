pub mod config;
pub mod error;
pub mod types;

pub use config::{ClassifierMode, Config};
pub use error::{
    AggregationInvariantViolation, ClassificationError, FetchError, PulseError, ResolutionError,
    SummaryError, UnknownLabel,
};
pub use types::*;
