use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while assembling or running a simulation. Numeric edge cases
/// inside the mass balance (zero supply, negative storage) are handled by the
/// engine's floor/ratio rules and never surface here.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error(
        "network is not a tree: ordered {processed} of {total} segments (cycle or dangling link)"
    )]
    CyclicNetwork { processed: usize, total: usize },

    #[error("segment {segment} has {count} upstream segments; confluences join at most two")]
    TooManyUpstream { segment: i64, count: usize },

    #[error("segment {segment} is missing required attribute '{column}'")]
    MissingAttribute { segment: i64, column: String },

    #[error("segment {segment} on day {day}: upstream segment {upstream} not yet computed")]
    UnresolvedDependency {
        segment: i64,
        day: usize,
        upstream: i64,
    },

    #[error("segment {segment} has invalid gamma denudation parameters (shape {shape}, scale {scale})")]
    DenudationParams {
        segment: i64,
        shape: f64,
        scale: f64,
    },

    #[error("hydrograph table has no usable gauges")]
    NoGauges,

    #[error("hydrograph rows have differing day counts")]
    RaggedHydrograph,

    #[error("hydrograph table is missing column '{0}'")]
    HydrographColumn(String),

    #[error("width table has no usable rows")]
    EmptyWidthTable,

    #[error("width regression is degenerate (singular normal equations)")]
    DegenerateWidthFit,

    #[error("storage snapshot {path:?} holds {found} segments, network has {expected}")]
    SnapshotMismatch {
        path: PathBuf,
        found: usize,
        expected: usize,
    },

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ModelError>;
