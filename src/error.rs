//! Error types for region analysis.
//!
//! Only [`TrackError::InvalidRegionDataset`] (and the I/O / JSON errors raised
//! while loading shared inputs) is fatal for a run. Everything scoped to a
//! single entity degrades to a "no data" report in [`crate::report`].

use thiserror::Error;

/// Errors produced while ingesting and analysing trajectories.
#[derive(Debug, Error)]
pub enum TrackError {
    /// A raw fix with a missing or non-finite coordinate or timestamp.
    #[error("malformed fix for entity '{entity_id}': {reason}")]
    MalformedFix { entity_id: String, reason: String },

    /// A sequence that was expected to be strictly time-ordered was not.
    #[error("input is not time-sorted at position {index}")]
    UnsortedInput { index: usize },

    /// No usable fixes for an entity in the requested window.
    #[error("no data for entity '{entity_id}'")]
    NoData { entity_id: String },

    /// The region boundary dataset could not be turned into an index.
    #[error("invalid region dataset: {0}")]
    InvalidRegionDataset(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, TrackError>;

impl TrackError {
    /// Whether this error is confined to one entity (and so must not abort a batch).
    pub fn is_entity_local(&self) -> bool {
        matches!(
            self,
            TrackError::MalformedFix { .. }
                | TrackError::UnsortedInput { .. }
                | TrackError::NoData { .. }
        )
    }
}
