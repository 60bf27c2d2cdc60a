// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for timeline lookup, playback and replication.

use crate::object::ObjectHandle;

/// Error type for timeline operations
#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    /// No authored definition for the owner's class
    #[error("No timeline {name:?} defined for class {class:?}")]
    DefinitionNotFound {
        /// Owner class
        class: String,
        /// Timeline name
        name: String,
    },

    /// Owner handle is stale
    #[error("Owner not alive: {0}")]
    OwnerNotAlive(ObjectHandle),

    /// Named track does not exist or has no value
    #[error("Track {track:?} not found on timeline {timeline:?}")]
    TrackNotFound {
        /// Timeline name
        timeline: String,
        /// Track name
        track: String,
    },

    /// Replication applied to a timeline that is not replicated
    #[error("Timeline {0:?} is not replicated")]
    NotReplicated(String),

    /// Replication payload could not be encoded or decoded
    #[error("Replication codec error: {0}")]
    Codec(#[from] bincode::Error),
}

/// Result alias for timeline operations
pub type Result<T> = std::result::Result<T, TimelineError>;
