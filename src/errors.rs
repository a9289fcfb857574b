//! Error Types
//!
//! This module defines the error types used throughout the animation engine.
//!
//! # Overview
//!
//! The main error type [`AnimationError`] covers the hard failure modes:
//! - Malformed keyframe tracks and clips (rejected at construction)
//! - Invalid track paths
//! - Clip (de)serialization errors
//!
//! Runtime numeric edge cases (zero-length clips, zero total weight, NaN
//! samples) are never reported as errors; playback degrades to "no visible
//! change" instead. Binding resolution failures are logged once and the
//! binding becomes a no-op.
//!
//! # Usage
//!
//! ```rust,ignore
//! use myth_animation::errors::{AnimationError, Result};
//!
//! fn load_clip(json: &str) -> Result<AnimationClip> {
//!     AnimationClip::from_json(json)
//! }
//! ```

use thiserror::Error;

/// The main error type for the animation engine.
#[derive(Error, Debug)]
pub enum AnimationError {
    // ========================================================================
    // Clip & Track Errors
    // ========================================================================
    /// A clip was constructed without any tracks.
    #[error("Animation clip '{clip}' has no tracks")]
    EmptyClip {
        /// Name of the offending clip
        clip: String,
    },

    /// A track has no keyframes.
    #[error("Track '{track}' is empty")]
    EmptyTrack {
        /// Name of the offending track
        track: String,
    },

    /// The number of values does not match `times.len() * value_size`.
    #[error("Track '{track}': expected {expected} values, found {actual}")]
    ValueCountMismatch {
        /// Name of the offending track
        track: String,
        /// Value count implied by the keyframe times
        expected: usize,
        /// Value count actually provided
        actual: usize,
    },

    /// The value size is zero or does not fit the value type.
    #[error("Track '{track}': invalid value size {value_size}")]
    InvalidValueSize {
        /// Name of the offending track
        track: String,
        /// The rejected value size
        value_size: usize,
    },

    /// Keyframe times decrease at `index`.
    #[error("Track '{track}': out of order keys at index {index}")]
    UnsortedTimes {
        /// Name of the offending track
        track: String,
        /// Index of the first out-of-order key
        index: usize,
    },

    /// A keyframe time is NaN or infinite.
    #[error("Track '{track}': time at index {index} is not a valid number")]
    NonFiniteTime {
        /// Name of the offending track
        track: String,
        /// Index of the invalid key
        index: usize,
    },

    /// A keyframe value is NaN or infinite (strict validation only).
    #[error("Track '{track}': value at index {index} is not a valid number")]
    NonFiniteValue {
        /// Name of the offending track
        track: String,
        /// Index into the packed value array
        index: usize,
    },

    // ========================================================================
    // Format & Parsing Errors
    // ========================================================================
    /// Unknown value type tag in clip data.
    #[error("Unknown track value type: {0}")]
    UnknownValueType(String),

    /// Unknown interpolation tag in clip data.
    #[error("Unknown interpolation mode: {0}")]
    UnknownInterpolation(String),

    /// A track name could not be parsed as a property path.
    #[error("Invalid track path '{path}': {reason}")]
    InvalidTrackPath {
        /// The raw path string
        path: String,
        /// Why parsing failed
        reason: String,
    },

    /// An argument was outside its valid domain (e.g. non-positive fps).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Alias for `Result<T, AnimationError>`.
pub type Result<T> = std::result::Result<T, AnimationError>;
