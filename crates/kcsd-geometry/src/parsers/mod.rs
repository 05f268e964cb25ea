//! File format parsers for importing electrode recordings.
//!
//! Supported formats:
//! - [`recording`]: plain-text `x y z potential` tables

pub mod recording;

use thiserror::Error;

/// Errors during recording file parsing.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    FormatError { line: usize, message: String },
}

/// One electrode of a parsed recording.
#[derive(Debug, Clone, PartialEq)]
pub struct ElectrodeSample {
    /// Electrode position in 3D space.
    pub position: [f64; 3],
    /// Potential measured by the electrode.
    pub potential: f64,
}
