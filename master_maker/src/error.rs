//! Error types for frame combination.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::descriptor::FrameType;

/// Errors that can occur while validating, calibrating, or combining frames.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Frames do not share the same dimensions and binning")]
    IncompatibleSizes,

    #[error("Not all frames are {expected} frames")]
    WrongFrameType { expected: FrameType },

    #[error("Frames were taken with different filters")]
    FilterMismatch,

    #[error("Output directory '{path}' does not exist and could not be created: {source}")]
    OutputDirectoryUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(
        "Calibration frame is {actual:?} (width, height) but stack layers are {expected:?}"
    )]
    CalibrationDimensionMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("No frames to combine")]
    EmptyInput,

    #[error("Pixel plane {index} is {actual:?} (width, height), expected {expected:?}")]
    PlaneDimensionMismatch {
        index: usize,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Failed to read metadata of '{path}': {source}")]
    DescribeFrame {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read frame '{path}': {source}")]
    ReadFrame {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write master frame '{path}': {source}")]
    WriteMaster {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to move '{path}' into subfolder '{subfolder}': {source}")]
    RelocateFrame {
        path: PathBuf,
        subfolder: String,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
