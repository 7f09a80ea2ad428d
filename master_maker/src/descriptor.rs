//! Per-frame metadata supplied by an external metadata extractor.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Type of a captured frame, as recorded in the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FrameType {
    #[default]
    Unknown,
    Light,
    Bias,
    Dark,
    Flat,
}

impl FrameType {
    /// Upper-case label used in generated file names and FITS `IMAGETYP` values.
    pub fn label(self) -> &'static str {
        match self {
            FrameType::Unknown => "UNKNOWN",
            FrameType::Light => "LIGHT",
            FrameType::Bias => "BIAS",
            FrameType::Dark => "DARK",
            FrameType::Flat => "FLAT",
        }
    }

    /// Title-case name used in provenance comments ("Master Bias ...").
    pub fn title(self) -> &'static str {
        match self {
            FrameType::Unknown => "Unknown",
            FrameType::Light => "Light",
            FrameType::Bias => "Bias",
            FrameType::Dark => "Dark",
            FrameType::Flat => "Flat",
        }
    }
}

/// Exact physical size of a frame: dimensions plus binning.
///
/// Frames are combinable only when their size keys are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SizeKey {
    pub width: usize,
    pub height: usize,
    pub binning: u32,
}

impl fmt::Display for SizeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "binned {0} x {0}, dimensions {1} x {2}",
            self.binning, self.width, self.height
        )
    }
}

/// Metadata describing one input frame.
///
/// Created by the metadata extractor and treated as read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    /// Absolute path; an opaque handle to the pixel data.
    pub path: PathBuf,
    pub width: usize,
    pub height: usize,
    /// Binning factor, equal in x and y.
    pub binning: u32,
    /// Sensor temperature in degrees Celsius.
    pub temperature: f64,
    /// Exposure time in seconds.
    pub exposure: f64,
    /// Filter name, possibly empty.
    pub filter: String,
    pub frame_type: FrameType,
}

impl Descriptor {
    pub fn new(path: impl Into<PathBuf>, width: usize, height: usize) -> Self {
        Self {
            path: path.into(),
            width,
            height,
            binning: 1,
            temperature: 0.0,
            exposure: 0.0,
            filter: String::new(),
            frame_type: FrameType::Unknown,
        }
    }

    pub fn with_binning(mut self, binning: u32) -> Self {
        self.binning = binning;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_exposure(mut self, exposure: f64) -> Self {
        self.exposure = exposure;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn with_frame_type(mut self, frame_type: FrameType) -> Self {
        self.frame_type = frame_type;
        self
    }

    pub fn size_key(&self) -> SizeKey {
        SizeKey {
            width: self.width,
            height: self.height,
            binning: self.binning,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name portion of the path, for messages.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
