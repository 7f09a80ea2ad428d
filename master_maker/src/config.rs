//! Session settings: combine method, calibration, grouping, and disposition.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use crate::combine::CombineMethod;
use crate::descriptor::FrameType;
use crate::error::{Error, Result};

/// Default template for the subfolder consumed inputs are moved into.
pub const DEFAULT_DISPOSITION_SUBFOLDER: &str = "originals-%d-%t";

/// Calibration to apply before combining, as configured.
///
/// The fixed frame is named by path and read through the frame store once per session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PrecalibrationSettings {
    #[default]
    None,
    Pedestal {
        value: u32,
    },
    FixedFrame {
        path: PathBuf,
    },
}

/// What happens to input frames after their master is written.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Leave inputs where they are.
    #[default]
    Nothing,
    /// Move inputs into a subfolder next to them.
    Subfolder,
}

/// Settings for one combine session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombineSettings {
    pub method: CombineMethod,
    /// Frame type every input must have unless `ignore_frame_type` is set.
    pub frame_type: FrameType,
    pub ignore_frame_type: bool,
    /// Only consulted for flat frames.
    pub ignore_filter: bool,
    pub precalibration: PrecalibrationSettings,
    pub disposition: Disposition,
    /// Subfolder template; `%d`, `%t` and `%f` are substituted.
    pub disposition_subfolder: String,
    pub group_by_size: bool,
    pub group_by_temperature: bool,
    /// Relative temperature tolerance, as a fraction in `0.0..=1.0`.
    pub temperature_tolerance: f64,
    /// Groups smaller than this are skipped. `None` combines every group.
    pub minimum_group_size: Option<usize>,
}

impl Default for CombineSettings {
    fn default() -> Self {
        Self {
            method: CombineMethod::default(),
            frame_type: FrameType::Bias,
            ignore_frame_type: false,
            ignore_filter: false,
            precalibration: PrecalibrationSettings::None,
            disposition: Disposition::Nothing,
            disposition_subfolder: DEFAULT_DISPOSITION_SUBFOLDER.to_string(),
            group_by_size: false,
            group_by_temperature: false,
            temperature_tolerance: 0.05,
            minimum_group_size: None,
        }
    }
}

impl CombineSettings {
    pub fn is_grouped(&self) -> bool {
        self.group_by_size || self.group_by_temperature
    }

    pub fn validate(&self) -> Result<()> {
        if let CombineMethod::SigmaClip { threshold } = self.method {
            if threshold.is_nan() || threshold <= 0.0 {
                return Err(Error::InvalidSettings(format!(
                    "sigma threshold must be positive, got {threshold}"
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.temperature_tolerance) {
            return Err(Error::InvalidSettings(format!(
                "temperature tolerance must be within 0..=1, got {}",
                self.temperature_tolerance
            )));
        }

        if self.minimum_group_size == Some(0) {
            return Err(Error::InvalidSettings(
                "minimum group size must be at least 1".to_string(),
            ));
        }

        if self.disposition == Disposition::Subfolder && self.disposition_subfolder.trim().is_empty()
        {
            return Err(Error::InvalidSettings(
                "disposition subfolder name is empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Load settings from a YAML or JSON file, chosen by extension.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let settings: Self = common::serde_format::load_from_file(path)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        common::serde_format::save_to_file(self, path)
    }
}
