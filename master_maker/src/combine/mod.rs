//! Reduction of a pixel stack to a single master plane.
//!
//! Every method produces an `f64` plane that is rounded half-to-even and
//! clamped to the 16-bit range. The clip methods work in two phases: a
//! whole-stack masked pass, then a per-column repair of the columns the
//! masking emptied. The repair goes through the same per-column functions
//! exported here, so the bulk pass agrees with them exactly.

mod mean;
mod median;
mod min_max;
mod sigma_clip;


use common::Buffer2;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::descriptor::FrameType;
use crate::error::{Error, Result};
use crate::stack::{PixelStack, par_map_pixels, to_sample};

pub use min_max::min_max_clipped_mean;
pub use sigma_clip::sigma_clipped_mean;

/// Drop count used when a sigma-clipped column loses every sample.
pub const SIGMA_FALLBACK_DROP: usize = 2;

/// Method used to combine a stack of frames.
#[derive(Debug, Clone, Copy, PartialEq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CombineMethod {
    /// Arithmetic mean of every layer.
    Mean,
    /// Median; even layer counts average the two middle values.
    Median,
    /// Mean after stripping the `drop` lowest and `drop` highest value groups.
    MinMaxClip { drop: usize },
    /// Mean of the values within `threshold` population standard deviations.
    SigmaClip { threshold: f64 },
}

impl Default for CombineMethod {
    fn default() -> Self {
        CombineMethod::SigmaClip { threshold: 3.0 }
    }
}

impl CombineMethod {
    /// Short label used in generated file names.
    pub fn label(&self) -> &'static str {
        match self {
            CombineMethod::Mean => "Mean",
            CombineMethod::Median => "Median",
            CombineMethod::MinMaxClip { .. } => "Min-Max Clip",
            CombineMethod::SigmaClip { .. } => "Sigma Clip",
        }
    }

    /// Provenance text recorded with a master frame.
    pub fn provenance(&self, frame_type: FrameType) -> String {
        let title = frame_type.title();
        match self {
            CombineMethod::Mean => format!("Master {title} MEAN combined"),
            CombineMethod::Median => format!("Master {title} MEDIAN combined"),
            CombineMethod::MinMaxClip { drop } => {
                format!("Master {title} Min/Max Clipped (drop {drop}) Mean combined")
            }
            CombineMethod::SigmaClip { threshold } => {
                format!("Master {title} Sigma Clipped (threshold {threshold:?}) Mean combined")
            }
        }
    }
}

/// Combine every layer of `stack` into one plane.
///
/// A sigma threshold that is not positive (NaN included) is `InvalidSettings`.
pub fn combine(stack: &PixelStack, method: CombineMethod) -> Result<Buffer2<u16>> {
    if stack.layer_count() == 0 {
        return Err(Error::EmptyInput);
    }
    if let CombineMethod::SigmaClip { threshold } = method {
        if !(threshold > 0.0) {
            return Err(Error::InvalidSettings(format!(
                "sigma threshold must be positive, got {threshold}"
            )));
        }
    }

    let (values, repaired) = match method {
        CombineMethod::Mean => (mean::combine_mean(stack), 0),
        CombineMethod::Median => (median::combine_median(stack), 0),
        CombineMethod::MinMaxClip { drop } => min_max::combine_min_max(stack, drop),
        CombineMethod::SigmaClip { threshold } => sigma_clip::combine_sigma_clip(stack, threshold),
    };

    tracing::debug!(
        method = %method,
        layers = stack.layer_count(),
        width = stack.width(),
        height = stack.height(),
        repaired,
        "Combined pixel stack"
    );

    let pixels = par_map_pixels(values.len(), |idx| to_sample(values[idx]));
    Ok(Buffer2::new(stack.width(), stack.height(), pixels))
}

/// Replace every column whose `counts` entry is zero with `repair(column)`.
///
/// Returns how many columns were repaired.
fn repair_empty_columns(
    stack: &PixelStack,
    values: &mut [f64],
    counts: &[u32],
    repair: impl Fn(&[u16]) -> f64,
) -> usize {
    let mut column = Vec::with_capacity(stack.layer_count());
    let mut repaired = 0;
    for (idx, _) in counts.iter().enumerate().filter(|&(_, &count)| count == 0) {
        stack.gather_column(idx, &mut column);
        values[idx] = repair(&column);
        repaired += 1;
    }
    repaired
}
