//! Removal of a constant pedestal or a fixed reference frame before combining.

use common::Buffer2;
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::stack::{CHUNK_SIZE, PixelStack};

/// What to subtract from every layer of a stack.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Precalibration {
    #[default]
    None,
    /// Constant subtracted from every pixel.
    Pedestal(u32),
    /// Reference plane subtracted pixel by pixel; must match the layer size.
    FixedFrame(Buffer2<u16>),
}

/// Subtract the calibration from every layer, clamping at zero.
///
/// A fixed frame whose size differs from the stack fails before any layer is touched.
pub fn precalibrate(mut stack: PixelStack, calibration: &Precalibration) -> Result<PixelStack> {
    match calibration {
        Precalibration::None => {}
        Precalibration::Pedestal(value) => {
            let pedestal = u16::try_from(*value).unwrap_or(u16::MAX);
            for layer in stack.layers_mut() {
                layer.par_chunks_mut(CHUNK_SIZE).for_each(|chunk| {
                    for v in chunk {
                        *v = v.saturating_sub(pedestal);
                    }
                });
            }
        }
        Precalibration::FixedFrame(frame) => {
            if frame.dimensions() != stack.dimensions() {
                return Err(Error::CalibrationDimensionMismatch {
                    expected: stack.dimensions(),
                    actual: frame.dimensions(),
                });
            }
            let reference = frame.pixels();
            for layer in stack.layers_mut() {
                layer
                    .par_chunks_mut(CHUNK_SIZE)
                    .zip(reference.par_chunks(CHUNK_SIZE))
                    .for_each(|(chunk, reference)| {
                        for (v, &r) in chunk.iter_mut().zip(reference) {
                            *v = v.saturating_sub(r);
                        }
                    });
            }
        }
    }

    tracing::debug!(kind = calibration_kind(calibration), "Precalibrated stack");
    Ok(stack)
}

fn calibration_kind(calibration: &Precalibration) -> &'static str {
    match calibration {
        Precalibration::None => "none",
        Precalibration::Pedestal(_) => "pedestal",
        Precalibration::FixedFrame(_) => "fixed_frame",
    }
}
