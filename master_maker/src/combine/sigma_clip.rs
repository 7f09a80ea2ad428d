//! Sigma-clipped mean, single pass.
//!
//! Center is the column mean and spread the population standard deviation.
//! A zero deviation counts as infinite so a constant column keeps every sample.

use rayon::prelude::*;

use crate::stack::{CHUNK_SIZE, LayerMask, PixelStack, masked_sums, par_for_each_pixel};

use super::min_max::min_max_clipped_mean;
use super::{SIGMA_FALLBACK_DROP, repair_empty_columns};

/// Whole-stack sigma clip. Returns the mean plane and the repaired column count.
pub(super) fn combine_sigma_clip(stack: &PixelStack, threshold: f64) -> (Vec<f64>, usize) {
    let layers = stack.layer_count() as f64;

    let (mut means, _) = masked_sums(stack, None);
    par_for_each_pixel(&mut means, |_, sum| *sum /= layers);

    let mut deviations = vec![0.0f64; stack.pixel_count()];
    for l in 0..stack.layer_count() {
        let values = stack.layer(l);
        par_for_each_pixel(&mut deviations, |idx, acc| {
            let d = f64::from(values[idx]) - means[idx];
            *acc += d * d;
        });
    }
    par_for_each_pixel(&mut deviations, |_, acc| *acc = effective_std_dev(*acc / layers));

    let mut mask = LayerMask::new(stack);
    for l in 0..stack.layer_count() {
        let values = stack.layer(l);
        mask.layer_mut(l)
            .par_chunks_mut(CHUNK_SIZE)
            .enumerate()
            .for_each(|(chunk_idx, chunk)| {
                let start = chunk_idx * CHUNK_SIZE;
                for (i, masked) in chunk.iter_mut().enumerate() {
                    let idx = start + i;
                    let z = (f64::from(values[idx]) - means[idx]).abs() / deviations[idx];
                    *masked = z > threshold;
                }
            });
    }

    let (mut values, counts) = masked_sums(stack, Some(&mask));
    for (value, &count) in values.iter_mut().zip(&counts) {
        if count > 0 {
            *value /= f64::from(count);
        }
    }

    let repaired = repair_empty_columns(stack, &mut values, &counts, |column| {
        min_max_clipped_mean(column, SIGMA_FALLBACK_DROP)
    });

    (values, repaired)
}

fn effective_std_dev(variance: f64) -> f64 {
    let std_dev = variance.sqrt();
    if std_dev == 0.0 { f64::INFINITY } else { std_dev }
}

/// Sigma-clipped mean of one column.
///
/// Samples whose z-score exceeds `threshold` are excluded. If that excludes
/// everything the column falls back to a min/max clip with a drop of 2.
/// An empty column yields zero.
pub fn sigma_clipped_mean(values: &[u16], threshold: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|&v| {
            let d = f64::from(v) - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    let std_dev = effective_std_dev(variance);

    let mut sum = 0.0;
    let mut count = 0u32;
    for &v in values {
        let clipped = (f64::from(v) - mean).abs() / std_dev > threshold;
        if !clipped {
            sum += f64::from(v);
            count += 1;
        }
    }

    if count == 0 {
        min_max_clipped_mean(values, SIGMA_FALLBACK_DROP)
    } else {
        sum / f64::from(count)
    }
}
