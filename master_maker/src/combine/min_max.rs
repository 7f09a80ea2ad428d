//! Min/max clipped mean.
//!
//! A clip pass strips whole value groups: every sample equal to the current
//! column minimum (or maximum) is excluded, not a fixed number of samples.

use rayon::prelude::*;

use crate::stack::{CHUNK_SIZE, LayerMask, PixelStack, masked_sums};

use super::repair_empty_columns;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extreme {
    Min,
    Max,
}

/// Whole-stack min/max clip. Returns the mean plane and the repaired column count.
pub(super) fn combine_min_max(stack: &PixelStack, drop: usize) -> (Vec<f64>, usize) {
    let mut mask = LayerMask::new(stack);
    for _ in 0..drop {
        strip_extreme(stack, &mut mask, Extreme::Min);
    }
    for _ in 0..drop {
        strip_extreme(stack, &mut mask, Extreme::Max);
    }

    let (mut values, counts) = masked_sums(stack, Some(&mask));
    for (value, &count) in values.iter_mut().zip(&counts) {
        if count > 0 {
            *value /= f64::from(count);
        }
    }

    let reduced = drop.saturating_sub(1);
    let repaired = repair_empty_columns(stack, &mut values, &counts, |column| {
        min_max_clipped_mean(column, reduced)
    });

    (values, repaired)
}

/// Mask every unmasked sample equal to its column's minimum or maximum.
///
/// The extreme plane starts at the identity of the comparison, so a column
/// with nothing left unmasked only matches samples that are already masked.
fn strip_extreme(stack: &PixelStack, mask: &mut LayerMask, extreme: Extreme) {
    let identity = match extreme {
        Extreme::Min => u16::MAX,
        Extreme::Max => u16::MIN,
    };
    let mut extremes = vec![identity; stack.pixel_count()];

    for l in 0..stack.layer_count() {
        let values = stack.layer(l);
        let masked = mask.layer(l);
        extremes
            .par_chunks_mut(CHUNK_SIZE)
            .enumerate()
            .for_each(|(chunk_idx, chunk)| {
                let start = chunk_idx * CHUNK_SIZE;
                for (i, current) in chunk.iter_mut().enumerate() {
                    let idx = start + i;
                    if masked[idx] {
                        continue;
                    }
                    *current = match extreme {
                        Extreme::Min => (*current).min(values[idx]),
                        Extreme::Max => (*current).max(values[idx]),
                    };
                }
            });
    }

    for l in 0..stack.layer_count() {
        let values = stack.layer(l);
        mask.layer_mut(l)
            .par_chunks_mut(CHUNK_SIZE)
            .enumerate()
            .for_each(|(chunk_idx, chunk)| {
                let start = chunk_idx * CHUNK_SIZE;
                for (i, masked) in chunk.iter_mut().enumerate() {
                    let idx = start + i;
                    if values[idx] == extremes[idx] {
                        *masked = true;
                    }
                }
            });
    }
}

/// Min/max clipped mean of one column.
///
/// Strips the lowest value group `drop` times, then the highest `drop` times,
/// and means the rest. When nothing survives, retries with one less drop; a
/// drop of zero is a plain mean. An empty column yields zero.
pub fn min_max_clipped_mean(values: &[u16], drop: usize) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();

    for drop in (0..=drop).rev() {
        if let Some(mean) = clipped_mean_of_sorted(&sorted, drop) {
            return mean;
        }
    }
    0.0
}

fn clipped_mean_of_sorted(sorted: &[u16], drop: usize) -> Option<f64> {
    let mut lo = 0;
    let mut hi = sorted.len();

    for _ in 0..drop {
        if lo == hi {
            break;
        }
        let min = sorted[lo];
        while lo < hi && sorted[lo] == min {
            lo += 1;
        }
    }
    for _ in 0..drop {
        if lo == hi {
            break;
        }
        let max = sorted[hi - 1];
        while hi > lo && sorted[hi - 1] == max {
            hi -= 1;
        }
    }

    if lo == hi {
        return None;
    }
    let kept = &sorted[lo..hi];
    let sum: f64 = kept.iter().map(|&v| f64::from(v)).sum();
    Some(sum / kept.len() as f64)
}
