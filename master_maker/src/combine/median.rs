//! Per-pixel median across layers.

use rayon::prelude::*;

use crate::stack::{CHUNK_SIZE, PixelStack};

pub(super) fn combine_median(stack: &PixelStack) -> Vec<f64> {
    let mut out = vec![0.0f64; stack.pixel_count()];

    out.par_chunks_mut(CHUNK_SIZE)
        .enumerate()
        .for_each(|(chunk_idx, chunk)| {
            let start = chunk_idx * CHUNK_SIZE;
            let mut column = Vec::with_capacity(stack.layer_count());
            for (i, value) in chunk.iter_mut().enumerate() {
                stack.gather_column(start + i, &mut column);
                *value = median(&mut column);
            }
        });

    out
}

/// Median of `values`, sorting them in place. Zero for an empty slice.
pub(super) fn median(values: &mut [u16]) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    values.sort_unstable();
    let mid = n / 2;
    if n % 2 == 1 {
        f64::from(values[mid])
    } else {
        (f64::from(values[mid - 1]) + f64::from(values[mid])) / 2.0
    }
}
