//! In-memory 3D pixel stack and its parallel per-plane sweeps.
//!
//! Samples are stored layer-major: layer `l` occupies
//! `data[l * pixel_count..(l + 1) * pixel_count]`, each layer row-major.
//! The whole stack is materialized at once, so memory grows as
//! `width * height * layers * 2` bytes, plus one `bool` per sample while a
//! clip mask is alive and a few `f64` planes for accumulators.

use common::Buffer2;
use rayon::prelude::*;

use crate::error::{Error, Result};

/// Pixels per parallel work item.
pub(crate) const CHUNK_SIZE: usize = 4096;

/// A stack of equally sized 16-bit planes.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelStack {
    width: usize,
    height: usize,
    layers: usize,
    data: Vec<u16>,
}

impl PixelStack {
    /// Stack the given planes in order.
    ///
    /// Fails with `EmptyInput` for no planes and `PlaneDimensionMismatch` when a
    /// plane differs in size from the first one.
    pub fn from_planes(planes: Vec<Buffer2<u16>>) -> Result<Self> {
        let Some(first) = planes.first() else {
            return Err(Error::EmptyInput);
        };
        let expected = first.dimensions();
        let (width, height) = expected;

        for (index, plane) in planes.iter().enumerate().skip(1) {
            if plane.dimensions() != expected {
                return Err(Error::PlaneDimensionMismatch {
                    index,
                    expected,
                    actual: plane.dimensions(),
                });
            }
        }

        let layers = planes.len();
        let mut data = Vec::with_capacity(width * height * layers);
        for plane in planes {
            data.extend_from_slice(plane.pixels());
        }

        Ok(Self {
            width,
            height,
            layers,
            data,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// `(width, height)` of every layer.
    #[inline]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    #[inline]
    pub fn layer_count(&self) -> usize {
        self.layers
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn layer(&self, index: usize) -> &[u16] {
        let n = self.pixel_count();
        &self.data[index * n..(index + 1) * n]
    }

    /// Mutable access to every layer at once, one slice per layer.
    pub fn layers_mut(&mut self) -> impl Iterator<Item = &mut [u16]> {
        let n = self.pixel_count().max(1);
        self.data.chunks_exact_mut(n)
    }

    /// Copy the column at `pixel` (all layers, in layer order) into `out`.
    pub fn gather_column(&self, pixel: usize, out: &mut Vec<u16>) {
        out.clear();
        let n = self.pixel_count();
        out.extend((0..self.layers).map(|l| self.data[l * n + pixel]));
    }
}

/// One exclusion flag per stack sample, laid out like [`PixelStack`].
#[derive(Debug, Clone)]
pub(crate) struct LayerMask {
    pixel_count: usize,
    masked: Vec<bool>,
}

impl LayerMask {
    pub fn new(stack: &PixelStack) -> Self {
        Self {
            pixel_count: stack.pixel_count(),
            masked: vec![false; stack.pixel_count() * stack.layer_count()],
        }
    }

    #[inline]
    pub fn layer(&self, index: usize) -> &[bool] {
        let n = self.pixel_count;
        &self.masked[index * n..(index + 1) * n]
    }

    #[inline]
    pub fn layer_mut(&mut self, index: usize) -> &mut [bool] {
        let n = self.pixel_count;
        &mut self.masked[index * n..(index + 1) * n]
    }
}

/// Run `f(pixel_index, &mut value)` over a plane in parallel chunks.
pub(crate) fn par_for_each_pixel<T, F>(plane: &mut [T], f: F)
where
    T: Send,
    F: Fn(usize, &mut T) + Sync + Send,
{
    plane
        .par_chunks_mut(CHUNK_SIZE)
        .enumerate()
        .for_each(|(chunk_idx, chunk)| {
            let start = chunk_idx * CHUNK_SIZE;
            for (i, value) in chunk.iter_mut().enumerate() {
                f(start + i, value);
            }
        });
}

/// Build a plane by evaluating `f(pixel_index)` in parallel chunks.
pub(crate) fn par_map_pixels<T, F>(len: usize, f: F) -> Vec<T>
where
    T: Send + Default + Clone,
    F: Fn(usize) -> T + Sync + Send,
{
    let mut out = vec![T::default(); len];
    par_for_each_pixel(&mut out, |idx, value| *value = f(idx));
    out
}

/// Per-pixel sum and count of unmasked samples, accumulated in layer order.
pub(crate) fn masked_sums(stack: &PixelStack, mask: Option<&LayerMask>) -> (Vec<f64>, Vec<u32>) {
    let n = stack.pixel_count();
    let mut sums = vec![0.0f64; n];
    let mut counts = vec![0u32; n];

    for l in 0..stack.layer_count() {
        let values = stack.layer(l);
        match mask {
            Some(mask) => {
                let masked = mask.layer(l);
                sums.par_chunks_mut(CHUNK_SIZE)
                    .zip(counts.par_chunks_mut(CHUNK_SIZE))
                    .enumerate()
                    .for_each(|(chunk_idx, (sum_chunk, count_chunk))| {
                        let start = chunk_idx * CHUNK_SIZE;
                        for (i, (sum, count)) in
                            sum_chunk.iter_mut().zip(count_chunk.iter_mut()).enumerate()
                        {
                            let idx = start + i;
                            if !masked[idx] {
                                *sum += f64::from(values[idx]);
                                *count += 1;
                            }
                        }
                    });
            }
            None => {
                par_for_each_pixel(&mut sums, |idx, sum| *sum += f64::from(values[idx]));
            }
        }
    }

    if mask.is_none() {
        counts.fill(stack.layer_count() as u32);
    }

    (sums, counts)
}

/// Round half to even and clamp into the 16-bit sample range.
#[inline]
pub(crate) fn to_sample(value: f64) -> u16 {
    value.round_ties_even().clamp(0.0, f64::from(u16::MAX)) as u16
}
