//! Combinability checks and aggregate metadata over descriptor lists.
//!
//! The checks are pure predicates; callers decide which error a failed check maps to.

use crate::descriptor::{Descriptor, FrameType};

/// True when every descriptor has the same width, height, and binning.
///
/// Vacuously true for empty and single-element lists.
pub fn compatible_sizes(descriptors: &[Descriptor]) -> bool {
    let Some(first) = descriptors.first() else {
        return true;
    };
    let key = first.size_key();
    descriptors.iter().all(|d| d.size_key() == key)
}

/// True when every descriptor has the given frame type.
pub fn all_of_type(descriptors: &[Descriptor], frame_type: FrameType) -> bool {
    descriptors.iter().all(|d| d.frame_type == frame_type)
}

/// True when every descriptor uses the same filter name.
pub fn all_same_filter(descriptors: &[Descriptor]) -> bool {
    let Some(first) = descriptors.first() else {
        return true;
    };
    descriptors.iter().all(|d| d.filter == first.filter)
}

/// Most frequent filter name. Ties go to the name seen first.
pub fn most_common_filter(descriptors: &[Descriptor]) -> String {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for d in descriptors {
        match counts.iter_mut().find(|(name, _)| *name == d.filter) {
            Some((_, count)) => *count += 1,
            None => counts.push((&d.filter, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (name, count) in counts {
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((name, count));
        }
    }
    best.map(|(name, _)| name.to_string()).unwrap_or_default()
}

/// Arithmetic mean of exposure and temperature, `(exposure, temperature)`.
///
/// Returns zeros for an empty list.
pub fn mean_exposure_and_temperature(descriptors: &[Descriptor]) -> (f64, f64) {
    if descriptors.is_empty() {
        return (0.0, 0.0);
    }
    let n = descriptors.len() as f64;
    let exposure: f64 = descriptors.iter().map(|d| d.exposure).sum();
    let temperature: f64 = descriptors.iter().map(|d| d.temperature).sum();
    (exposure / n, temperature / n)
}
