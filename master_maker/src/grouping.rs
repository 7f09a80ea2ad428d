//! Partitioning of a heterogeneous frame list into combinable groups.
//!
//! Grouping is two-level: by exact size key, then by temperature within each
//! size group. Either level can be disabled, in which case it yields a single
//! group holding every input in its original order.

use std::collections::BTreeMap;

use crate::descriptor::{Descriptor, SizeKey};

/// Decides whether two temperatures belong to the same cluster.
pub trait ToleranceTest {
    fn same(&self, a: f64, b: f64) -> bool;
}

/// Relative difference against the larger magnitude:
/// `|a - b| <= tolerance * max(|a|, |b|)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeTolerance(pub f64);

impl ToleranceTest for RelativeTolerance {
    fn same(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.0 * a.abs().max(b.abs())
    }
}

impl<F> ToleranceTest for F
where
    F: Fn(f64, f64) -> bool,
{
    fn same(&self, a: f64, b: f64) -> bool {
        self(a, b)
    }
}

/// Bucket descriptors by exact `(width, height, binning)`.
///
/// Buckets come out ordered by size key; members keep their input order.
pub fn group_by_size(descriptors: &[Descriptor]) -> Vec<Vec<Descriptor>> {
    let mut buckets: BTreeMap<SizeKey, Vec<Descriptor>> = BTreeMap::new();
    for d in descriptors {
        buckets.entry(d.size_key()).or_default().push(d.clone());
    }
    buckets.into_values().collect()
}

/// Chain-cluster descriptors by temperature using [`RelativeTolerance`].
pub fn group_by_temperature(descriptors: &[Descriptor], tolerance: f64) -> Vec<Vec<Descriptor>> {
    group_by_temperature_with(descriptors, &RelativeTolerance(tolerance))
}

/// Chain-cluster descriptors by temperature with a custom comparator.
///
/// Descriptors are sorted ascending by temperature. Each candidate is compared
/// with the most recently accepted member of the open cluster, not with the
/// cluster's first member, so a slow drift can carry one cluster across a
/// range wider than the tolerance.
pub fn group_by_temperature_with(
    descriptors: &[Descriptor],
    test: &impl ToleranceTest,
) -> Vec<Vec<Descriptor>> {
    let mut sorted = descriptors.to_vec();
    sorted.sort_by(|a, b| a.temperature.total_cmp(&b.temperature));

    let mut clusters = Vec::new();
    let mut iter = sorted.into_iter();
    let Some(first) = iter.next() else {
        return clusters;
    };

    let mut anchor = first.temperature;
    let mut current = vec![first];
    for d in iter {
        if test.same(anchor, d.temperature) {
            anchor = d.temperature;
            current.push(d);
        } else {
            anchor = d.temperature;
            clusters.push(std::mem::replace(&mut current, vec![d]));
        }
    }
    clusters.push(current);
    clusters
}

/// Size grouping, or one bucket with everything when disabled.
pub fn size_groups(descriptors: &[Descriptor], enabled: bool) -> Vec<Vec<Descriptor>> {
    if enabled {
        group_by_size(descriptors)
    } else {
        vec![descriptors.to_vec()]
    }
}

/// Temperature grouping, or one bucket with everything when disabled.
pub fn temperature_groups(
    descriptors: &[Descriptor],
    enabled: bool,
    tolerance: f64,
) -> Vec<Vec<Descriptor>> {
    if enabled {
        group_by_temperature(descriptors, tolerance)
    } else {
        vec![descriptors.to_vec()]
    }
}

/// Whether a group of `len` members passes the optional minimum size filter.
pub fn meets_minimum(len: usize, minimum: Option<usize>) -> bool {
    minimum.is_none_or(|minimum| len >= minimum)
}
