use crate::stack::{PixelStack, masked_sums, par_for_each_pixel};

pub(super) fn combine_mean(stack: &PixelStack) -> Vec<f64> {
    let (mut sums, _) = masked_sums(stack, None);
    let layers = stack.layer_count() as f64;
    par_for_each_pixel(&mut sums, |_, sum| *sum /= layers);
    sums
}
