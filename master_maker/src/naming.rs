//! Generated master file names and placeholder substitution.

use std::path::PathBuf;

use chrono::NaiveDateTime;

use crate::combine::CombineMethod;
use crate::descriptor::{Descriptor, FrameType};

/// Literal values for the `%d`, `%t` and `%f` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenValues {
    /// `YYYYMMDD`
    pub date: String,
    /// `HHMM`
    pub time: String,
    pub filter: String,
}

impl TokenValues {
    pub fn at(time: NaiveDateTime, filter: impl Into<String>) -> Self {
        Self {
            date: time.format("%Y%m%d").to_string(),
            time: time.format("%H%M").to_string(),
            filter: filter.into(),
        }
    }
}

/// Replace `%d` (date), `%t` (time) and `%f` (filter) in `template`.
///
/// Any other `%` sequence is kept as written.
pub fn substitute_tokens(template: &str, values: &TokenValues) -> String {
    let mut out = String::with_capacity(template.len() + 16);
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('d') => out.push_str(&values.date),
            Some('t') => out.push_str(&values.time),
            Some('f') => out.push_str(&values.filter),
            _ => {
                out.push('%');
                continue;
            }
        }
        chars.next();
    }
    out
}

/// File name for a master frame built from `sample`'s metadata, e.g.
/// `BIAS-Sigma Clip-20240301-2215-0.000s--10.0C-3000x2000-1x1.fit`.
pub fn master_file_name(
    frame_type: FrameType,
    method: CombineMethod,
    sample: &Descriptor,
    time: NaiveDateTime,
) -> String {
    format!(
        "{}-{}-{}-{:.3}s-{:.1}C-{}x{}-{}x{}.fit",
        frame_type.label(),
        method.label(),
        time.format("%Y%m%d-%H%M"),
        sample.exposure,
        sample.temperature,
        sample.width,
        sample.height,
        sample.binning,
        sample.binning,
    )
}

/// The generated master file name, placed next to `sample`.
pub fn default_output_path(
    frame_type: FrameType,
    method: CombineMethod,
    sample: &Descriptor,
    time: NaiveDateTime,
) -> PathBuf {
    let name = master_file_name(frame_type, method, sample, time);
    match sample.path.parent() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}
