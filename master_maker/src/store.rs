//! Boundaries to the external metadata extractor and pixel I/O.
//!
//! Implementations decide the on-disk format; the engine only sees
//! [`Descriptor`]s, 16-bit planes, and a flat metadata record.

use std::io;
use std::path::{Path, PathBuf};

use common::Buffer2;

use crate::descriptor::{Descriptor, FrameType};
use crate::error::{Error, Result};

/// Aggregate metadata written alongside a master frame.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterMetadata {
    pub frame_type: FrameType,
    /// Mean exposure of the inputs, seconds.
    pub exposure: f64,
    /// Mean sensor temperature of the inputs, degrees Celsius.
    pub temperature: f64,
    /// Most common filter among the inputs.
    pub filter: String,
    pub binning: u32,
    /// Provenance text, e.g. "Master Bias MEDIAN combined".
    pub comment: String,
}

/// Reads frame metadata.
pub trait MetadataSource {
    fn describe(&self, path: &Path) -> io::Result<Descriptor>;
}

/// Describe every path, stopping at the first failure.
pub fn describe_all<P: AsRef<Path>>(
    source: &dyn MetadataSource,
    paths: &[P],
) -> Result<Vec<Descriptor>> {
    paths
        .iter()
        .map(|path| {
            let path = path.as_ref();
            source.describe(path).map_err(|source| Error::DescribeFrame {
                path: path.to_path_buf(),
                source,
            })
        })
        .collect()
}

/// Reads input planes, writes masters, and relocates consumed inputs.
pub trait FrameStore {
    fn read_plane(&self, path: &Path) -> io::Result<Buffer2<u16>>;

    fn write_master(
        &self,
        path: &Path,
        plane: &Buffer2<u16>,
        metadata: &MasterMetadata,
    ) -> io::Result<()>;

    /// Move `path` into `subfolder` next to it. Returns the new location.
    fn relocate(&self, path: &Path, subfolder: &str) -> io::Result<PathBuf>;

    /// Make sure `dir` exists, creating it if needed.
    fn ensure_directory(&self, dir: &Path) -> io::Result<()> {
        std::fs::create_dir_all(dir)
    }
}

/// Move `path` into `<parent>/<subfolder>/`, creating the subfolder.
pub fn move_to_subfolder(path: &Path, subfolder: &str) -> io::Result<PathBuf> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("'{}' has no file name", path.display()),
        )
    })?;

    let target_dir = parent.join(subfolder);
    std::fs::create_dir_all(&target_dir)?;
    let target = target_dir.join(file_name);
    std::fs::rename(path, &target)?;
    Ok(target)
}
