//! In-memory frame store for tests, benchmarks, and demos.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use common::Buffer2;
use parking_lot::Mutex;

use crate::descriptor::Descriptor;
use crate::store::{FrameStore, MasterMetadata, MetadataSource};

/// A master frame captured by [`MemoryStore::write_master`].
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenMaster {
    pub path: PathBuf,
    pub plane: Buffer2<u16>,
    pub metadata: MasterMetadata,
}

#[derive(Debug, Default)]
struct Inner {
    descriptors: HashMap<PathBuf, Descriptor>,
    planes: HashMap<PathBuf, Buffer2<u16>>,
    masters: Vec<WrittenMaster>,
    relocations: Vec<(PathBuf, PathBuf)>,
    directories: Vec<PathBuf>,
    denied_directories: Vec<PathBuf>,
}

/// [`FrameStore`] and [`MetadataSource`] backed by hash maps.
///
/// Paths under a denied directory fail with `PermissionDenied`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an input frame; its descriptor path is the key.
    pub fn insert(&self, descriptor: Descriptor, plane: Buffer2<u16>) {
        let mut inner = self.inner.lock();
        inner.planes.insert(descriptor.path.clone(), plane);
        inner.descriptors.insert(descriptor.path.clone(), descriptor);
    }

    /// Add a bare plane with no metadata, e.g. a calibration frame.
    pub fn insert_plane(&self, path: impl Into<PathBuf>, plane: Buffer2<u16>) {
        self.inner.lock().planes.insert(path.into(), plane);
    }

    pub fn deny_directory(&self, dir: impl Into<PathBuf>) {
        self.inner.lock().denied_directories.push(dir.into());
    }

    pub fn masters(&self) -> Vec<WrittenMaster> {
        self.inner.lock().masters.clone()
    }

    /// `(from, to)` pairs in relocation order.
    pub fn relocations(&self) -> Vec<(PathBuf, PathBuf)> {
        self.inner.lock().relocations.clone()
    }

    pub fn directories(&self) -> Vec<PathBuf> {
        self.inner.lock().directories.clone()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.inner.lock().planes.contains_key(path)
    }

    fn check_allowed(inner: &Inner, path: &Path) -> io::Result<()> {
        if inner.denied_directories.iter().any(|dir| path.starts_with(dir)) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("'{}' is not writable", path.display()),
            ));
        }
        Ok(())
    }
}

impl MetadataSource for MemoryStore {
    fn describe(&self, path: &Path) -> io::Result<Descriptor> {
        self.inner
            .lock()
            .descriptors
            .get(path)
            .cloned()
            .ok_or_else(|| not_found(path))
    }
}

impl FrameStore for MemoryStore {
    fn read_plane(&self, path: &Path) -> io::Result<Buffer2<u16>> {
        self.inner
            .lock()
            .planes
            .get(path)
            .cloned()
            .ok_or_else(|| not_found(path))
    }

    fn write_master(
        &self,
        path: &Path,
        plane: &Buffer2<u16>,
        metadata: &MasterMetadata,
    ) -> io::Result<()> {
        let mut inner = self.inner.lock();
        Self::check_allowed(&inner, path)?;
        inner.masters.push(WrittenMaster {
            path: path.to_path_buf(),
            plane: plane.clone(),
            metadata: metadata.clone(),
        });
        Ok(())
    }

    fn relocate(&self, path: &Path, subfolder: &str) -> io::Result<PathBuf> {
        let mut inner = self.inner.lock();
        let file_name = path.file_name().ok_or_else(|| not_found(path))?;
        let target = path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(subfolder)
            .join(file_name);
        Self::check_allowed(&inner, &target)?;

        let plane = inner.planes.remove(path).ok_or_else(|| not_found(path))?;
        inner.planes.insert(target.clone(), plane);
        if let Some(mut descriptor) = inner.descriptors.remove(path) {
            descriptor.path = target.clone();
            inner.descriptors.insert(target.clone(), descriptor);
        }
        inner.relocations.push((path.to_path_buf(), target.clone()));
        Ok(target)
    }

    fn ensure_directory(&self, dir: &Path) -> io::Result<()> {
        let mut inner = self.inner.lock();
        Self::check_allowed(&inner, dir)?;
        if !inner.directories.iter().any(|d| d == dir) {
            inner.directories.push(dir.to_path_buf());
        }
        Ok(())
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("'{}' not found", path.display()),
    )
}
