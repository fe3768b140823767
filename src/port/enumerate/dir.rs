//! Directory-backed enumeration for unix hosts.

use super::{PortStub, MAX_NAME_LEN, MAX_PATH_LEN};
use crate::port::error::PortError;
#[cfg(not(target_os = "linux"))]
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::{self, ReadDir};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// How entries of the scanned directory become stubs.
#[derive(Debug, Clone)]
pub enum DirSource {
    /// Every entry is a link to a device; report the link name and the
    /// canonical target.
    ResolveLinks,
    /// Report entries whose name matches, with the entry itself as the path.
    Matching(Regex),
}

#[cfg(target_os = "linux")]
pub(super) fn platform_source() -> (&'static str, DirSource) {
    ("/dev/serial/by-id", DirSource::ResolveLinks)
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
static DEVICE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^cu\.").expect("valid device pattern"));

#[cfg(any(target_os = "freebsd", target_os = "dragonfly"))]
static DEVICE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^cuaU?\d+$").expect("valid device pattern"));

#[cfg(any(target_os = "openbsd", target_os = "netbsd"))]
static DEVICE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(cua|dty)U?\d+$").expect("valid device pattern"));

#[cfg(not(target_os = "linux"))]
pub(super) fn platform_source() -> (&'static str, DirSource) {
    ("/dev", DirSource::Matching(DEVICE_NAME.clone()))
}

pub(super) struct DirIter {
    dir: PathBuf,
    entries: ReadDir,
    source: DirSource,
}

impl DirIter {
    /// `Ok(None)` when the directory does not exist.
    pub(super) fn open(dir: &Path, source: DirSource) -> Result<Option<Self>, PortError> {
        match fs::read_dir(dir) {
            Ok(entries) => Ok(Some(Self {
                dir: dir.to_path_buf(),
                entries,
                source,
            })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No device directory at {}", dir.display());
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn stub_for(&self, name: String) -> Option<PortStub> {
        if name.len() > MAX_NAME_LEN {
            debug!("Skipping device with over-long name ({} bytes)", name.len());
            return None;
        }

        let path = match &self.source {
            DirSource::Matching(pattern) => {
                if !pattern.is_match(&name) {
                    return None;
                }
                self.dir.join(&name)
            }
            DirSource::ResolveLinks => match fs::canonicalize(self.dir.join(&name)) {
                Ok(target) => target,
                Err(e) => {
                    debug!("Skipping {}: {}", name, e);
                    return None;
                }
            },
        };

        let path = match path.into_os_string().into_string() {
            Ok(path) => path,
            Err(_) => {
                debug!("Skipping {}: target path is not UTF-8", name);
                return None;
            }
        };
        if path.len() > MAX_PATH_LEN {
            debug!("Skipping {}: path is {} bytes", name, path.len());
            return None;
        }
        Some(PortStub::new(name, path))
    }
}

impl Iterator for DirIter {
    type Item = Result<PortStub, PortError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e.into())),
            };
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    debug!("Skipping non-UTF-8 entry {:?}", raw);
                    continue;
                }
            };
            if let Some(stub) = self.stub_for(name) {
                return Some(Ok(stub));
            }
        }
    }
}
