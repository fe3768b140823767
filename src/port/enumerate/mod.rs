//! Discovery of the serial devices present on the host.
//!
//! Each platform has one source: the `/dev/serial/by-id` symlink farm on
//! Linux, a filtered `/dev` listing on the BSDs and macOS, and the
//! `SERIALCOMM` device map in the Windows registry. A source that does not
//! exist (no adapters plugged in, no udev) yields an empty iterator.

#[cfg(unix)]
mod dir;
#[cfg(windows)]
mod registry;

#[cfg(unix)]
pub use self::dir::DirSource;

use super::error::PortError;
use super::NativePort;
use serde::Serialize;

/// Longest device name reported; longer entries are skipped.
pub const MAX_NAME_LEN: usize = 255;

/// Longest device path reported; longer entries are skipped.
pub const MAX_PATH_LEN: usize = 4096;

/// One discovered device: a display name and the path to open it by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PortStub {
    name: String,
    path: String,
}

impl PortStub {
    pub(crate) fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Human-readable name, e.g. `usb-FTDI_FT232R_A10K5ZQ3-if00-port0` or `COM3`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path accepted by `open`, e.g. `/dev/ttyUSB0` or `\\.\COM3`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Open the device this stub describes.
    pub fn open(&self) -> Result<NativePort, PortError> {
        NativePort::open(&self.path)
    }
}

enum Source {
    Empty,
    #[cfg(unix)]
    Dir(dir::DirIter),
    #[cfg(windows)]
    Registry(registry::RegistryIter),
}

/// Iterator over discovered devices.
///
/// Entries that cannot be represented (non-UTF-8 names, dangling links,
/// over-long names or paths) are skipped. Errors from the underlying source
/// are yielded in place and do not end the iteration.
pub struct PortIter {
    source: Source,
}

impl PortIter {
    pub(crate) fn empty() -> Self {
        Self {
            source: Source::Empty,
        }
    }

    /// Enumerate `dir` the way the platform source does, but rooted elsewhere.
    #[cfg(unix)]
    pub fn from_dir(
        dir: impl AsRef<std::path::Path>,
        source: DirSource,
    ) -> Result<Self, PortError> {
        Ok(match dir::DirIter::open(dir.as_ref(), source)? {
            Some(iter) => Self {
                source: Source::Dir(iter),
            },
            None => Self::empty(),
        })
    }
}

impl Iterator for PortIter {
    type Item = Result<PortStub, PortError>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.source {
            Source::Empty => None,
            #[cfg(unix)]
            Source::Dir(iter) => iter.next(),
            #[cfg(windows)]
            Source::Registry(iter) => iter.next(),
        }
    }
}

impl std::fmt::Debug for PortIter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match &self.source {
            Source::Empty => "empty",
            #[cfg(unix)]
            Source::Dir(_) => "directory",
            #[cfg(windows)]
            Source::Registry(_) => "registry",
        };
        f.debug_struct("PortIter").field("source", &source).finish()
    }
}

/// Enumerate the serial devices present on this host.
pub fn iterate() -> Result<PortIter, PortError> {
    #[cfg(unix)]
    {
        let (path, source) = dir::platform_source();
        PortIter::from_dir(path, source)
    }
    #[cfg(windows)]
    {
        Ok(match registry::RegistryIter::open()? {
            Some(iter) => PortIter {
                source: Source::Registry(iter),
            },
            None => PortIter::empty(),
        })
    }
}
