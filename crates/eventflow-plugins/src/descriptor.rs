//! Filesystem-derived identity for a discovered plugin library.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::PluginResult;

/// The platform's dynamic library extension, matched during directory scans.
#[cfg(target_os = "windows")]
pub const LIBRARY_EXTENSION: &str = "dll";
#[cfg(target_os = "macos")]
pub const LIBRARY_EXTENSION: &str = "dylib";
#[cfg(all(unix, not(target_os = "macos")))]
pub const LIBRARY_EXTENSION: &str = "so";

/// Identity of a plugin library as observed on disk.
///
/// Equality is based on path, size and modification time: if none of those
/// change between two discovery passes, the manager treats the plugin as
/// unchanged and keeps the existing loaded instance rather than reloading
/// it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDescriptor {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

impl PluginDescriptor {
    /// Builds a descriptor for a standalone top-level library file, reading
    /// its filesystem metadata. The plugin's name is derived from the
    /// file's stem.
    pub fn from_path(path: impl Into<PathBuf>) -> PluginResult<Self> {
        let path = path.into();
        let name = plugin_name(&path);
        Self::from_entry(name, path)
    }

    /// Builds a descriptor for an explicit entrypoint file under an
    /// explicit name, reading the entrypoint's filesystem metadata.
    ///
    /// Used for directory-packaged plugins, where the name is the
    /// containing directory's name rather than the entrypoint file's stem
    /// (`plugin.<ext>` or a package-init shared object).
    pub fn from_entry(name: impl Into<String>, entrypoint: impl Into<PathBuf>) -> PluginResult<Self> {
        let path = entrypoint.into();
        let metadata = std::fs::metadata(&path)?;
        Ok(Self {
            name: name.into(),
            size: metadata.len(),
            modified: metadata.modified()?,
            path,
        })
    }

    /// A human-readable source label, surfaced through status reporting.
    pub fn source(&self) -> String {
        self.path.display().to_string()
    }
}

fn plugin_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| stem.trim_start_matches("lib").to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plugin_name_strips_lib_prefix_and_extension() {
        assert_eq!(plugin_name(Path::new("/plugins/libsample.so")), "sample");
        assert_eq!(plugin_name(Path::new("/plugins/sample.dll")), "sample");
    }
}
