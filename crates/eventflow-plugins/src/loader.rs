//! Filesystem discovery and dynamic loading of plugin libraries.
//!
//! Every plugin library exports exactly two `extern "C"` symbols: a
//! version string the host checks before trusting anything else in the
//! library, and a single factory that hands back the plugin instance.
//! This replaces a multi-name factory-lookup convention with one
//! unambiguous entry point per library.

use std::collections::HashMap;
use std::ffi::CStr;
use std::os::raw::c_char;
use std::path::PathBuf;
use std::sync::Arc;

use eventflow_core::EventHandlerPlugin;
use libloading::{Library, Symbol};
use parking_lot::RwLock;
use semver::{Version, VersionReq};
use tracing::{debug, error};

use crate::descriptor::{LIBRARY_EXTENSION, PluginDescriptor};
use crate::error::{PluginError, PluginResult};

const ABI_VERSION_SYMBOL: &[u8] = b"eventflow_plugin_abi_version\0";
const ENTRY_SYMBOL: &[u8] = b"eventflow_plugin_entry\0";

/// The ABI version this host implements. Plugins must report a version
/// satisfying [`HOST_ABI_REQUIREMENT`] or they are rejected before any of
/// their code runs.
pub const HOST_ABI_VERSION: &str = "1.0.0";

/// The compatibility range accepted for a plugin's reported ABI version.
pub const HOST_ABI_REQUIREMENT: &str = "^1.0";

/// A freshly loaded plugin library: the instance it exports, kept alive
/// alongside the library that owns its code.
pub struct LoadedModule {
    pub instance: Arc<dyn EventHandlerPlugin>,
    #[allow(dead_code)]
    library: Arc<Library>,
}

/// Scans configured directories for plugin libraries and loads them.
pub struct PluginLoader {
    directories: RwLock<Vec<PathBuf>>,
}

impl Default for PluginLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginLoader {
    pub fn new() -> Self {
        Self {
            directories: RwLock::new(Vec::new()),
        }
    }

    /// Replaces the set of directories searched during [`discover`].
    ///
    /// [`discover`]: PluginLoader::discover
    pub fn set_directories(&self, directories: Vec<PathBuf>) {
        *self.directories.write() = directories;
    }

    /// Scans every configured directory for plugin candidates, keyed by
    /// plugin name. Each entry is considered in two shapes: a subdirectory
    /// containing a `plugin.<ext>` file (or, failing that, a package-init
    /// `__init__.<ext>`) is a directory-packaged plugin named after the
    /// directory; a standalone top-level library file is a plugin named
    /// after its own stem. Entries whose name begins with `__` are
    /// skipped. On a duplicate name across directories, the first
    /// discovered wins and later duplicates are logged and skipped.
    pub fn discover(&self) -> PluginResult<HashMap<String, PluginDescriptor>> {
        let mut discovered: HashMap<String, PluginDescriptor> = HashMap::new();

        for directory in self.directories.read().iter() {
            if !directory.is_dir() {
                continue;
            }

            for entry in std::fs::read_dir(directory)? {
                let entry = entry?;
                let path = entry.path();

                let file_name = path.file_name().and_then(|name| name.to_str()).unwrap_or_default();
                if file_name.starts_with("__") {
                    continue;
                }

                let Some(descriptor) = build_descriptor(&path)? else {
                    continue;
                };

                match discovered.entry(descriptor.name.clone()) {
                    std::collections::hash_map::Entry::Occupied(existing) => {
                        debug!(
                            name = %descriptor.name,
                            existing = %existing.get().source(),
                            duplicate = %descriptor.source(),
                            "duplicate plugin name discovered; keeping the first one found",
                        );
                    }
                    std::collections::hash_map::Entry::Vacant(slot) => {
                        slot.insert(descriptor);
                    }
                }
            }
        }

        debug!(count = discovered.len(), "plugin discovery complete");
        Ok(discovered)
    }

    /// Loads the library named by `descriptor`, verifies its ABI version,
    /// and invokes its entry point.
    pub fn load_module(&self, descriptor: &PluginDescriptor) -> PluginResult<LoadedModule> {
        let library = unsafe { Library::new(&descriptor.path) }.map_err(|source| PluginError::LibraryLoad {
            path: descriptor.source(),
            source,
        })?;

        let reported_version = read_abi_version(&library, &descriptor.source())?;
        check_abi_compatibility(&descriptor.name, &reported_version)?;

        let instance = invoke_entry(&library, &descriptor.name, &descriptor.source())?;

        Ok(LoadedModule {
            instance,
            library: Arc::new(library),
        })
    }
}

/// Builds a descriptor for one `read_dir` entry, or `None` if the entry
/// isn't a recognized plugin shape.
fn build_descriptor(path: &std::path::Path) -> PluginResult<Option<PluginDescriptor>> {
    if path.is_dir() {
        let mut entrypoint = path.join("plugin").with_extension(LIBRARY_EXTENSION);
        if !entrypoint.exists() {
            entrypoint = path.join("__init__").with_extension(LIBRARY_EXTENSION);
        }
        if !entrypoint.exists() {
            return Ok(None);
        }

        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| path.display().to_string());

        return Ok(Some(PluginDescriptor::from_entry(name, entrypoint)?));
    }

    let is_library = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == LIBRARY_EXTENSION);
    if !is_library {
        return Ok(None);
    }

    Ok(Some(PluginDescriptor::from_path(path)?))
}

fn read_abi_version(library: &Library, path: &str) -> PluginResult<String> {
    let symbol: Symbol<unsafe extern "C" fn() -> *const c_char> =
        unsafe { library.get(ABI_VERSION_SYMBOL) }.map_err(|source| PluginError::LibraryLoad {
            path: path.to_string(),
            source,
        })?;

    let ptr = unsafe { symbol() };
    if ptr.is_null() {
        return Err(PluginError::MissingSymbol {
            path: path.to_string(),
            symbol: "eventflow_plugin_abi_version",
        });
    }

    let version = unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned();
    Ok(version)
}

fn check_abi_compatibility(plugin_name: &str, reported: &str) -> PluginResult<()> {
    let requirement = VersionReq::parse(HOST_ABI_REQUIREMENT).expect("HOST_ABI_REQUIREMENT is valid semver");
    let version = Version::parse(reported).map_err(|_| PluginError::AbiMismatch {
        name: plugin_name.to_string(),
        expected: HOST_ABI_REQUIREMENT.to_string(),
        found: reported.to_string(),
    })?;

    if requirement.matches(&version) {
        Ok(())
    } else {
        error!(plugin = plugin_name, reported, "plugin ABI version incompatible");
        Err(PluginError::AbiMismatch {
            name: plugin_name.to_string(),
            expected: HOST_ABI_REQUIREMENT.to_string(),
            found: reported.to_string(),
        })
    }
}

fn invoke_entry(library: &Library, name: &str, path: &str) -> PluginResult<Arc<dyn EventHandlerPlugin>> {
    let entry: Symbol<unsafe extern "C" fn() -> *mut dyn EventHandlerPlugin> =
        unsafe { library.get(ENTRY_SYMBOL) }.map_err(|source| PluginError::LibraryLoad {
            path: path.to_string(),
            source,
        })?;

    let raw = unsafe { entry() };
    if raw.is_null() {
        return Err(PluginError::InvalidInstance { name: name.to_string() });
    }

    let boxed = unsafe { Box::from_raw(raw) };
    Ok(Arc::from(boxed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_ignores_non_plugin_files() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
        let loader = PluginLoader::new();
        loader.set_directories(vec![dir.path().to_path_buf()]);
        assert!(loader.discover().unwrap().is_empty());
    }

    #[test]
    fn discover_skips_missing_directories() {
        let loader = PluginLoader::new();
        loader.set_directories(vec![PathBuf::from("/does/not/exist")]);
        assert!(loader.discover().unwrap().is_empty());
    }

    #[test]
    fn discover_finds_directory_packaged_plugin_via_plugin_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let plugin_dir = dir.path().join("sample");
        std::fs::create_dir_all(&plugin_dir).unwrap();
        std::fs::write(plugin_dir.join("plugin").with_extension(LIBRARY_EXTENSION), b"stub").unwrap();

        let loader = PluginLoader::new();
        loader.set_directories(vec![dir.path().to_path_buf()]);
        let discovered = loader.discover().unwrap();
        assert!(discovered.contains_key("sample"));
    }

    #[test]
    fn discover_falls_back_to_package_init_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let plugin_dir = dir.path().join("sample");
        std::fs::create_dir_all(&plugin_dir).unwrap();
        std::fs::write(plugin_dir.join("__init__").with_extension(LIBRARY_EXTENSION), b"stub").unwrap();

        let loader = PluginLoader::new();
        loader.set_directories(vec![dir.path().to_path_buf()]);
        let discovered = loader.discover().unwrap();
        assert!(discovered.contains_key("sample"));
    }

    #[test]
    fn discover_skips_directories_with_dunder_prefix() {
        let dir = tempfile::TempDir::new().unwrap();
        let plugin_dir = dir.path().join("__pycache__");
        std::fs::create_dir_all(&plugin_dir).unwrap();
        std::fs::write(plugin_dir.join("plugin").with_extension(LIBRARY_EXTENSION), b"stub").unwrap();

        let loader = PluginLoader::new();
        loader.set_directories(vec![dir.path().to_path_buf()]);
        assert!(loader.discover().unwrap().is_empty());
    }

    #[test]
    fn discover_keeps_first_directory_on_duplicate_names() {
        let dir = tempfile::TempDir::new().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        std::fs::create_dir_all(&first).unwrap();
        std::fs::create_dir_all(&second).unwrap();
        std::fs::write(first.join("sample").with_extension(LIBRARY_EXTENSION), b"stub").unwrap();
        std::fs::write(second.join("sample").with_extension(LIBRARY_EXTENSION), b"stub").unwrap();

        let loader = PluginLoader::new();
        loader.set_directories(vec![first.clone(), second]);
        let discovered = loader.discover().unwrap();
        assert_eq!(discovered.get("sample").unwrap().path, first.join("sample").with_extension(LIBRARY_EXTENSION));
    }

    #[test]
    fn abi_compatibility_accepts_matching_minor_and_rejects_major_bump() {
        assert!(check_abi_compatibility("demo", "1.2.0").is_ok());
        assert!(check_abi_compatibility("demo", "2.0.0").is_err());
        assert!(check_abi_compatibility("demo", "not-a-version").is_err());
    }
}
