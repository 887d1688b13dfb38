//! Download, checksum-verify, extract and install plugins; mirror image
//! for uninstall.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use eventflow_config::{ConfigStore, EventConfig};
use eventflow_plugins::PluginManager;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::client::{MarketplaceClient, MarketplacePluginMetadata};
use crate::error::{InstallError, InstallResult};

/// A request to install a plugin, either from an explicit URL or by name
/// via the marketplace.
#[derive(Debug, Clone)]
pub struct PluginInstallRequest {
    pub name: String,
    pub source_url: Option<String>,
    pub checksum_sha256: Option<String>,
}

/// Installs and uninstalls plugins by downloading, verifying, and
/// extracting archives into a writable plugin directory, then triggering
/// a manager reload.
pub struct PluginInstaller {
    config_store: Arc<ConfigStore>,
    plugin_manager: Arc<PluginManager>,
    marketplace_client: Option<Arc<MarketplaceClient>>,
}

impl PluginInstaller {
    pub fn new(
        config_store: Arc<ConfigStore>,
        plugin_manager: Arc<PluginManager>,
        marketplace_client: Option<Arc<MarketplaceClient>>,
    ) -> Self {
        Self {
            config_store,
            plugin_manager,
            marketplace_client,
        }
    }

    /// Downloads, verifies, extracts and registers a plugin.
    ///
    /// If any step after extraction fails, the extracted directory is
    /// removed so a half-installed plugin never lingers on disk.
    pub async fn install(&self, request: PluginInstallRequest) -> InstallResult<EventConfig> {
        let config = self.config_store.load(true)?;
        let (download_url, checksum) = self.resolve_download_info(&request, &config).await?;
        let target_directory = resolve_target_directory(&config)?;

        let timeout = Duration::from_secs(config.marketplace.download_timeout_seconds);
        let extracted_path = self
            .download_and_extract(&request.name, &download_url, &target_directory, checksum.as_deref(), timeout)
            .await?;

        match self.finish_install(&config, &request.name, extracted_path.clone()).await {
            Ok(updated) => Ok(updated),
            Err(err) => {
                if let Err(cleanup_err) = tokio::fs::remove_dir_all(&extracted_path).await {
                    warn!(error = %cleanup_err, path = %extracted_path.display(), "failed to clean up partial install");
                }
                Err(err)
            }
        }
    }

    async fn finish_install(&self, config: &EventConfig, name: &str, extracted_path: PathBuf) -> InstallResult<EventConfig> {
        install_dependencies(&extracted_path).await?;

        let mut updated_config = config.clone();
        updated_config.plugins.entry(name.to_string()).or_default().enabled = Some(true);
        updated_config.disabled_handlers.retain(|handler| handler != name);
        if !updated_config.enabled_handlers.iter().any(|handler| handler == name) {
            updated_config.enabled_handlers.push(name.to_string());
        }
        self.config_store.save(&updated_config)?;
        self.plugin_manager.reload().await?;
        info!(plugin = name, "plugin installed");
        Ok(updated_config)
    }

    /// Removes an installed plugin's directory and configuration entry.
    pub async fn uninstall(&self, plugin_name: &str) -> InstallResult<EventConfig> {
        let mut config = self.config_store.load(true)?;
        let plugin_dir = locate_installed_plugin(&config, plugin_name)
            .ok_or_else(|| InstallError::NotInstalled(plugin_name.to_string()))?;

        if let Err(err) = tokio::fs::remove_dir_all(&plugin_dir).await {
            warn!(error = %err, path = %plugin_dir.display(), "failed to remove plugin directory");
        }

        config.plugins.remove(plugin_name);
        config.enabled_handlers.retain(|handler| handler != plugin_name);
        config.disabled_handlers.retain(|handler| handler != plugin_name);
        self.config_store.save(&config)?;
        self.plugin_manager.reload().await?;
        info!(plugin = plugin_name, "plugin uninstalled");
        Ok(config)
    }

    /// Lists marketplace plugins, or an empty list if no marketplace
    /// client is configured or it is disabled.
    pub async fn list_marketplace_plugins(&self) -> InstallResult<Vec<MarketplacePluginMetadata>> {
        match &self.marketplace_client {
            Some(client) if client.enabled() => Ok(client.list_plugins().await?),
            _ => Ok(Vec::new()),
        }
    }

    async fn resolve_download_info(
        &self,
        request: &PluginInstallRequest,
        config: &EventConfig,
    ) -> InstallResult<(String, Option<String>)> {
        if let Some(url) = &request.source_url {
            return Ok((url.clone(), request.checksum_sha256.clone()));
        }

        let client = self
            .marketplace_client
            .as_ref()
            .filter(|client| client.enabled())
            .ok_or(InstallError::MarketplaceDisabled)?;

        let _ = &config.marketplace;
        let metadata = client.get_plugin_metadata(&request.name).await?;
        let download_url = metadata
            .download_url
            .ok_or_else(|| InstallError::MissingDownloadUrl(request.name.clone()))?;
        Ok((download_url, metadata.checksum_sha256))
    }

    async fn download_and_extract(
        &self,
        plugin_name: &str,
        download_url: &str,
        target_directory: &Path,
        checksum: Option<&str>,
        timeout: Duration,
    ) -> InstallResult<PathBuf> {
        let tmp_dir = tempfile::Builder::new().prefix("plugin_download_").tempdir()?;
        let archive_path = tmp_dir.path().join(format!("{plugin_name}.zip"));

        download_file(download_url, &archive_path, timeout).await?;

        if let Some(expected) = checksum {
            verify_checksum(&archive_path, expected).await?;
        }

        let extract_path = target_directory.join(plugin_name);
        if extract_path.exists() {
            tokio::fs::remove_dir_all(&extract_path).await?;
        }

        extract_archive(&archive_path, &extract_path).await?;
        Ok(extract_path)
    }
}

async fn download_file(url: &str, destination: &Path, timeout: Duration) -> InstallResult<()> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let response = client.get(url).send().await?.error_for_status()?;
    let mut stream = response.bytes_stream();
    let mut file = tokio::fs::File::create(destination).await?;

    while let Some(chunk) = stream.next().await {
        file.write_all(&chunk?).await?;
    }

    Ok(())
}

/// If the extracted plugin tree declares additional Rust dependencies via a
/// `Cargo.toml` manifest, fetches them with the host's package manager in a
/// blocking worker thread so the async runtime's reactor is never tied up
/// by a subprocess.
async fn install_dependencies(plugin_path: &Path) -> InstallResult<()> {
    let manifest = plugin_path.join("Cargo.toml");
    if !manifest.exists() {
        return Ok(());
    }

    tokio::task::spawn_blocking(move || -> InstallResult<()> {
        let status = Command::new("cargo")
            .arg("fetch")
            .arg("--manifest-path")
            .arg(&manifest)
            .status()
            .map_err(|source| InstallError::DependencyInstallFailed(source.to_string()))?;

        if status.success() {
            Ok(())
        } else {
            Err(InstallError::DependencyInstallFailed(format!("cargo fetch exited with {status}")))
        }
    })
    .await
    .map_err(|_| InstallError::ChecksumTaskFailed)?
}

async fn verify_checksum(path: &Path, expected: &str) -> InstallResult<()> {
    let path = path.to_path_buf();
    let expected = expected.to_lowercase();

    let actual = tokio::task::spawn_blocking(move || -> InstallResult<String> {
        let mut file = std::fs::File::open(&path)?;
        let mut hasher = Sha256::new();
        let mut buffer = [0u8; 1024 * 1024];
        loop {
            let read = file.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }
        Ok(format!("{:x}", hasher.finalize()))
    })
    .await
    .map_err(|_| InstallError::ChecksumTaskFailed)??;

    if actual == expected {
        Ok(())
    } else {
        Err(InstallError::ChecksumMismatch { expected, actual })
    }
}

/// Extracts `archive_path` into `extract_path`, rejecting any entry whose
/// path would resolve outside the extraction root.
///
/// The original implementation trusted `zipfile.extractall` to handle
/// this; this host checks every entry explicitly rather than relying
/// solely on the archive library's own sanitization.
async fn extract_archive(archive_path: &Path, extract_path: &Path) -> InstallResult<()> {
    let archive_path = archive_path.to_path_buf();
    let extract_path = extract_path.to_path_buf();

    tokio::task::spawn_blocking(move || extract_archive_sync(&archive_path, &extract_path))
        .await
        .map_err(|_| InstallError::ChecksumTaskFailed)?
}

fn extract_archive_sync(archive_path: &Path, extract_path: &Path) -> InstallResult<()> {
    let file = std::fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    std::fs::create_dir_all(extract_path)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative_path) = entry.enclosed_name() else {
            return Err(InstallError::PathTraversal(entry.name().to_string()));
        };

        let destination = extract_path.join(relative_path);
        if !destination.starts_with(extract_path) {
            return Err(InstallError::PathTraversal(entry.name().to_string()));
        }

        if entry.is_dir() {
            std::fs::create_dir_all(&destination)?;
        } else {
            if let Some(parent) = destination.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out_file = std::fs::File::create(&destination)?;
            std::io::copy(&mut entry, &mut out_file)?;
        }
    }

    Ok(())
}

fn resolve_target_directory(config: &EventConfig) -> InstallResult<PathBuf> {
    for directory in config.plugin_directories.iter().rev() {
        if std::fs::create_dir_all(directory).is_ok() && is_writable(directory) {
            return Ok(directory.clone());
        }
    }
    Err(InstallError::NoWritableDirectory)
}

fn is_writable(directory: &Path) -> bool {
    let probe = directory.join(".eventflow_write_probe");
    match std::fs::File::create(&probe) {
        Ok(_) => {
            let _ = std::fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

fn locate_installed_plugin(config: &EventConfig, plugin_name: &str) -> Option<PathBuf> {
    config
        .plugin_directories
        .iter()
        .map(|dir| dir.join(plugin_name))
        .find(|path| path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::{FileOptions, ZipWriter};

    fn build_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        let options: FileOptions<()> = FileOptions::default();
        for (name, contents) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(contents).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn locate_installed_plugin_checks_every_directory() {
        let dir = TempDir::new().unwrap();
        let plugin_dir = dir.path().join("sample");
        std::fs::create_dir_all(&plugin_dir).unwrap();

        let config = EventConfig {
            plugin_directories: vec![dir.path().to_path_buf()],
            ..Default::default()
        };

        assert_eq!(locate_installed_plugin(&config, "sample"), Some(plugin_dir));
        assert_eq!(locate_installed_plugin(&config, "missing"), None);
    }

    #[test]
    fn resolve_target_directory_prefers_the_last_writable_entry() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");

        let config = EventConfig {
            plugin_directories: vec![first.clone(), second.clone()],
            ..Default::default()
        };

        assert_eq!(resolve_target_directory(&config).unwrap(), second);
    }

    #[tokio::test]
    async fn extract_archive_rejects_path_traversal_entries() {
        let dir = TempDir::new().unwrap();
        let archive_path = dir.path().join("evil.zip");
        build_zip(&archive_path, &[("../escape.txt", b"nope")]);

        let extract_path = dir.path().join("extracted");
        let result = extract_archive(&archive_path, &extract_path).await;
        assert!(matches!(result, Err(InstallError::PathTraversal(_))));
    }

    #[tokio::test]
    async fn install_dependencies_is_a_no_op_without_a_manifest() {
        let dir = TempDir::new().unwrap();
        assert!(install_dependencies(dir.path()).await.is_ok());
    }

    #[tokio::test]
    async fn extract_archive_writes_well_formed_entries() {
        let dir = TempDir::new().unwrap();
        let archive_path = dir.path().join("sample.zip");
        build_zip(&archive_path, &[("handler.txt", b"hello")]);

        let extract_path = dir.path().join("extracted");
        extract_archive(&archive_path, &extract_path).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(extract_path.join("handler.txt")).unwrap(),
            "hello"
        );
    }
}
