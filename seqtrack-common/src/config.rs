//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration lives in a per-module TOML file at
//! `~/.config/seqtrack/<module>.toml`. A missing or unreadable file is never
//! fatal: the module logs a warning and starts with compiled defaults.
//!
//! Root folder priority:
//! 1. Command-line argument
//! 2. `SEQTRACK_ROOT_FOLDER`, then `SEQTRACK_ROOT`
//! 3. `root_folder` in the TOML file
//! 4. OS-dependent compiled default

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const ENV_ROOT_FOLDER: &str = "SEQTRACK_ROOT_FOLDER";
pub const ENV_ROOT: &str = "SEQTRACK_ROOT";

/// SQLite file name inside the root folder
pub const DATABASE_FILE: &str = "seqtrack.db";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5730;

/// Per-module bootstrap configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub bulk: BulkConfig,

    #[serde(default)]
    pub client: ClientConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path; logs go to stderr when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServiceConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkConfig {
    /// Upper bound on per-sample mutations in flight during a bulk operation
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl BulkConfig {
    /// Configured bound, never below 1
    pub fn effective_concurrency(&self) -> usize {
        self.max_concurrency.max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_concurrency() -> usize {
    crate::bulk::DEFAULT_MAX_CONCURRENCY
}

fn default_server_url() -> String {
    format!("http://{}:{}", DEFAULT_HOST, DEFAULT_PORT)
}

/// OS-dependent fallback values
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        // ~/.local/share/seqtrack, ~/Library/Application Support/seqtrack, %LOCALAPPDATA%\seqtrack
        let root_folder = dirs::data_local_dir()
            .map(|d| d.join("seqtrack"))
            .unwrap_or_else(|| PathBuf::from("./seqtrack_data"));

        Self {
            root_folder,
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

/// Resolves the root folder and loads the module's TOML file
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            cli_arg: None,
        }
    }

    /// Highest-priority override, usually from `--root-folder`
    pub fn with_cli_arg(mut self, cli_arg: Option<PathBuf>) -> Self {
        self.cli_arg = cli_arg;
        self
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// `~/.config/seqtrack/<module>.toml`
    pub fn config_file_path(&self) -> Option<PathBuf> {
        dirs::config_dir().map(|d| {
            d.join("seqtrack")
                .join(format!("{}.toml", self.module_name))
        })
    }

    /// Load the module's TOML file, falling back to defaults on any failure
    pub fn load_config(&self) -> TomlConfig {
        let Some(path) = self.config_file_path() else {
            warn!("Could not determine config directory, using defaults");
            return TomlConfig::default();
        };

        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return TomlConfig::default();
        }

        match load_toml_config(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring config file {}: {}", path.display(), e);
                TomlConfig::default()
            }
        }
    }

    /// Resolve using an already-loaded config for the TOML tier
    pub fn resolve_with(&self, config: &TomlConfig) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        for var in [ENV_ROOT_FOLDER, ENV_ROOT] {
            if let Ok(path) = std::env::var(var) {
                if !path.is_empty() {
                    return PathBuf::from(path);
                }
            }
        }

        if let Some(path) = &config.root_folder {
            return path.clone();
        }

        CompiledDefaults::for_current_platform().root_folder
    }

    pub fn resolve(&self) -> PathBuf {
        self.resolve_with(&self.load_config())
    }
}

/// Prepares the root folder on disk
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    /// Create the root folder (and parents) if missing; safe to call repeatedly
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }
}

pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Write config atomically: serialize to `<path>.tmp`, then rename over the target
///
/// On Unix the file is restricted to 0600.
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut temp_path = path.as_os_str().to_owned();
    temp_path.push(".tmp");
    let temp_path = PathBuf::from(temp_path);

    std::fs::write(&temp_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    if let Err(e) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e.into());
    }

    Ok(())
}
