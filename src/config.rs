use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::domain::KeyScheme;

/// Default remote location of the per-domain shortcut files.
pub const DEFAULT_DATA_URL: &str =
    "https://raw.githubusercontent.com/UseMacro/macro-data/master/configs/";

const CONFIG_FILE: &str = "config.json";
const STORAGE_FILE: &str = "storage.json";
const PLUGINS_DIR: &str = "plugins";

/// Get the config directory using platform-appropriate location.
///
/// - macOS: `~/Library/Application Support/macro-shortcuts/`
/// - Linux: `~/.config/macro-shortcuts/` (or `$XDG_CONFIG_HOME`)
/// - Windows: `%APPDATA%/macro-shortcuts/`
///
/// Falls back to `~/.macro-shortcuts/` if the platform dir is unavailable.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("macro-shortcuts"))
        .unwrap_or_else(fallback_dotdir)
}

fn fallback_dotdir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".macro-shortcuts")
}

/// Load a JSON config file, returning Default if missing or corrupt.
/// Logs when the file exists but cannot be read or parsed, so a corrupt file
/// shows up in logs instead of silently resetting state.
pub(crate) fn load_json_config<T: DeserializeOwned + Default>(path: &Path) -> T {
    if !path.exists() {
        return T::default();
    }
    let content = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("Could not read config {}: {e}", path.display());
            return T::default();
        }
    };
    match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!("Corrupt config {}: {e}. Using defaults.", path.display());
            T::default()
        }
    }
}

/// Save a JSON file atomically (temp file + rename).
/// Sets 0600 permissions on Unix.
pub(crate) fn save_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), String> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .map_err(|e| format!("Failed to create directory {}: {e}", dir.display()))?;

    let json = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to serialize {}: {e}", path.display()))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| format!("Invalid file path: {}", path.display()))?;
    let temp = dir.join(format!("{file_name}.tmp.{}", std::process::id()));

    std::fs::write(&temp, &json).map_err(|e| format!("Failed to write temp file: {e}"))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&temp, perms)
            .map_err(|e| format!("Failed to set permissions: {e}"))?;
    }

    // Either the old file or the new one exists, never a partial write
    std::fs::rename(&temp, path).map_err(|e| {
        let _ = std::fs::remove_file(&temp);
        format!("Failed to commit {}: {e}", path.display())
    })?;

    Ok(())
}

// ---------------------------------------------------------------------------
// ExtensionConfig
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtensionConfig {
    /// Base URL the per-domain shortcut files live under
    #[serde(default = "default_data_url")]
    pub data_url: String,
    /// Extension appended to the root domain to form the file name
    #[serde(default = "default_file_ext")]
    pub file_ext: String,
    /// Keyboard command that toggles the panel
    #[serde(default = "default_toggle_command")]
    pub toggle_command: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Synced storage file (defaults to `{config_dir}/storage.json`)
    #[serde(default)]
    pub storage_path: Option<PathBuf>,
    /// Plugin manifests directory (defaults to `{config_dir}/plugins`)
    #[serde(default)]
    pub plugins_dir: Option<PathBuf>,
    /// Fallback filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_data_url() -> String {
    DEFAULT_DATA_URL.to_string()
}

fn default_file_ext() -> String {
    ".json".to_string()
}

fn default_toggle_command() -> String {
    "toggle-popup".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            data_url: default_data_url(),
            file_ext: default_file_ext(),
            toggle_command: default_toggle_command(),
            request_timeout_secs: default_request_timeout_secs(),
            storage_path: None,
            plugins_dir: None,
            log_level: default_log_level(),
        }
    }
}

impl ExtensionConfig {
    /// Check the config and normalise `data_url` to end with `/`.
    pub fn validate(&mut self) -> Result<(), String> {
        let parsed =
            url::Url::parse(&self.data_url).map_err(|e| format!("Invalid data_url: {e}"))?;
        match parsed.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(format!(
                    "data_url scheme \"{scheme}\" is not allowed; use http or https"
                ));
            }
        }
        if !self.data_url.ends_with('/') {
            self.data_url.push('/');
        }

        if !self.file_ext.starts_with('.') || self.file_ext.len() < 2 {
            return Err(format!(
                "file_ext \"{}\" must start with '.' and name an extension",
                self.file_ext
            ));
        }
        if self.toggle_command.is_empty() {
            return Err("toggle_command is empty".into());
        }
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be positive".into());
        }
        Ok(())
    }

    pub fn key_scheme(&self) -> KeyScheme {
        KeyScheme::new(self.data_url.clone(), self.file_ext.clone())
    }

    pub fn storage_path(&self) -> PathBuf {
        self.storage_path
            .clone()
            .unwrap_or_else(|| config_dir().join(STORAGE_FILE))
    }

    pub fn plugins_dir(&self) -> PathBuf {
        self.plugins_dir
            .clone()
            .unwrap_or_else(|| config_dir().join(PLUGINS_DIR))
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}

/// Default location of the config file.
pub fn default_config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE)
}

pub fn load_config_from(path: &Path) -> ExtensionConfig {
    load_json_config(path)
}

pub fn save_config_to(path: &Path, config: &ExtensionConfig) -> Result<(), String> {
    save_json_file(path, config)
}
