//! Per-domain plugins: registry, manifests and discovery.
//!
//! A plugin contributes extra shortcuts for one root domain plus companion
//! `{name}.js` / `{name}.css` files injected on navigation. At most one plugin
//! is registered per domain.
//!
//! Plugins are either registered in code or declared on disk in
//! `{plugins_dir}/{id}/manifest.json`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path};
use std::sync::Arc;

use crate::shortcuts::ShortcutEntry;

// ---------------------------------------------------------------------------
// Actions and shortcuts
// ---------------------------------------------------------------------------

/// What a plugin shortcut does in the page. Rendered to JavaScript source so it
/// can cross into the page context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PluginAction {
    /// Raw function source, e.g. `() => window.scrollTo(0, 0)`.
    Script(String),
    /// Click the first element matching a CSS selector.
    Click(String),
    /// Focus the first element matching a CSS selector.
    Focus(String),
}

/// JS string literal for `s`. JSON string syntax is valid JavaScript.
fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

impl fmt::Display for PluginAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Script(source) => f.write_str(source),
            Self::Click(selector) => write!(
                f,
                "() => {{ const el = document.querySelector({}); if (el) el.click(); }}",
                js_string(selector)
            ),
            Self::Focus(selector) => write!(
                f,
                "() => {{ const el = document.querySelector({}); if (el) el.focus(); }}",
                js_string(selector)
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginShortcut {
    pub keys: Vec<String>,
    pub action: PluginAction,
}

impl PluginShortcut {
    /// Panel entry with the action as source text.
    pub fn to_entry(&self) -> ShortcutEntry {
        ShortcutEntry {
            keys: self.keys.clone(),
            action: self.action.to_string(),
            extra: Default::default(),
        }
    }
}

/// A domain plugin.
pub trait Plugin: Send + Sync + fmt::Debug {
    /// Stem of the companion script and stylesheet.
    fn name(&self) -> &str;
    fn shortcuts(&self) -> Vec<PluginShortcut>;

    fn script_file(&self) -> String {
        format!("{}.js", self.name())
    }

    fn style_file(&self) -> String {
        format!("{}.css", self.name())
    }

    /// Shortcuts as panel entries, in declaration order.
    fn shortcut_entries(&self) -> Vec<ShortcutEntry> {
        self.shortcuts().iter().map(PluginShortcut::to_entry).collect()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Domain -> plugin table. Built once at start-up and shared behind an `Arc`.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, Arc<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `plugin` for `domain`, returning the plugin it replaced.
    pub fn register(
        &mut self,
        domain: impl Into<String>,
        plugin: Arc<dyn Plugin>,
    ) -> Option<Arc<dyn Plugin>> {
        let domain = domain.into();
        let previous = self.plugins.insert(domain.clone(), plugin);
        if previous.is_some() {
            tracing::warn!(domain = %domain, "plugin registration replaced an existing one");
        }
        previous
    }

    pub fn lookup(&self, domain: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.get(domain).cloned()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// `(domain, plugin)` pairs sorted by domain.
    pub fn entries(&self) -> Vec<(String, Arc<dyn Plugin>)> {
        let mut entries: Vec<_> = self
            .plugins
            .iter()
            .map(|(d, p)| (d.clone(), Arc::clone(p)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Register every valid manifest plugin found under `dir`.
    /// Returns how many were registered.
    pub fn load_dir(&mut self, dir: &Path) -> usize {
        let manifests = scan_plugin_manifests(dir);
        let count = manifests.len();
        for manifest in manifests {
            let domain = manifest.domain.clone();
            self.register(domain, Arc::new(ManifestPlugin::new(manifest)));
        }
        count
    }
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// Plugin manifest as declared in `manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    pub id: String,
    pub name: String,
    pub domain: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub shortcuts: Vec<PluginShortcut>,
}

/// Validate a parsed manifest for required fields and sanity.
fn validate_manifest(manifest: &PluginManifest, dir_name: &str) -> Result<(), String> {
    if manifest.id.is_empty() {
        return Err("id is empty".into());
    }
    if manifest.id != dir_name {
        return Err(format!(
            "id \"{}\" does not match directory name \"{}\"",
            manifest.id, dir_name
        ));
    }
    if manifest.name.is_empty() {
        return Err("name is empty".into());
    }
    // name becomes a file stem; it must not point outside the bundle
    if is_path_escape(&manifest.name) || manifest.name.contains(['/', '\\']) {
        return Err(format!("name \"{}\" is not a plain file stem", manifest.name));
    }
    if manifest.domain.is_empty() {
        return Err("domain is empty".into());
    }
    for (i, shortcut) in manifest.shortcuts.iter().enumerate() {
        if shortcut.keys.is_empty() || shortcut.keys.iter().any(String::is_empty) {
            return Err(format!("shortcut #{i} has no keys"));
        }
    }
    Ok(())
}

/// Returns true if a relative path attempts to escape its root via `..`,
/// absolute components, or other shenanigans.
fn is_path_escape(relative: &str) -> bool {
    let path = Path::new(relative);

    if path.is_absolute() {
        return true;
    }

    path.components().any(|component| {
        matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

/// Scan `dir` and return all valid manifests, sorted by id.
/// Invalid manifests are logged and skipped; they never cause an error.
pub fn scan_plugin_manifests(dir: &Path) -> Vec<PluginManifest> {
    if !dir.exists() {
        return Vec::new();
    }

    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(err) => {
            tracing::warn!("Failed to read plugins dir {}: {err}", dir.display());
            return Vec::new();
        }
    };

    let mut manifests = Vec::new();

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let Some(dir_name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string)
        else {
            continue;
        };

        if dir_name.starts_with('.') {
            continue;
        }

        let manifest_path = path.join("manifest.json");
        let manifest_data = match std::fs::read_to_string(&manifest_path) {
            Ok(d) => d,
            Err(err) => {
                tracing::warn!("[plugins] {dir_name}: failed to read manifest.json: {err}");
                continue;
            }
        };

        let manifest: PluginManifest = match serde_json::from_str(&manifest_data) {
            Ok(m) => m,
            Err(err) => {
                tracing::warn!("[plugins] {dir_name}: invalid manifest.json: {err}");
                continue;
            }
        };

        if let Err(err) = validate_manifest(&manifest, &dir_name) {
            tracing::warn!("[plugins] {dir_name}: manifest validation failed: {err}");
            continue;
        }

        manifests.push(manifest);
    }

    manifests.sort_by(|a, b| a.id.cmp(&b.id));
    manifests
}

/// Plugin declared by a manifest file.
#[derive(Debug, Clone)]
pub struct ManifestPlugin {
    manifest: PluginManifest,
}

impl ManifestPlugin {
    pub fn new(manifest: PluginManifest) -> Self {
        Self { manifest }
    }

    pub fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }
}

impl Plugin for ManifestPlugin {
    fn name(&self) -> &str {
        &self.manifest.name
    }

    fn shortcuts(&self) -> Vec<PluginShortcut> {
        self.manifest.shortcuts.clone()
    }
}
