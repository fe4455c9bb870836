use anyhow::Context;
use std::sync::Arc;

use crate::config::ExtensionConfig;
use crate::events::Background;
use crate::host::TabHost;
use crate::plugins::PluginRegistry;
use crate::service::ShortcutService;
use crate::source::{HttpShortcutSource, ShortcutSource};
use crate::storage::{FileStorage, SyncStorage};

/// Everything a running extension shares: the validated config and the
/// service the event handlers drive.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: ExtensionConfig,
    pub service: Arc<ShortcutService>,
}

impl AppState {
    /// Wire the HTTP source, file storage and on-disk plugins from `config`.
    /// `host` is where injections go.
    pub fn from_config(mut config: ExtensionConfig, host: Arc<dyn TabHost>) -> anyhow::Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!(e))
            .context("invalid configuration")?;

        let source = HttpShortcutSource::new(config.request_timeout())
            .context("failed to build HTTP client")?;
        let storage = FileStorage::new(config.storage_path());

        let mut registry = PluginRegistry::new();
        let plugins_dir = config.plugins_dir();
        let loaded = registry.load_dir(&plugins_dir);
        tracing::info!(
            count = loaded,
            dir = %plugins_dir.display(),
            "plugins loaded"
        );

        Ok(Self::with_parts(
            config,
            Arc::new(registry),
            Arc::new(source),
            Arc::new(storage),
            host,
        ))
    }

    /// Wire explicit collaborators. `config` is taken as already validated.
    pub fn with_parts(
        config: ExtensionConfig,
        registry: Arc<PluginRegistry>,
        source: Arc<dyn ShortcutSource>,
        storage: Arc<dyn SyncStorage>,
        host: Arc<dyn TabHost>,
    ) -> Self {
        let service = Arc::new(ShortcutService::new(
            config.key_scheme(),
            registry,
            source,
            storage,
            host,
        ));
        Self { config, service }
    }

    pub fn background(&self) -> Background {
        Background::new(self.service.clone(), self.config.toggle_command.clone())
    }
}
