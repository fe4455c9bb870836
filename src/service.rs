//! Shortcut lookup, merge and cache.
//!
//! [`ShortcutService`] owns the collaborators the event handlers share: the key
//! scheme, the plugin registry, the remote source, the cache and the host.

use std::sync::Arc;

use crate::domain::{root_domain, DomainKey, KeyScheme};
use crate::host::{ScriptPayload, ScriptTarget, TabHost};
use crate::plugins::{Plugin, PluginRegistry};
use crate::present;
use crate::shortcuts::{Section, ShortcutsDocument};
use crate::source::{FetchError, ShortcutSource};
use crate::storage::{ShortcutCache, SyncStorage};

/// Page variable the plugin runtime reads its shortcut list from.
pub const PLUGIN_DATA_VARIABLE: &str = "plugins";
/// Plugin runtime bundled with the extension.
pub const PLUGIN_RUNTIME_SCRIPT: &str = "plugins.js";

pub struct ShortcutService {
    keys: KeyScheme,
    registry: Arc<PluginRegistry>,
    source: Arc<dyn ShortcutSource>,
    cache: ShortcutCache,
    host: Arc<dyn TabHost>,
}

impl ShortcutService {
    pub fn new(
        keys: KeyScheme,
        registry: Arc<PluginRegistry>,
        source: Arc<dyn ShortcutSource>,
        storage: Arc<dyn SyncStorage>,
        host: Arc<dyn TabHost>,
    ) -> Self {
        Self {
            keys,
            registry,
            source,
            cache: ShortcutCache::new(storage),
            host,
        }
    }

    pub fn domain_key(&self, url: &str) -> DomainKey {
        self.keys.key_for_url(url)
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &ShortcutCache {
        &self.cache
    }

    pub fn host(&self) -> &dyn TabHost {
        self.host.as_ref()
    }

    /// Build the document for `url`, persist it under its [`DomainKey`] and
    /// return it.
    ///
    /// With a plugin registered for the root domain, the plugin's shortcuts are
    /// appended as one extra section and pushed to the active tab alongside
    /// the fetch. A malformed remote document aborts before anything is
    /// persisted. Concurrent calls for one key are not coordinated: the last
    /// write wins.
    pub async fn merge_and_persist(&self, url: &str) -> Result<ShortcutsDocument, FetchError> {
        let domain = root_domain(url);
        let key = self.keys.key_for_domain(&domain);

        let doc = match self.registry.lookup(&domain) {
            Some(plugin) => {
                let (fetched, ()) = tokio::join!(
                    self.source.fetch(&key),
                    self.init_plugin(plugin.as_ref())
                );
                fetched?.with_section(Section::plugins(plugin.shortcut_entries()))
            }
            None => self.source.fetch(&key).await?,
        };

        self.cache.put(&key, &doc).await;
        tracing::debug!(key = %key, sections = doc.sections.len(), "shortcuts cached");
        Ok(doc)
    }

    /// Hand the plugin's shortcut list to the page and start the plugin runtime.
    pub async fn init_plugin(&self, plugin: &dyn Plugin) {
        let data = match serde_json::to_value(plugin.shortcut_entries()) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(plugin = plugin.name(), "failed to serialise plugin shortcuts: {e}");
                return;
            }
        };
        let payload = ScriptPayload::bootstrap(PLUGIN_DATA_VARIABLE, data, PLUGIN_RUNTIME_SCRIPT);
        if let Err(e) = self.host.execute_script(ScriptTarget::ActiveTab, payload).await {
            tracing::warn!(plugin = plugin.name(), "plugin injection failed: {e}");
        }
    }

    /// See [`present::present`].
    pub async fn present(&self, doc: &ShortcutsDocument) -> bool {
        present::present(self.host.as_ref(), doc).await
    }
}

impl std::fmt::Debug for ShortcutService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShortcutService")
            .field("keys", &self.keys)
            .field("plugins", &self.registry.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostCommand, RecordingHost, Tab};
    use crate::shortcuts::PLUGIN_SECTION_NAME;
    use crate::storage::{MemoryStorage, SyncStorage as _};
    use crate::testing::{sample_document, FixedPlugin, StubSource, TEST_DATA_URL};
    use std::time::Duration;

    struct Fixture {
        service: Arc<ShortcutService>,
        storage: Arc<MemoryStorage>,
        host: Arc<RecordingHost>,
        source: Arc<StubSource>,
    }

    fn fixture(source: StubSource, registry: PluginRegistry) -> Fixture {
        let storage = Arc::new(MemoryStorage::new());
        let host = Arc::new(RecordingHost::with_active_tab(Tab {
            id: 1,
            url: "https://www.example.com/".into(),
        }));
        let source = Arc::new(source);
        let service = Arc::new(ShortcutService::new(
            KeyScheme::new(TEST_DATA_URL, ".json"),
            Arc::new(registry),
            source.clone(),
            storage.clone(),
            host.clone(),
        ));
        Fixture {
            service,
            storage,
            host,
            source,
        }
    }

    fn key(domain: &str) -> String {
        format!("{TEST_DATA_URL}{domain}.json")
    }

    async fn stored(storage: &MemoryStorage, key: &str) -> Option<ShortcutsDocument> {
        storage
            .get(key)
            .await
            .unwrap()
            .map(|v| serde_json::from_value(v).unwrap())
    }

    fn registry_with(domain: &str, plugin: FixedPlugin) -> PluginRegistry {
        let mut registry = PluginRegistry::new();
        registry.register(domain, Arc::new(plugin));
        registry
    }

    #[tokio::test]
    async fn without_plugin_document_is_fetched_as_is() {
        let fetched = sample_document("Example");
        let f = fixture(
            StubSource::new().serve(&key("example.com"), fetched.clone()),
            PluginRegistry::new(),
        );

        let doc = f
            .service
            .merge_and_persist("https://www.example.com/page?q=1")
            .await
            .unwrap();

        assert_eq!(doc, fetched);
        assert_eq!(stored(&f.storage, &key("example.com")).await, Some(fetched));
        assert!(f.host.commands().is_empty(), "no plugin means no injection");
        assert_eq!(f.source.calls(), 1);
    }

    #[tokio::test]
    async fn with_plugin_one_section_is_appended() {
        let fetched = sample_document("Google");
        let plugin = FixedPlugin::new("gmail");
        let expected_entries = plugin.shortcut_entries();
        let f = fixture(
            StubSource::new().serve(&key("google.com"), fetched.clone()),
            registry_with("google.com", plugin),
        );

        let doc = f
            .service
            .merge_and_persist("https://mail.google.com/mail/u/0/#inbox")
            .await
            .unwrap();

        assert_eq!(doc.sections.len(), fetched.sections.len() + 1);
        assert_eq!(doc.sections[..fetched.sections.len()], fetched.sections[..]);
        let last = doc.sections.last().unwrap();
        assert_eq!(last.name, PLUGIN_SECTION_NAME);
        assert_eq!(last.shortcuts, expected_entries);
        assert_eq!(stored(&f.storage, &key("google.com")).await, Some(doc));
    }

    #[tokio::test]
    async fn with_plugin_shortcuts_are_injected_once() {
        let plugin = FixedPlugin::new("gmail");
        let entries = plugin.shortcut_entries();
        let f = fixture(StubSource::new(), registry_with("google.com", plugin));

        f.service.merge_and_persist("https://mail.google.com/").await.unwrap();

        let commands = f.host.commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(
            commands[0],
            HostCommand::ExecuteScript {
                target: ScriptTarget::ActiveTab,
                payload: ScriptPayload::bootstrap(
                    "plugins",
                    serde_json::to_value(&entries).unwrap(),
                    "plugins.js"
                ),
            }
        );
    }

    #[tokio::test]
    async fn plugin_section_is_added_even_when_remote_is_missing() {
        let f = fixture(
            StubSource::new(),
            registry_with("google.com", FixedPlugin::new("gmail")),
        );

        let doc = f.service.merge_and_persist("google.com").await.unwrap();
        assert_eq!(doc.name, "Shortcuts");
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.sections[0].name, "Plugins");
    }

    #[tokio::test]
    async fn missing_remote_data_is_cached_as_default() {
        let f = fixture(StubSource::new(), PluginRegistry::new());
        let doc = f.service.merge_and_persist("https://nothing.test/").await.unwrap();
        assert_eq!(doc, ShortcutsDocument::default());
        assert_eq!(
            stored(&f.storage, &key("nothing.test")).await,
            Some(ShortcutsDocument::default())
        );
    }

    #[tokio::test]
    async fn malformed_remote_data_propagates_and_is_not_cached() {
        let f = fixture(
            StubSource::new().malformed(&key("broken.com")),
            PluginRegistry::new(),
        );

        let result = f.service.merge_and_persist("https://broken.com/").await;
        assert!(matches!(result, Err(FetchError::Malformed { .. })));
        assert!(f.storage.is_empty());
    }

    #[tokio::test]
    async fn injection_failure_does_not_block_merge() {
        let f = fixture(
            StubSource::new(),
            registry_with("google.com", FixedPlugin::new("gmail")),
        );
        f.host.set_rejecting(true);

        let doc = f.service.merge_and_persist("https://google.com/").await.unwrap();
        assert_eq!(doc.sections.len(), 1);
        assert!(f.storage.get(&key("google.com")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn each_call_writes_a_fresh_document() {
        let f = fixture(
            StubSource::new().serve(&key("example.com"), sample_document("Example")),
            registry_with("example.com", FixedPlugin::new("ex")),
        );

        let first = f.service.merge_and_persist("example.com").await.unwrap();
        let second = f.service.merge_and_persist("www.example.com").await.unwrap();

        // Plugin section is appended to the freshly fetched doc, not stacked
        assert_eq!(first, second);
        assert_eq!(second.sections.len(), 2);
        assert_eq!(f.source.calls(), 2);
    }

    #[tokio::test]
    async fn concurrent_merges_last_write_wins() {
        // Two sources for the same key: the slow one persists last
        let slow_doc = sample_document("Slow");
        let fast_doc = sample_document("Fast");

        let storage = Arc::new(MemoryStorage::new());
        let host: Arc<RecordingHost> = Arc::new(RecordingHost::new());
        let registry = Arc::new(PluginRegistry::new());
        let service_for = |source: StubSource| {
            Arc::new(ShortcutService::new(
                KeyScheme::new(TEST_DATA_URL, ".json"),
                registry.clone(),
                Arc::new(source),
                storage.clone(),
                host.clone(),
            ))
        };

        let slow = service_for(StubSource::new().serve_after(
            &key("example.com"),
            slow_doc.clone(),
            Duration::from_millis(150),
        ));
        let fast = service_for(StubSource::new().serve(&key("example.com"), fast_doc.clone()));

        let slow_task = tokio::spawn({
            let slow = slow.clone();
            async move { slow.merge_and_persist("https://example.com/").await }
        });
        let fast_task = tokio::spawn({
            let fast = fast.clone();
            async move { fast.merge_and_persist("https://example.com/").await }
        });

        assert_eq!(fast_task.await.unwrap().unwrap(), fast_doc);
        assert_eq!(slow_task.await.unwrap().unwrap(), slow_doc);
        assert_eq!(stored(&storage, &key("example.com")).await, Some(slow_doc));
    }

    #[tokio::test]
    async fn present_delegates_to_host() {
        let f = fixture(StubSource::new(), PluginRegistry::new());
        assert!(!f.service.present(&ShortcutsDocument::default()).await);
        assert!(f.service.present(&sample_document("X")).await);
        assert_eq!(f.host.commands().len(), 1);
    }
}
