//! Browser event handlers.
//!
//! Three independent bindings drive the extension:
//! - the toggle command shows the panel, from cache when possible;
//! - a completed navigation starts the domain's plugin scripts;
//! - a tab URL change re-fetches and re-caches in the background.
//!
//! [`Background::run`] handles each event in its own task, so handlers for
//! the same domain can interleave and the cache ends up with whichever write
//! lands last.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::domain::root_domain;
use crate::host::{ScriptPayload, ScriptTarget, Tab, TabId};
use crate::service::ShortcutService;
use crate::shortcuts::ShortcutsDocument;

/// What changed on a tab update. Only a URL change matters here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Events the browser delivers to the background logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "event")]
pub enum HostEvent {
    /// The user switched tabs. Only the host tracks this.
    TabActivated {
        tab: Tab,
    },
    Command {
        name: String,
    },
    #[serde(rename_all = "camelCase")]
    NavigationCompleted {
        tab_id: TabId,
        url: String,
    },
    #[serde(rename_all = "camelCase")]
    TabUpdated {
        tab_id: TabId,
        change: TabChange,
        tab: Tab,
    },
}

/// Message telling a plugin's content script to load its shortcuts.
pub fn load_shortcuts_message() -> serde_json::Value {
    serde_json::json!({ "loadShortcuts": true })
}

#[derive(Debug, Clone)]
pub struct Background {
    service: Arc<ShortcutService>,
    toggle_command: String,
}

impl Background {
    pub fn new(service: Arc<ShortcutService>, toggle_command: impl Into<String>) -> Self {
        Self {
            service,
            toggle_command: toggle_command.into(),
        }
    }

    pub fn service(&self) -> &ShortcutService {
        &self.service
    }

    pub async fn handle(&self, event: HostEvent) {
        match event {
            HostEvent::TabActivated { tab } => {
                tracing::trace!(tab_id = tab.id, "tab activated");
            }
            HostEvent::Command { name } => {
                self.on_command(&name).await;
            }
            HostEvent::NavigationCompleted { tab_id, url } => {
                self.on_navigation_completed(tab_id, &url).await;
            }
            HostEvent::TabUpdated { tab_id, change, tab } => {
                self.on_tab_updated(tab_id, &change, &tab).await;
            }
        }
    }

    /// Toggle command: show cached shortcuts, or build them first.
    /// Returns the document presented, if the flow got that far.
    pub async fn on_command(&self, name: &str) -> Option<ShortcutsDocument> {
        if name != self.toggle_command {
            tracing::debug!(command = name, "ignoring unknown command");
            return None;
        }

        let Some(tab) = self.service.host().active_tab().await else {
            tracing::warn!("toggle command without an active tab");
            return None;
        };

        let key = self.service.domain_key(&tab.url);
        let doc = match self.service.cache().get(&key).await {
            Some(cached) => {
                tracing::debug!(key = %key, "presenting cached shortcuts");
                cached
            }
            None => match self.service.merge_and_persist(&tab.url).await {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::error!(url = %tab.url, "could not load shortcuts: {e}");
                    return None;
                }
            },
        };

        self.service.present(&doc).await;
        Some(doc)
    }

    /// Navigation completed: start the plugin for the page's domain, if any.
    /// The stylesheet and the load message go out even when the script
    /// injection fails. Returns whether a plugin was found.
    pub async fn on_navigation_completed(&self, tab_id: TabId, url: &str) -> bool {
        let domain = root_domain(url);
        let Some(plugin) = self.service.registry().lookup(&domain) else {
            return false;
        };

        let host = self.service.host();
        let script = ScriptPayload::file(plugin.script_file());
        if let Err(e) = host.execute_script(ScriptTarget::ActiveTab, script).await {
            tracing::warn!(plugin = plugin.name(), "plugin script injection failed: {e}");
        }
        if let Err(e) = host.insert_css(tab_id, &plugin.style_file()).await {
            tracing::warn!(plugin = plugin.name(), tab_id, "plugin stylesheet injection failed: {e}");
        }
        if let Err(e) = host.send_message(tab_id, load_shortcuts_message()).await {
            tracing::warn!(plugin = plugin.name(), tab_id, "plugin message failed: {e}");
        }
        true
    }

    /// Tab URL changed: warm the cache for the new URL.
    pub async fn on_tab_updated(&self, tab_id: TabId, change: &TabChange, tab: &Tab) {
        if change.url.is_none() {
            return;
        }
        if let Err(e) = self.service.merge_and_persist(&tab.url).await {
            tracing::error!(tab_id, url = %tab.url, "cache warm failed: {e}");
        }
    }

    /// Handle events until the sender side closes, then wait for the handlers
    /// still running.
    pub async fn run(&self, mut events: mpsc::Receiver<HostEvent>) {
        let mut tasks = JoinSet::new();

        while let Some(event) = events.recv().await {
            let background = self.clone();
            tasks.spawn(async move { background.handle(event).await });

            // Reap finished handlers so the set doesn't grow unbounded
            while let Some(done) = tasks.try_join_next() {
                if let Err(e) = done {
                    tracing::error!("event handler panicked: {e}");
                }
            }
        }

        while let Some(done) = tasks.join_next().await {
            if let Err(e) = done {
                tracing::error!("event handler panicked: {e}");
            }
        }
    }
}
