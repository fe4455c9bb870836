//! Shared test doubles.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::domain::DomainKey;
use crate::plugins::{Plugin, PluginAction, PluginShortcut};
use crate::shortcuts::{Section, ShortcutEntry, ShortcutsDocument};
use crate::source::{FetchError, ShortcutSource};

pub(crate) const TEST_DATA_URL: &str = "https://data.test/configs/";

enum Canned {
    Document(ShortcutsDocument, Duration),
    Malformed,
}

/// Source answering from a table; unknown keys get the default document the
/// way a 404 would.
#[derive(Default)]
pub(crate) struct StubSource {
    answers: DashMap<String, Canned>,
    calls: AtomicUsize,
}

impl StubSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn serve(self, key: &str, doc: ShortcutsDocument) -> Self {
        self.serve_after(key, doc, Duration::ZERO)
    }

    pub(crate) fn serve_after(self, key: &str, doc: ShortcutsDocument, delay: Duration) -> Self {
        self.answers.insert(key.to_string(), Canned::Document(doc, delay));
        self
    }

    pub(crate) fn malformed(self, key: &str) -> Self {
        self.answers.insert(key.to_string(), Canned::Malformed);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ShortcutSource for StubSource {
    async fn fetch(&self, key: &DomainKey) -> Result<ShortcutsDocument, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = match self.answers.get(key.as_str()) {
            Some(entry) => match entry.value() {
                Canned::Document(doc, delay) => Ok((doc.clone(), *delay)),
                Canned::Malformed => Err(()),
            },
            None => return Ok(ShortcutsDocument::default()),
        };
        match answer {
            Ok((doc, delay)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(doc)
            }
            Err(()) => {
                let source = serde_json::from_str::<ShortcutsDocument>("not json").unwrap_err();
                Err(FetchError::Malformed {
                    key: key.to_string(),
                    source,
                })
            }
        }
    }
}

/// Plugin with fixed shortcuts.
#[derive(Debug)]
pub(crate) struct FixedPlugin {
    pub(crate) name: String,
    pub(crate) shortcuts: Vec<PluginShortcut>,
}

impl FixedPlugin {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            shortcuts: vec![
                PluginShortcut {
                    keys: vec!["j".into()],
                    action: PluginAction::Script("() => next()".into()),
                },
                PluginShortcut {
                    keys: vec!["shift".into(), "c".into()],
                    action: PluginAction::Click("#compose".into()),
                },
            ],
        }
    }
}

impl Plugin for FixedPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn shortcuts(&self) -> Vec<PluginShortcut> {
        self.shortcuts.clone()
    }
}

/// A one-section document named `name`.
pub(crate) fn sample_document(name: &str) -> ShortcutsDocument {
    ShortcutsDocument {
        name: name.to_string(),
        sections: vec![Section {
            name: "General".into(),
            description: Some("Everywhere on the site".into()),
            shortcuts: vec![ShortcutEntry {
                keys: vec!["?".into()],
                action: "Show help".into(),
                extra: Default::default(),
            }],
            extra: Default::default(),
        }],
        extra: Default::default(),
    }
}
