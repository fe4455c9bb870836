//! Shortcut document model.
//!
//! A document is what the panel renders: a named list of sections, each holding
//! key combinations and the action they trigger. Documents are rebuilt on every
//! fetch/merge cycle and never edited in place once persisted.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the document handed out when the remote source has nothing.
pub const DEFAULT_DOCUMENT_NAME: &str = "Shortcuts";

/// Section appended when a plugin contributes shortcuts.
pub const PLUGIN_SECTION_NAME: &str = "Plugins";
pub const PLUGIN_SECTION_DESCRIPTION: &str = "Shortcuts from plugins";

/// A single key binding shown in the panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortcutEntry {
    pub keys: Vec<String>,
    pub action: String,
    /// Fields the panel may use that this crate does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub shortcuts: Vec<ShortcutEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Section {
    /// The section carrying plugin-provided shortcuts.
    pub fn plugins(shortcuts: Vec<ShortcutEntry>) -> Self {
        Self {
            name: PLUGIN_SECTION_NAME.to_string(),
            description: Some(PLUGIN_SECTION_DESCRIPTION.to_string()),
            shortcuts,
            extra: Map::new(),
        }
    }
}

/// The full cheat-sheet for one domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortcutsDocument {
    pub name: String,
    pub sections: Vec<Section>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ShortcutsDocument {
    fn default() -> Self {
        Self {
            name: DEFAULT_DOCUMENT_NAME.to_string(),
            sections: Vec::new(),
            extra: Map::new(),
        }
    }
}

impl ShortcutsDocument {
    /// True when there is nothing to render.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Consume the document and return it with `section` appended last.
    /// Existing section order is kept.
    pub fn with_section(mut self, section: Section) -> Self {
        self.sections.push(section);
        self
    }

    /// Total number of entries across all sections.
    pub fn shortcut_count(&self) -> usize {
        self.sections.iter().map(|s| s.shortcuts.len()).sum()
    }
}
