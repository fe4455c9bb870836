//! Panel presentation: hand the document to the page-side renderer.

use crate::host::{ScriptPayload, ScriptTarget, TabHost};
use crate::shortcuts::ShortcutsDocument;

/// Page variable the renderer reads the document from.
pub const PANEL_DATA_VARIABLE: &str = "data";
/// Renderer bundled with the extension.
pub const PANEL_SCRIPT: &str = "init.js";

/// Inject the panel renderer into the active tab with `doc` as its data.
///
/// Does nothing for a document without sections. Returns whether an injection
/// was issued; a host failure is logged and still counts as issued.
pub async fn present(host: &dyn TabHost, doc: &ShortcutsDocument) -> bool {
    if doc.is_empty() {
        tracing::debug!(name = %doc.name, "nothing to present");
        return false;
    }

    let data = match serde_json::to_value(doc) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!("failed to serialise shortcuts for the panel: {e}");
            return false;
        }
    };

    let payload = ScriptPayload::bootstrap(PANEL_DATA_VARIABLE, data, PANEL_SCRIPT);
    if let Err(e) = host.execute_script(ScriptTarget::ActiveTab, payload).await {
        tracing::warn!("panel injection failed: {e}");
    }
    true
}
