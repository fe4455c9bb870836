//! Browser host capabilities: tabs, script/CSS injection and tab messaging.
//!
//! The extension logic only ever issues one-way commands against [`TabHost`].
//! [`RecordingHost`] keeps them in memory; [`ChannelHost`] forwards them to a
//! channel so a front end (the `serve` loop) can relay them to a real browser.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

pub type TabId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub id: TabId,
    pub url: String,
}

/// Which tab a script goes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "tabId")]
pub enum ScriptTarget {
    ActiveTab,
    Tab(TabId),
}

/// What gets executed in the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum ScriptPayload {
    /// A packaged script file.
    File { file: String },
    /// Bind `variable` to `data` in the page, then run `file` which reads it.
    Bootstrap {
        variable: String,
        data: Value,
        file: String,
    },
}

impl ScriptPayload {
    pub fn file(file: impl Into<String>) -> Self {
        Self::File { file: file.into() }
    }

    pub fn bootstrap(variable: impl Into<String>, data: Value, file: impl Into<String>) -> Self {
        Self::Bootstrap {
            variable: variable.into(),
            data,
            file: file.into(),
        }
    }

    /// Code executed before the file, e.g. `var data = {...};`.
    pub fn prelude(&self) -> Option<String> {
        match self {
            Self::File { .. } => None,
            Self::Bootstrap { variable, data, .. } => Some(format!("var {variable} = {data};")),
        }
    }

    pub fn script_file(&self) -> &str {
        match self {
            Self::File { file } | Self::Bootstrap { file, .. } => file,
        }
    }
}

/// One-way command issued against the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "command")]
pub enum HostCommand {
    #[serde(rename_all = "camelCase")]
    ExecuteScript {
        target: ScriptTarget,
        payload: ScriptPayload,
    },
    #[serde(rename_all = "camelCase")]
    InsertCss { tab_id: TabId, file: String },
    #[serde(rename_all = "camelCase")]
    SendMessage { tab_id: TabId, message: Value },
}

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("no active tab")]
    NoActiveTab,
    #[error("host rejected command: {0}")]
    Rejected(String),
    #[error("host disconnected")]
    Disconnected,
}

/// Capabilities the extension needs from the browser.
#[async_trait]
pub trait TabHost: Send + Sync {
    async fn active_tab(&self) -> Option<Tab>;
    async fn execute_script(
        &self,
        target: ScriptTarget,
        payload: ScriptPayload,
    ) -> Result<(), HostError>;
    async fn insert_css(&self, tab_id: TabId, file: &str) -> Result<(), HostError>;
    async fn send_message(&self, tab_id: TabId, message: Value) -> Result<(), HostError>;
}

// ---------------------------------------------------------------------------
// RecordingHost
// ---------------------------------------------------------------------------

/// Keeps every command in order. Can be told to reject commands.
#[derive(Debug, Default)]
pub struct RecordingHost {
    active: RwLock<Option<Tab>>,
    commands: Mutex<Vec<HostCommand>>,
    reject: AtomicBool,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_active_tab(tab: Tab) -> Self {
        let host = Self::new();
        host.set_active_tab(Some(tab));
        host
    }

    pub fn set_active_tab(&self, tab: Option<Tab>) {
        *self.active.write() = tab;
    }

    /// Reject all further commands (they are still not recorded).
    pub fn set_rejecting(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    pub fn commands(&self) -> Vec<HostCommand> {
        self.commands.lock().clone()
    }

    pub fn take_commands(&self) -> Vec<HostCommand> {
        std::mem::take(&mut *self.commands.lock())
    }

    fn record(&self, command: HostCommand) -> Result<(), HostError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(HostError::Rejected("recording host is rejecting".into()));
        }
        self.commands.lock().push(command);
        Ok(())
    }
}

#[async_trait]
impl TabHost for RecordingHost {
    async fn active_tab(&self) -> Option<Tab> {
        self.active.read().clone()
    }

    async fn execute_script(
        &self,
        target: ScriptTarget,
        payload: ScriptPayload,
    ) -> Result<(), HostError> {
        self.record(HostCommand::ExecuteScript { target, payload })
    }

    async fn insert_css(&self, tab_id: TabId, file: &str) -> Result<(), HostError> {
        self.record(HostCommand::InsertCss {
            tab_id,
            file: file.to_string(),
        })
    }

    async fn send_message(&self, tab_id: TabId, message: Value) -> Result<(), HostError> {
        self.record(HostCommand::SendMessage { tab_id, message })
    }
}

// ---------------------------------------------------------------------------
// ChannelHost
// ---------------------------------------------------------------------------

/// Forwards commands to an unbounded channel. The active tab is whatever the
/// front end last reported.
#[derive(Debug)]
pub struct ChannelHost {
    active: RwLock<Option<Tab>>,
    tx: mpsc::UnboundedSender<HostCommand>,
}

impl ChannelHost {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HostCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let host = Self {
            active: RwLock::new(None),
            tx,
        };
        (host, rx)
    }

    pub fn set_active_tab(&self, tab: Option<Tab>) {
        *self.active.write() = tab;
    }

    fn forward(&self, command: HostCommand) -> Result<(), HostError> {
        self.tx.send(command).map_err(|_| HostError::Disconnected)
    }
}

#[async_trait]
impl TabHost for ChannelHost {
    async fn active_tab(&self) -> Option<Tab> {
        self.active.read().clone()
    }

    async fn execute_script(
        &self,
        target: ScriptTarget,
        payload: ScriptPayload,
    ) -> Result<(), HostError> {
        if target == ScriptTarget::ActiveTab && self.active.read().is_none() {
            return Err(HostError::NoActiveTab);
        }
        self.forward(HostCommand::ExecuteScript { target, payload })
    }

    async fn insert_css(&self, tab_id: TabId, file: &str) -> Result<(), HostError> {
        self.forward(HostCommand::InsertCss {
            tab_id,
            file: file.to_string(),
        })
    }

    async fn send_message(&self, tab_id: TabId, message: Value) -> Result<(), HostError> {
        self.forward(HostCommand::SendMessage { tab_id, message })
    }
}
