//! Keyboard shortcut cheat-sheets for the site in the active tab.
//!
//! The background logic of the extension: derive a per-domain key from the
//! tab URL, fetch that domain's shortcut document, merge in shortcuts from a
//! site plugin, cache the result in synced storage and hand it to the page for
//! display. Browser capabilities sit behind [`host::TabHost`] and
//! [`storage::SyncStorage`], so the same logic runs from the command line.

pub mod cli;
pub mod config;
pub mod domain;
pub mod events;
pub mod host;
pub mod logging;
pub mod plugins;
pub mod present;
pub mod service;
pub mod shortcuts;
pub mod source;
pub mod state;
pub mod storage;

#[cfg(test)]
mod testing;

use anyhow::Context;
use clap::Parser;

pub use domain::{root_domain, DomainKey, KeyScheme};
pub use events::{Background, HostEvent};
pub use service::ShortcutService;
pub use shortcuts::{Section, ShortcutEntry, ShortcutsDocument};
pub use state::AppState;

/// Parse arguments, set up logging and run the selected command.
pub fn run() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let config = cli.load_config();
    logging::init_logging(&config.log_level);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    runtime.block_on(cli::execute(cli, config))
}
