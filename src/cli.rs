//! Command-line host.
//!
//! One-shot subcommands run a single flow against a [`RecordingHost`] and print
//! what the extension would have asked the browser to do. `serve` is the long
//! running form: host events come in as JSON lines on stdin and host commands
//! go out as JSON lines on stdout.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::config::{self, ExtensionConfig};
use crate::domain::root_domain;
use crate::events::HostEvent;
use crate::host::{ChannelHost, HostCommand, RecordingHost, Tab, TabId};
use crate::state::AppState;

/// Tab id used for the single simulated tab of one-shot commands.
const ONESHOT_TAB_ID: TabId = 1;

/// Events buffered between the stdin reader and the dispatcher.
const EVENT_QUEUE_CAPACITY: usize = 64;

#[derive(Parser, Debug)]
#[command(name = "macro-shortcuts")]
#[command(version, about = "Per-site keyboard shortcut cheat-sheets", long_about = None)]
pub struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true, env = "MACRO_SHORTCUTS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Base URL of the remote shortcut files
    #[arg(long, global = true)]
    pub data_url: Option<String>,

    /// Storage file for cached documents
    #[arg(long, global = true)]
    pub storage: Option<PathBuf>,

    /// Directory of plugin manifests
    #[arg(long, global = true)]
    pub plugins_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the root domain of a URL
    Domain { url: String },

    /// Print the storage/fetch key for a URL
    Key { url: String },

    /// Fetch, merge and cache the shortcuts for a URL, then print them
    Fetch { url: String },

    /// Press the toggle command with URL open in the active tab
    Toggle { url: String },

    /// Complete a navigation to URL
    Navigate { url: String },

    /// List registered plugins
    Plugins,

    /// Read host events from stdin and write host commands to stdout
    Serve,
}

impl Cli {
    /// Load the config file and apply command-line overrides on top.
    pub fn load_config(&self) -> ExtensionConfig {
        let path = self.config.clone().unwrap_or_else(config::default_config_path);
        let mut config = config::load_config_from(&path);
        if let Some(url) = &self.data_url {
            config.data_url = url.clone();
        }
        if let Some(path) = &self.storage {
            config.storage_path = Some(path.clone());
        }
        if let Some(dir) = &self.plugins_dir {
            config.plugins_dir = Some(dir.clone());
        }
        config
    }
}

/// Run the parsed command to completion.
pub async fn execute(cli: Cli, config: ExtensionConfig) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve => {
            let (host, commands) = ChannelHost::new();
            let host = Arc::new(host);
            let state = AppState::from_config(config, host.clone())?;
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            serve(state, host, commands, stdin, tokio::io::stdout()).await
        }
        command => {
            let host = Arc::new(RecordingHost::new());
            let state = AppState::from_config(config, host.clone())?;
            let mut out = Vec::new();
            run_oneshot(&command, &state, &host, &mut out).await?;
            std::io::stdout()
                .write_all(&out)
                .context("failed to write output")?;
            Ok(())
        }
    }
}

/// Run a single non-`serve` command, writing its output to `out`.
pub async fn run_oneshot(
    command: &Command,
    state: &AppState,
    host: &RecordingHost,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match command {
        Command::Domain { url } => writeln!(out, "{}", root_domain(url))?,
        Command::Key { url } => writeln!(out, "{}", state.service.domain_key(url))?,
        Command::Fetch { url } => {
            let doc = state
                .service
                .merge_and_persist(url)
                .await
                .with_context(|| format!("could not load shortcuts for {url}"))?;
            serde_json::to_writer_pretty(&mut *out, &doc)?;
            writeln!(out)?;
        }
        Command::Toggle { url } => {
            host.set_active_tab(Some(oneshot_tab(url)));
            state
                .background()
                .on_command(&state.config.toggle_command)
                .await;
            write_command_lines(out, host.take_commands())?;
        }
        Command::Navigate { url } => {
            host.set_active_tab(Some(oneshot_tab(url)));
            if !state
                .background()
                .on_navigation_completed(ONESHOT_TAB_ID, url)
                .await
            {
                tracing::info!(domain = %root_domain(url), "no plugin for this domain");
            }
            write_command_lines(out, host.take_commands())?;
        }
        Command::Plugins => {
            for (domain, plugin) in state.service.registry().entries() {
                writeln!(
                    out,
                    "{domain}\t{}\t{} shortcuts",
                    plugin.name(),
                    plugin.shortcuts().len()
                )?;
            }
        }
        Command::Serve => anyhow::bail!("serve is not a one-shot command"),
    }
    Ok(())
}

fn oneshot_tab(url: &str) -> Tab {
    Tab {
        id: ONESHOT_TAB_ID,
        url: url.to_string(),
    }
}

fn write_command_lines(out: &mut impl Write, commands: Vec<HostCommand>) -> anyhow::Result<()> {
    for command in commands {
        serde_json::to_writer(&mut *out, &command)?;
        writeln!(out)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// serve
// ---------------------------------------------------------------------------

/// Dispatch events read from `input` until EOF, streaming the commands the
/// host receives to `output`. Returns once every handler has finished and
/// every command has been written.
pub async fn serve<R, W>(
    state: AppState,
    host: Arc<ChannelHost>,
    commands: mpsc::UnboundedReceiver<HostCommand>,
    input: R,
    output: W,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let writer = tokio::spawn(write_commands(commands, output));

    let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    let background = state.background();
    drop(state);
    let dispatcher = tokio::spawn(async move { background.run(rx).await });

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await.context("failed to read events")? {
        if line.trim().is_empty() {
            continue;
        }

        let event: HostEvent = match serde_json::from_str(&line) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("invalid host event: {e}");
                continue;
            }
        };

        // Track the active tab before later events get dispatched
        if let HostEvent::TabActivated { tab } = &event {
            host.set_active_tab(Some(tab.clone()));
        }

        if tx.send(event).await.is_err() {
            tracing::error!("event dispatcher stopped early");
            break;
        }
    }

    drop(tx);
    dispatcher.await.context("event dispatcher panicked")?;

    // Last sender goes away here, which ends the writer
    drop(host);
    writer.await.context("command writer panicked")?
}

async fn write_commands<W>(
    mut commands: mpsc::UnboundedReceiver<HostCommand>,
    mut output: W,
) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(command) = commands.recv().await {
        let mut line = serde_json::to_vec(&command)?;
        line.push(b'\n');
        output
            .write_all(&line)
            .await
            .context("failed to write host command")?;
        output.flush().await?;
    }
    Ok(())
}
