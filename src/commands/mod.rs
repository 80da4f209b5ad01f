//! Subcommand handlers. Each one drives the core crate and prints plain text.

mod connection;
mod logs;
mod panel;
mod settings;

use crate::cli::Commands;

use anyhow::Result;
use std::sync::Arc;
use subbrain_core::{ConnectionSession, FileSessionStore, PanelClient, PanelConfig};
use tokio::runtime::Handle;

/// Everything a command needs, built once per invocation.
pub struct Context {
    pub config: PanelConfig,
    pub client: PanelClient,
    pub store: Arc<FileSessionStore>,
    pub session: ConnectionSession,
    pub runtime: Handle,
}

impl Context {
    pub fn new(config: PanelConfig, runtime: Handle) -> Self {
        Self::with_store(config, runtime, Arc::new(FileSessionStore::default_location()))
    }

    pub fn with_store(config: PanelConfig, runtime: Handle, store: Arc<FileSessionStore>) -> Self {
        let client = PanelClient::new(&config.panel_url, config.request_timeout());
        let session = ConnectionSession::new(store.clone());
        session.restore();
        Self {
            config,
            client,
            store,
            session,
            runtime,
        }
    }
}

pub async fn run(ctx: &Context, command: Commands) -> Result<()> {
    match command {
        Commands::Discover {
            direct,
            select,
            candidates,
        } => connection::discover(ctx, direct, select, candidates).await,
        Commands::Test { url } => connection::test(ctx, &url).await,
        Commands::Connect { url } => connection::connect(ctx, &url).await,
        Commands::Disconnect => connection::disconnect(ctx),
        Commands::Status { watch } => connection::status(ctx, watch).await,
        Commands::Settings { command } => settings::run(ctx, command).await,
        Commands::Logs {
            source,
            filter,
            follow,
            export,
        } => logs::run(ctx, &source, filter.as_deref(), follow, export.as_deref()).await,
        Commands::Hardware => panel::hardware(ctx).await,
        Commands::Recommendations => panel::recommendations(ctx).await,
        Commands::Platform => panel::platform(ctx).await,
        Commands::Languages { code } => panel::languages(ctx, code.as_deref()).await,
        Commands::Scan { kind } => panel::scan(ctx, &kind).await,
    }
}

/// Resolves when the user presses Ctrl+C.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
