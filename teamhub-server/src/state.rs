use std::sync::Arc;

use anyhow::Result;
use teamhub_core::{ChatClient, Hub, HubConfig, HubResult, LogChat, MemoryStore, SlackClient, Store};
use tracing::{info, warn};

use crate::routes::AppError;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    hub: Arc<Hub>,
}

impl AppState {
    /// Build the store and chat client from config. Must run outside the
    /// async runtime: the chat client is blocking.
    pub fn new(config: HubConfig) -> Result<Self> {
        let store: Arc<dyn Store> = match config.data_path() {
            Some(path) => {
                info!(path = %path.display(), "using file-backed store");
                Arc::new(MemoryStore::open(path)?)
            }
            None => {
                warn!("no data_file configured, data lives in memory only");
                Arc::new(MemoryStore::new())
            }
        };

        let chat: Arc<dyn ChatClient> = match config.slack_bot_token.as_deref() {
            Some(token) if !token.trim().is_empty() => Arc::new(SlackClient::new(token)?),
            _ => {
                warn!("no slack_bot_token configured, chat messages are only logged");
                Arc::new(LogChat::new())
            }
        };

        Ok(Self::with_hub(Hub::new(config, store, chat)?))
    }

    pub fn with_hub(hub: Hub) -> Self {
        AppState { hub: Arc::new(hub) }
    }

    /// Run a hub operation on the blocking pool.
    pub async fn run<T, F>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&Hub) -> HubResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let hub = self.hub.clone();
        let value = tokio::task::spawn_blocking(move || f(&hub)).await??;
        Ok(value)
    }
}
