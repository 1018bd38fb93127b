use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::commands::{registry, CommandDeps};
use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::platform::telegram::TelegramClient;
use crate::platform::{update_id, Transport};
use crate::store::{ProcessedIds, Store};

/// A configured bot that has not touched the store or network yet.
pub struct Bot {
    config: Config,
}

/// A bot after setup: store open, ledger hydrated, commands registered.
///
/// Only this type can poll, so polling before setup does not compile.
pub struct ReadyBot {
    config: Arc<Config>,
    transport: Arc<dyn Transport>,
    dispatcher: Arc<Dispatcher>,
    store: Store,
}

impl Bot {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Open the configured store and connect to Telegram.
    pub async fn setup(self) -> Result<ReadyBot> {
        let store = Store::open(&self.config.storage.database_path)?;
        let transport: Arc<dyn Transport> = Arc::new(
            TelegramClient::new(&self.config.telegram)
                .context("Failed to create Telegram client")?,
        );
        self.setup_with(transport, store).await
    }

    /// Setup against an explicit transport and store.
    pub async fn setup_with(self, transport: Arc<dyn Transport>, store: Store) -> Result<ReadyBot> {
        let processed = ProcessedIds::load(&store, self.config.storage.retain_processed)
            .await
            .context("Failed to load processed updates")?;

        let config = Arc::new(self.config);
        let deps = CommandDeps {
            transport: transport.clone(),
            store: store.clone(),
            http: CommandDeps::http_client(&config)?,
            config: config.clone(),
        };
        let commands = registry::build(&deps).await?;

        info!(
            "Bot ready with {} commands, resuming at offset {:?}",
            commands.len(),
            processed.next_offset()
        );

        Ok(ReadyBot {
            dispatcher: Arc::new(Dispatcher::new(commands, transport.clone(), processed)),
            transport,
            config,
            store,
        })
    }
}

impl ReadyBot {
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        self.dispatcher.clone()
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetch one batch past the highest processed id and dispatch it in order.
    pub async fn poll_once(&self) -> Result<usize> {
        let offset = self.dispatcher.next_offset().await;
        let updates = self
            .transport
            .get_updates(offset)
            .await
            .context("Failed to fetch updates")?;

        let count = updates.len();
        for update in updates {
            let update_id = update_id(&update);
            let outcome = self.dispatcher.process_update(update).await?;
            debug!("Update {}: {:?}", update_id, outcome);
        }

        Ok(count)
    }

    /// Poll until `shutdown` flips to true.
    ///
    /// Shutdown is only observed between batches; a batch in flight always
    /// finishes. Failed polls are logged and retried after the usual delay.
    pub async fn poll(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let interval = self.config.polling.interval();
        info!("Polling for updates every {:?}", interval);

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.poll_once().await {
                Ok(0) => {}
                Ok(count) => debug!("Processed {} updates", count),
                Err(e) => error!("Polling failed: {:#}", e),
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Polling stopped");
        Ok(())
    }

    /// Drop the dispatcher, its commands and the transport, then close the store.
    ///
    /// Dispatcher handles cloned out of the bot keep the connection open until
    /// they are dropped as well.
    pub async fn shutdown(self) -> Result<()> {
        let ReadyBot {
            dispatcher,
            transport,
            store,
            ..
        } = self;

        let offset = dispatcher.next_offset().await;
        drop(dispatcher);
        drop(transport);

        if !store.close()? {
            info!("Store still in use, it closes with its last handle");
        }
        info!("Shut down, next offset {:?}", offset);
        Ok(())
    }
}
