use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
};

use mailring_common::{Batch, BatchId, Message, internal};
use mailring_providers::{Adapter, ConfigError, ProviderSettings};
use mailring_queue::{Keys, QueueStore, codec};
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};

use crate::{
    EngineConfig, MailerError,
    engine::{Context, Engine, ProviderEngine},
    event::Event,
    failover::Failover,
    lifecycle::Lifecycle,
};

/// Entry point for submitting email
///
/// Submissions are split, enqueued on the main queue and picked up by the
/// active provider's engine. Delivery is reported through [`Self::subscribe`].
#[derive(Debug)]
pub struct Mailer {
    failover: Arc<Failover>,
    store: Arc<dyn QueueStore>,
    keys: Keys,
    lifecycle: Lifecycle,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl Mailer {
    /// Build one engine per provider, in rotation order, and start the first.
    ///
    /// The first provider starts straight away so that work left in its
    /// queues by an earlier process is resumed. Work left with any other
    /// provider is handed back to the main queue in the background. Must be
    /// called from within a Tokio runtime.
    ///
    /// # Errors
    /// If no providers are given, two share a name, or any provider's
    /// settings are invalid
    pub fn start<A: Adapter>(
        config: &EngineConfig,
        store: Arc<dyn QueueStore>,
        providers: impl IntoIterator<Item = (ProviderSettings, A)>,
    ) -> Result<Self, MailerError> {
        let (reports, receiver) = mpsc::unbounded_channel();
        let lifecycle = Lifecycle::new();
        let keys = Keys::new(&config.prefix);

        let context = Context {
            store: Arc::clone(&store),
            keys: keys.clone(),
            poll_interval: config.poll_interval(),
            max_unknown_responses: config.max_unknown_responses.max(1),
            reports,
            lifecycle: lifecycle.clone(),
        };

        let mut names = HashSet::new();
        let mut engines: Vec<Arc<dyn Engine>> = Vec::new();
        for (index, (settings, adapter)) in providers.into_iter().enumerate() {
            settings.validate()?;

            if !names.insert(settings.name.clone()) {
                return Err(ConfigError::DuplicateProvider(settings.name).into());
            }

            engines.push(Arc::new(ProviderEngine::new(
                adapter,
                settings,
                index,
                context.clone(),
            )));
        }

        if engines.is_empty() {
            return Err(ConfigError::NoProviders.into());
        }

        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let failover = Arc::new(Failover::new(engines, events));

        let supervisor = tokio::spawn(Arc::clone(&failover).supervise(receiver, lifecycle.clone()));
        failover.notify_active();
        tokio::spawn(Arc::clone(&failover).recover());

        internal!(
            level = INFO,
            providers = ?failover.engines().iter().map(|e| e.name()).collect::<Vec<_>>(),
            "Mailer started"
        );

        Ok(Self {
            failover,
            store,
            keys,
            lifecycle,
            supervisor: Mutex::new(Some(supervisor)),
        })
    }

    /// Validate and enqueue a message.
    ///
    /// The message is split against the active provider's batch limit and
    /// every batch is written to the main queue in a single store call.
    /// Returns the ids of the enqueued batches once the write is acknowledged.
    ///
    /// # Errors
    /// If the message is invalid, the mailer is shut down, or the store
    /// refuses the write. Nothing is enqueued in any of these cases.
    #[tracing::instrument(level = "debug", skip_all, fields(receivers = message.receivers.len()))]
    pub async fn send(&self, message: Message) -> Result<Vec<BatchId>, MailerError> {
        if self.lifecycle.is_stopped() {
            return Err(MailerError::ShutDown);
        }

        let message = if message.attachments.is_empty() {
            message.validate()?;
            message
        } else {
            // Attachments are checked on disk
            tokio::task::spawn_blocking(move || message.validate().map(|()| message)).await??
        };
        let message = message.normalised();

        let engine = self.failover.active();
        let provider = engine.name();
        let batches = Batch::split(message, engine.settings().batch_limit);
        let entries = codec::encode_all(&batches)?;

        let queued = self.store.push(&self.keys.main(), entries).await?;

        internal!(provider, batches = batches.len(), queued, "Enqueued email");

        // The active provider may have changed while the write was in flight
        self.failover.notify_active();

        Ok(batches.iter().map(|batch| batch.id).collect())
    }

    /// Receive every event published from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.failover.subscribe()
    }

    /// Name of the provider currently draining the main queue
    #[must_use]
    pub fn active_provider(&self) -> &str {
        self.failover.active().name()
    }

    /// Names of the configured providers in rotation order
    #[must_use]
    pub fn providers(&self) -> Vec<&str> {
        self.failover.engines().iter().map(|e| e.name()).collect()
    }

    /// The keys this mailer's queues live under
    #[must_use]
    pub const fn keys(&self) -> &Keys {
        &self.keys
    }

    /// Stop every loop at its next suspension point and wait for the
    /// controller to publish what is already reported.
    ///
    /// A batch being delivered stays in its provider queue and is resumed by
    /// the next start. Calling this more than once is harmless.
    pub async fn shutdown(&self) {
        if self.lifecycle.shutdown() {
            internal!(level = INFO, "Mailer shutting down");
        }

        let supervisor = self
            .supervisor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(supervisor) = supervisor
            && let Err(err) = supervisor.await
        {
            internal!(level = ERROR, error = %err, "Failover controller did not stop cleanly");
        }
    }
}
