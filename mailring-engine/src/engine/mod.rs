//! Per-provider processing loop.
//!
//! An engine owns one provider queue holding at most one claimed batch. While
//! active it repeatedly claims, sends and disposes of a batch:
//!
//! * success: the entry is popped and a `Sent` event is emitted
//! * failure code: unsent receivers are restored into the entry, the entry is
//!   handed back to the main queue and the controller is told to rotate
//! * unknown code: a critical diagnostic is emitted and the entry is retried
//!   after the poll interval, up to the configured number of times
//!
//! Entries that can never be sent by any provider are moved to the dead
//! letter list instead.

mod expansion;

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use mailring_common::{Batch, BatchId, Signal, internal, outgoing};
use mailring_providers::{Adapter, Outcome, ProviderSettings, Response};
use mailring_queue::{Entry, Keys, QueueStore, codec};
use tokio::sync::mpsc;

use crate::{
    event::{Diagnostic, Event, Report},
    lifecycle::Lifecycle,
};

/// What every engine shares with the controller
#[derive(Debug, Clone)]
pub(crate) struct Context {
    pub(crate) store: Arc<dyn QueueStore>,
    pub(crate) keys: Keys,
    pub(crate) poll_interval: Duration,
    pub(crate) max_unknown_responses: u32,
    pub(crate) reports: mpsc::UnboundedSender<Report>,
    pub(crate) lifecycle: Lifecycle,
}

/// A provider loop as seen by the failover controller
#[async_trait]
pub trait Engine: Send + Sync + fmt::Debug {
    fn settings(&self) -> &ProviderSettings;

    fn name(&self) -> &str {
        &self.settings().name
    }

    /// Whether the loop is running, or has failed and not yet been released
    fn is_active(&self) -> bool;

    /// Start the loop unless it is already active.
    ///
    /// Returns `true` if this call started it.
    fn process(self: Arc<Self>) -> bool;

    /// Allow a failed engine to be started again
    fn release(&self);

    /// Hand work left behind by an earlier process back to the main queue.
    ///
    /// Does nothing if the loop is active. The engine counts as active while
    /// this runs, so it cannot be started until it returns.
    async fn recover(&self);
}

/// What the loop does after a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Look for more work straight away
    Continue,
    /// Wait the poll interval first
    Idle,
    /// Stop and have the controller rotate
    Failed,
}

/// Unknown answers received in a row for the same claimed batch
#[derive(Debug, Default)]
struct UnknownResponses {
    batch: Option<BatchId>,
    count: u32,
}

impl UnknownResponses {
    fn record(&mut self, batch: BatchId) -> u32 {
        if self.batch != Some(batch) {
            self.batch = Some(batch);
            self.count = 0;
        }

        self.count += 1;
        self.count
    }

    fn reset(&mut self) {
        self.batch = None;
        self.count = 0;
    }
}

pub struct ProviderEngine<A: Adapter> {
    adapter: A,
    settings: ProviderSettings,
    index: usize,
    context: Context,
    queue: String,
    expansion: String,
    active: AtomicBool,
}

impl<A: Adapter> fmt::Debug for ProviderEngine<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderEngine")
            .field("provider", &self.settings.name)
            .field("index", &self.index)
            .field("queue", &self.queue)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<A: Adapter> Engine for ProviderEngine<A> {
    fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn process(self: Arc<Self>) -> bool {
        if self.context.lifecycle.is_stopped() || self.active.swap(true, Ordering::SeqCst) {
            return false;
        }

        tokio::spawn(self.run());
        true
    }

    fn release(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    async fn recover(&self) {
        if self.active.swap(true, Ordering::SeqCst) {
            return;
        }

        match self.context.store.len(&self.queue).await {
            Ok(0) => {}
            Ok(pending) => {
                internal!(
                    provider = %self.settings.name,
                    pending,
                    "Handing back email left in provider queue"
                );

                for _ in 0..pending {
                    if !(self.restore().await && self.hand_back().await) {
                        break;
                    }
                }
            }
            Err(err) => {
                self.emit(Diagnostic::critical("Error while reading provider queue").with_data(err));
            }
        }

        self.release();
    }
}

impl<A: Adapter> ProviderEngine<A> {
    pub(crate) fn new(adapter: A, settings: ProviderSettings, index: usize, context: Context) -> Self {
        let queue = context.keys.provider(&settings.name);
        let expansion = context.keys.expansion(&settings.name);

        Self {
            adapter,
            settings,
            index,
            context,
            queue,
            expansion,
            active: AtomicBool::new(false),
        }
    }

    async fn run(self: Arc<Self>) {
        let mut shutdown = self.context.lifecycle.subscribe();
        let mut unknown = UnknownResponses::default();

        internal!(level = DEBUG, provider = %self.settings.name, "Engine started");

        while !self.context.lifecycle.is_stopped() {
            match self.step(&mut unknown).await {
                Step::Continue => {}
                Step::Idle => {
                    tokio::select! {
                        () = tokio::time::sleep(self.context.poll_interval) => {}
                        sig = shutdown.recv() => {
                            if let Ok(Signal::Shutdown | Signal::Finalised) = sig {
                                internal!(provider = %self.settings.name, "Engine received shutdown signal");
                            }
                            break;
                        }
                    }
                }
                Step::Failed => {
                    // Stays active until the controller releases it, so a
                    // submission racing the rotation cannot restart it.
                    internal!(level = WARN, provider = %self.settings.name, "Engine stopping after provider failure");
                    self.report(Report::Failed { index: self.index });
                    return;
                }
            }
        }

        self.release();
        internal!(level = DEBUG, provider = %self.settings.name, "Engine stopped");
    }

    async fn step(&self, unknown: &mut UnknownResponses) -> Step {
        let Some(entry) = self.claim().await else {
            return Step::Idle;
        };

        let batch = match codec::decode(&entry) {
            Ok(batch) => batch,
            Err(err) => {
                self.bury(Diagnostic::critical("Unable to decode claimed email").with_data(err))
                    .await;
                return Step::Continue;
            }
        };

        if batch.len() > 1 && self.adapter.single_recipient() {
            return self.expand(batch).await;
        }

        outgoing!(
            level = DEBUG,
            provider = %self.settings.name,
            batch = %batch.id,
            recipients = batch.len(),
            "Sending batch"
        );

        let response = match self.adapter.send(batch.clone()).await {
            Ok(response) => response,
            Err(err) => {
                unknown.reset();
                self.bury(
                    Diagnostic::critical("Unable to build request for email")
                        .with_data(format!("{}: {err}", batch.id)),
                )
                .await;
                return Step::Continue;
            }
        };

        outgoing!(
            provider = %self.settings.name,
            batch = %batch.id,
            code = %response.code,
            "Provider answered"
        );

        match self.settings.outcome(&response.code) {
            Outcome::Success => {
                unknown.reset();
                self.complete(batch, &response).await;
                Step::Continue
            }
            Outcome::Failure => {
                unknown.reset();
                self.fail(&response).await
            }
            Outcome::Unknown => {
                self.emit(Diagnostic::critical("Unknown response code").with_data(&response.code));

                if unknown.record(batch.id) >= self.context.max_unknown_responses {
                    unknown.reset();
                    self.fail(&response).await
                } else {
                    Step::Idle
                }
            }
        }
    }

    /// The entry to work on: whatever is already in the provider queue from an
    /// earlier run, otherwise the oldest entry of the main queue.
    async fn claim(&self) -> Option<Entry> {
        match self.context.store.read_all(&self.queue).await {
            Ok(mut entries) if !entries.is_empty() => {
                if entries.len() > 1 {
                    self.emit(
                        Diagnostic::critical("Multiple emails found in provider queue")
                            .with_data(format!("{} holds {} entries", self.queue, entries.len())),
                    );
                }

                internal!(provider = %self.settings.name, "Resuming email left in provider queue");
                // The tail is the entry pop and hand back act on
                return entries.pop();
            }
            Ok(_) => {}
            Err(err) => {
                self.emit(Diagnostic::critical("Error while reading provider queue").with_data(err));
                return None;
            }
        }

        match self
            .context
            .store
            .move_tail_to_head(&self.context.keys.main(), &self.queue)
            .await
        {
            Ok(entry) => entry,
            Err(err) => {
                self.emit(Diagnostic::critical("Error while claiming email from main queue").with_data(err));
                None
            }
        }
    }

    async fn complete(&self, batch: Batch, response: &Response) {
        self.finish().await;

        if let Some(detail) = &response.error {
            self.emit(
                Diagnostic::info("Provider accepted the email with problems")
                    .with_data(format!("{}: {detail}", batch.id)),
            );
        }

        self.emit(Event::Sent {
            provider: self.settings.name.clone(),
            batch,
        });
    }

    /// Drop the claimed entry once it has been delivered
    async fn finish(&self) {
        if let Err(err) = self.context.store.pop(&self.queue).await {
            self.emit(
                Diagnostic::critical("Error while removing sent email from provider queue")
                    .with_data(err),
            );
        }
    }

    async fn fail(&self, response: &Response) -> Step {
        internal!(
            level = WARN,
            provider = %self.settings.name,
            code = %response.code,
            error = ?response.error,
            "Provider is failing"
        );

        if self.restore().await {
            self.hand_back().await;
        }
        Step::Failed
    }

    /// Move the claimed entry to the tail of the main queue so that whichever
    /// provider is active next claims it first
    async fn hand_back(&self) -> bool {
        match self
            .context
            .store
            .move_tail_to_tail(&self.queue, &self.context.keys.main())
            .await
        {
            Ok(_) => {
                internal!(provider = %self.settings.name, "Handed claimed email back to main queue");
                true
            }
            Err(err) => {
                self.emit(
                    Diagnostic::critical("Error while returning email to main queue").with_data(err),
                );
                false
            }
        }
    }

    /// Move the claimed entry to the dead letter list
    async fn bury(&self, diagnostic: Diagnostic) {
        self.emit(diagnostic);

        if let Err(err) = self
            .context
            .store
            .move_tail_to_head(&self.queue, &self.context.keys.dead_letter())
            .await
        {
            self.emit(
                Diagnostic::critical("Error while moving email to dead letter list").with_data(err),
            );
        }
    }

    fn emit(&self, event: impl Into<Event>) {
        self.report(Report::Event(event.into()));
    }

    fn report(&self, report: Report) {
        if self.context.reports.send(report).is_err() {
            internal!(level = WARN, provider = %self.settings.name, "Controller is no longer listening");
        }
    }
}
