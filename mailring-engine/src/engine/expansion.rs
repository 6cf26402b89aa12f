//! Delivery through providers that address one receiver per call.
//!
//! The claimed batch is expanded into single-receiver batches on the private
//! expansion queue, which is drained one entry at a time. Whatever is left
//! when a drain is abandoned is folded back into the claimed entry so the next
//! provider only sees receivers that have not been sent to.

use mailring_common::{Batch, internal, outgoing};
use mailring_providers::{Adapter, AdapterError, Outcome};
use mailring_queue::{Entry, codec};

use super::{ProviderEngine, Step};
use crate::event::{Diagnostic, Event};

/// How a drain of the expansion queue ended
#[derive(Debug)]
enum Drain {
    /// Every receiver was accepted
    Delivered,
    /// The provider answered with a failure code
    Failed,
    /// Shutdown was requested
    Interrupted,
    /// A request could not be built, so no provider can send it
    Poison(AdapterError),
    /// The expansion queue could not be read
    StoreError,
}

impl<A: Adapter> ProviderEngine<A> {
    pub(super) async fn expand(&self, batch: Batch) -> Step {
        match self.context.store.len(&self.expansion).await {
            Ok(0) => {
                let id = batch.id;
                let recipients = batch.len();
                let entries = match codec::encode_all(&batch.expand()) {
                    Ok(entries) => entries,
                    Err(err) => {
                        self.bury(Diagnostic::critical("Unable to encode expanded email").with_data(err))
                            .await;
                        return Step::Continue;
                    }
                };

                if let Err(err) = self.context.store.push(&self.expansion, entries).await {
                    self.emit(
                        Diagnostic::critical("Error while expanding email into private queue")
                            .with_data(err),
                    );
                    return Step::Idle;
                }

                internal!(
                    level = DEBUG,
                    provider = %self.settings.name,
                    batch = %id,
                    recipients,
                    "Expanded batch for single recipient delivery"
                );
            }
            Ok(pending) => {
                internal!(
                    level = DEBUG,
                    provider = %self.settings.name,
                    batch = %batch.id,
                    pending,
                    "Resuming interrupted expansion"
                );
            }
            Err(err) => {
                self.emit(Diagnostic::critical("Error while reading private queue").with_data(err));
                return Step::Idle;
            }
        }

        match self.drain().await {
            Drain::Delivered => {
                // Each receiver has already been reported as sent
                self.finish().await;
                Step::Continue
            }
            Drain::Failed => {
                internal!(level = WARN, provider = %self.settings.name, "Provider failed during expansion");
                if self.restore().await {
                    self.hand_back().await;
                }
                Step::Failed
            }
            Drain::Interrupted => Step::Continue,
            Drain::Poison(err) => {
                let diagnostic = Diagnostic::critical("Unable to build request for email").with_data(err);
                if self.restore().await {
                    self.bury(diagnostic).await;
                    Step::Continue
                } else {
                    self.emit(diagnostic);
                    Step::Idle
                }
            }
            Drain::StoreError => Step::Idle,
        }
    }

    async fn drain(&self) -> Drain {
        let mut unknown = 0;

        loop {
            if self.context.lifecycle.is_stopped() {
                return Drain::Interrupted;
            }

            let entry = match self.context.store.pop(&self.expansion).await {
                Ok(Some(entry)) => entry,
                Ok(None) => return Drain::Delivered,
                Err(err) => {
                    self.emit(
                        Diagnostic::critical("Error while reading pending emails from private queue")
                            .with_data(err),
                    );
                    return Drain::StoreError;
                }
            };

            let single = match codec::decode(&entry) {
                Ok(single) => single,
                Err(err) => {
                    self.emit(Diagnostic::critical("Unable to decode expanded email").with_data(err));
                    self.dead_letter(vec![entry]).await;
                    continue;
                }
            };

            let response = match self.adapter.send(single.clone()).await {
                Ok(response) => response,
                Err(err) => {
                    self.push_back(entry).await;
                    return Drain::Poison(err);
                }
            };

            outgoing!(
                provider = %self.settings.name,
                batch = %single.id,
                code = %response.code,
                "Provider answered for single recipient"
            );

            match self.settings.outcome(&response.code) {
                Outcome::Success => {
                    unknown = 0;

                    if let Some(detail) = &response.error {
                        self.emit(
                            Diagnostic::info("Provider accepted the email with problems")
                                .with_data(format!("{}: {detail}", single.id)),
                        );
                    }

                    self.emit(Event::Sent {
                        provider: self.settings.name.clone(),
                        batch: single,
                    });
                }
                Outcome::Failure => {
                    self.push_back(entry).await;
                    return Drain::Failed;
                }
                Outcome::Unknown => {
                    self.emit(Diagnostic::critical("Unknown response code").with_data(&response.code));
                    self.push_back(entry).await;

                    unknown += 1;
                    if unknown >= self.context.max_unknown_responses {
                        return Drain::Failed;
                    }
                }
            }
        }
    }

    /// Return an unsent receiver to the private queue. It is popped after
    /// every other pending receiver.
    async fn push_back(&self, entry: Entry) {
        if let Err(err) = self.context.store.push(&self.expansion, vec![entry]).await {
            self.emit(
                Diagnostic::critical("Error while returning email to private queue").with_data(err),
            );
        }
    }

    /// Fold whatever is left in the private queue back into the claimed entry.
    ///
    /// Returns `false` if the receivers could not be folded back. They are
    /// then left in the private queue, and the claimed entry must stay with
    /// this provider so a later expansion resumes them.
    pub(super) async fn restore(&self) -> bool {
        let entries = match self.context.store.take_all(&self.expansion).await {
            Ok(entries) => entries,
            Err(err) => {
                self.emit(
                    Diagnostic::critical("Error while reading pending emails from private queue")
                        .with_data(err),
                );
                return false;
            }
        };

        if entries.is_empty() {
            return true;
        }

        // Head first, so reverse to get the order they would have been popped
        let mut pending = Vec::with_capacity(entries.len());
        let mut decoded = Vec::with_capacity(entries.len());
        let mut corrupt = Vec::new();
        for entry in entries.into_iter().rev() {
            match codec::decode(&entry) {
                Ok(single) => {
                    pending.push(single);
                    decoded.push(entry);
                }
                Err(err) => {
                    self.emit(Diagnostic::critical("Unable to decode expanded email").with_data(err));
                    corrupt.push(entry);
                }
            }
        }

        if !corrupt.is_empty() {
            self.dead_letter(corrupt).await;
        }

        let Some(folded) = Batch::fold(pending) else {
            return true;
        };

        let written = match codec::encode(&folded) {
            Ok(encoded) => self.replace_claimed(encoded).await,
            Err(err) => Err(err.to_string()),
        };

        match written {
            Ok(()) => {
                internal!(
                    provider = %self.settings.name,
                    batch = %folded.id,
                    recipients = folded.len(),
                    "Restored unsent recipients into provider queue"
                );
                true
            }
            Err(err) => {
                self.emit(
                    Diagnostic::critical("Error while updating pending emails in provider queue")
                        .with_data(err),
                );

                // Put the receivers back where a later expansion will resume them.
                // Corrupt entries are already in the dead letter list.
                if let Err(err) = self.context.store.push(&self.expansion, decoded).await {
                    self.emit(
                        Diagnostic::critical("Error while returning emails to private queue")
                            .with_data(err),
                    );
                }
                false
            }
        }
    }

    async fn replace_claimed(&self, entry: Entry) -> Result<(), String> {
        let store = &self.context.store;
        let len = store.len(&self.queue).await.map_err(|e| e.to_string())?;

        store
            .replace(&self.queue, len.saturating_sub(1), entry)
            .await
            .map_err(|e| e.to_string())
    }

    async fn dead_letter(&self, entries: Vec<Entry>) {
        if let Err(err) = self
            .context
            .store
            .push(&self.context.keys.dead_letter(), entries)
            .await
        {
            self.emit(
                Diagnostic::critical("Error while moving email to dead letter list").with_data(err),
            );
        }
    }
}
