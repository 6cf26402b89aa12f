//! Shared helpers for the engine integration tests
#![allow(dead_code)] // Not every test uses every helper

pub mod scripted;

use std::{sync::Arc, time::Duration};

use mailring_common::{Address, Batch, BatchLimit, Message, Recipient};
use mailring_engine::{Diagnostic, EngineConfig, Event, Mailer};
use mailring_providers::ProviderSettings;
use mailring_queue::{Keys, QueueStore, TestQueueStore, codec};
use tokio::sync::broadcast;

pub use scripted::{Answer, ScriptedAdapter};

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub fn config() -> EngineConfig {
    EngineConfig {
        prefix: "test:".to_string(),
        poll_interval_ms: 10,
        ..EngineConfig::default()
    }
}

pub fn keys() -> Keys {
    Keys::new(&config().prefix)
}

/// Success 200, failure 500
pub fn settings(name: &str, limit: i64) -> ProviderSettings {
    ProviderSettings::new(name)
        .success_codes([200_u16])
        .failure_codes([500_u16])
        .batch_limit(BatchLimit::from_declared(limit).unwrap_or_default())
}

pub fn email(index: usize) -> String {
    format!("r{index}@example.com")
}

pub fn message(receivers: usize) -> Message {
    Message::builder()
        .sender(Address::new("sender@example.com").with_name("Sender"))
        .receivers((0..receivers).map(|i| Recipient::from(Address::new(email(i)))))
        .subject("Hello")
        .text("Hi there")
        .build()
}

pub fn emails(batch: &Batch) -> Vec<String> {
    batch.receivers().iter().map(|r| r.email.clone()).collect()
}

pub fn start(
    store: &TestQueueStore,
    providers: impl IntoIterator<Item = (ProviderSettings, ScriptedAdapter)>,
) -> Mailer {
    start_with(&config(), store, providers)
}

pub fn start_with(
    config: &EngineConfig,
    store: &TestQueueStore,
    providers: impl IntoIterator<Item = (ProviderSettings, ScriptedAdapter)>,
) -> Mailer {
    let store: Arc<dyn QueueStore> = Arc::new(store.clone());
    Mailer::start(config, store, providers).expect("mailer starts")
}

pub async fn next_event(events: &mut broadcast::Receiver<Event>) -> Event {
    tokio::time::timeout(TIMEOUT, events.recv())
        .await
        .expect("event before timeout")
        .expect("event channel open")
}

/// Collect events up to and including the `count`th `Sent`
pub async fn until_sent(events: &mut broadcast::Receiver<Event>, count: usize) -> Vec<Event> {
    let mut seen = Vec::new();
    let mut sent = 0;

    while sent < count {
        let event = next_event(events).await;
        if matches!(event, Event::Sent { .. }) {
            sent += 1;
        }
        seen.push(event);
    }

    seen
}

/// Wait for the next diagnostic with this message
pub async fn until_diagnostic(events: &mut broadcast::Receiver<Event>, message: &str) -> Diagnostic {
    loop {
        if let Event::Error(diagnostic) = next_event(events).await
            && diagnostic.message == message
        {
            return diagnostic;
        }
    }
}

pub fn sent(events: &[Event]) -> Vec<(String, Vec<String>)> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Sent { provider, batch } => Some((provider.clone(), emails(batch))),
            _ => None,
        })
        .collect()
}

pub fn infos(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Info { message } => Some(message.clone()),
            _ => None,
        })
        .collect()
}

pub fn criticals(events: &[Event]) -> Vec<Diagnostic> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Error(diagnostic) if diagnostic.is_critical() => Some(diagnostic.clone()),
            _ => None,
        })
        .collect()
}

pub async fn batches(store: &TestQueueStore, key: &str) -> Vec<Batch> {
    store
        .snapshot(key)
        .await
        .iter()
        .map(|entry| codec::decode(entry).expect("entry decodes"))
        .collect()
}
