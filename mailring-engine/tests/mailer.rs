#![allow(clippy::expect_used, clippy::unwrap_used)]

mod support;

use std::{collections::HashSet, sync::Arc, time::Duration};

use mailring_common::{Address, Attachment};
use mailring_engine::{Event, Mailer, MailerError};
use mailring_providers::{Code, ConfigError, ProviderSettings};
use mailring_queue::{Operation, QueueStore, TestQueueStore};
use pretty_assertions::assert_eq;
use support::{ScriptedAdapter, TIMEOUT, config, email, keys, message, settings, start, until_sent};

#[tokio::test]
async fn splits_against_active_batch_limit() {
    let store = TestQueueStore::new();
    let adapter = ScriptedAdapter::accepting();
    let mailer = start(&store, [(settings("a", 2), adapter.clone())]);
    let mut events = mailer.subscribe();

    let ids = mailer.send(message(3)).await.unwrap();
    assert_eq!(ids.len(), 2);

    let events = until_sent(&mut events, 2).await;
    let sent: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            Event::Sent { batch, .. } => Some((batch.id, support::emails(batch))),
            _ => None,
        })
        .collect();

    assert_eq!(
        sent,
        vec![
            (ids[0], vec![email(0), email(1)]),
            (ids[1], vec![email(2)]),
        ]
    );

    mailer.shutdown().await;
}

#[tokio::test]
async fn unbounded_provider_gets_one_batch() {
    let store = TestQueueStore::new();
    let adapter = ScriptedAdapter::accepting();
    let mailer = start(&store, [(settings("a", -1), adapter.clone())]);
    let mut events = mailer.subscribe();

    let ids = mailer.send(message(1500)).await.unwrap();
    assert_eq!(ids.len(), 1);

    until_sent(&mut events, 1).await;
    let sent = adapter.sent_emails();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0], (0..1500).map(email).collect::<Vec<_>>());

    mailer.shutdown().await;
}

#[tokio::test]
async fn reply_to_defaults_to_sender() {
    let store = TestQueueStore::new();
    let adapter = ScriptedAdapter::accepting();
    let mailer = start(&store, [(settings("a", 1000), adapter.clone())]);
    let mut events = mailer.subscribe();

    mailer.send(message(1)).await.unwrap();
    until_sent(&mut events, 1).await;

    let batch = adapter.sent().remove(0);
    assert_eq!(
        batch.message.reply_to,
        Some(Address::new("sender@example.com").with_name("Sender"))
    );

    mailer.shutdown().await;
}

#[tokio::test]
async fn invalid_message_enqueues_nothing() {
    let store = TestQueueStore::new();
    let adapter = ScriptedAdapter::accepting();
    let mailer = start(&store, [(settings("a", 1000), adapter.clone())]);

    let mut invalid = message(2);
    invalid.subject = "   ".to_string();

    let err = mailer.send(invalid).await.unwrap_err();
    assert!(err.is_validation());
    assert!(store.snapshot(&keys().main()).await.is_empty());

    let mut invalid = message(2);
    invalid.receivers[1].email = "not-an-address".to_string();
    assert!(mailer.send(invalid).await.unwrap_err().is_validation());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(adapter.sent().is_empty());

    mailer.shutdown().await;
}

#[tokio::test]
async fn attachments_are_checked_before_enqueueing() {
    let store = TestQueueStore::new();
    let adapter = ScriptedAdapter::accepting();
    let mailer = start(&store, [(settings("a", 1000), adapter.clone())]);
    let mut events = mailer.subscribe();

    let mut missing = message(1);
    missing
        .attachments
        .push(Attachment::new("report.pdf", "/nonexistent/report.pdf"));

    assert!(mailer.send(missing).await.unwrap_err().is_validation());
    assert!(store.snapshot(&keys().main()).await.is_empty());

    let file = tempfile::NamedTempFile::new().unwrap();
    let mut attached = message(1);
    attached
        .attachments
        .push(Attachment::new("report.pdf", file.path()));

    mailer.send(attached).await.unwrap();
    until_sent(&mut events, 1).await;
    assert_eq!(adapter.sent()[0].message.attachments.len(), 1);

    mailer.shutdown().await;
}

#[tokio::test]
async fn unacknowledged_write_is_an_error() {
    let store = TestQueueStore::new();
    let mailer = start(&store, [(settings("a", 1000), ScriptedAdapter::accepting())]);

    store.fail(Operation::Push);
    let err = mailer.send(message(1)).await.unwrap_err();
    assert!(err.is_queue());

    store.heal(Operation::Push);
    assert_eq!(mailer.send(message(1)).await.unwrap().len(), 1);

    mailer.shutdown().await;
}

#[tokio::test]
async fn at_most_one_in_flight() {
    let store = TestQueueStore::new();
    let adapter = ScriptedAdapter::accepting()
        .delay(Duration::from_millis(20))
        .watch_queue(&store, keys().provider("a"));
    let mailer = start(&store, [(settings("a", 1), adapter.clone())]);
    let mut events = mailer.subscribe();

    // Every submission pokes the already running engine
    for _ in 0..4 {
        mailer.send(message(2)).await.unwrap();
    }

    until_sent(&mut events, 8).await;

    assert_eq!(adapter.sent().len(), 8);
    assert_eq!(adapter.max_in_flight(), 1);
    assert!(adapter.observed().iter().all(|&len| len == 1));

    store
        .wait_for_len(&keys().provider("a"), 0, TIMEOUT)
        .await
        .unwrap();

    mailer.shutdown().await;
}

#[tokio::test]
async fn refuses_bad_provider_sets() {
    let store: Arc<dyn QueueStore> = Arc::new(TestQueueStore::new());

    let err = Mailer::start(
        &config(),
        Arc::clone(&store),
        Vec::<(ProviderSettings, ScriptedAdapter)>::new(),
    )
    .unwrap_err();
    assert!(matches!(err, MailerError::Config(ConfigError::NoProviders)));

    let err = Mailer::start(
        &config(),
        Arc::clone(&store),
        [
            (settings("a", 1000), ScriptedAdapter::accepting()),
            (settings("a", 1000), ScriptedAdapter::accepting()),
        ],
    )
    .unwrap_err();
    assert!(matches!(
        err,
        MailerError::Config(ConfigError::DuplicateProvider(name)) if name == "a"
    ));

    let err = Mailer::start(
        &config(),
        Arc::clone(&store),
        [(
            settings("a", 1000).failure_codes(Vec::<Code>::new()),
            ScriptedAdapter::accepting(),
        )],
    )
    .unwrap_err();
    assert!(matches!(err, MailerError::Config(ConfigError::EmptyCodes { .. })));
}

#[tokio::test]
async fn reports_providers_in_rotation_order() {
    let store = TestQueueStore::new();
    let mailer = start(
        &store,
        [
            (settings("a", 1000), ScriptedAdapter::accepting()),
            (settings("b", 1000), ScriptedAdapter::accepting()),
        ],
    );

    assert_eq!(mailer.providers(), vec!["a", "b"]);
    assert_eq!(mailer.active_provider(), "a");

    mailer.shutdown().await;
}

#[tokio::test]
async fn shutdown_keeps_pending_work_for_next_start() {
    let store = TestQueueStore::new();
    let first = ScriptedAdapter::accepting().delay(Duration::from_millis(50));
    let mailer = start(&store, [(settings("a", 1), first.clone())]);
    let mut events = mailer.subscribe();

    mailer.send(message(4)).await.unwrap();
    until_sent(&mut events, 1).await;

    mailer.shutdown().await;
    mailer.shutdown().await;
    assert!(matches!(
        mailer.send(message(1)).await,
        Err(MailerError::ShutDown)
    ));

    // Let the in-flight send finish
    tokio::time::sleep(Duration::from_millis(100)).await;
    let delivered = first.sent().len();
    assert!(delivered < 4);

    let second = ScriptedAdapter::accepting();
    let restarted = start(&store, [(settings("a", 1), second.clone())]);
    let mut events = restarted.subscribe();
    until_sent(&mut events, 4 - delivered).await;

    let all: Vec<String> = first
        .sent_emails()
        .into_iter()
        .chain(second.sent_emails())
        .flatten()
        .collect();
    assert_eq!(all.len(), 4);
    assert_eq!(
        all.into_iter().collect::<HashSet<_>>(),
        (0..4).map(email).collect::<HashSet<_>>()
    );

    restarted.shutdown().await;
}
