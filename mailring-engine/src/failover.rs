//! Failover controller: owns the rotation state and turns engine reports into
//! published events.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use mailring_common::{Signal, internal};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};

use crate::{
    engine::Engine,
    event::{DiagnosticKind, Event, Report},
    lifecycle::Lifecycle,
};

#[derive(Debug)]
pub(crate) struct Failover {
    engines: Vec<Arc<dyn Engine>>,
    active: AtomicUsize,
    /// Held while the active index changes or the active engine is started
    transition: Mutex<()>,
    events: broadcast::Sender<Event>,
}

impl Failover {
    /// `engines` must not be empty
    pub(crate) fn new(engines: Vec<Arc<dyn Engine>>, events: broadcast::Sender<Event>) -> Self {
        debug_assert!(!engines.is_empty());

        Self {
            engines,
            active: AtomicUsize::new(0),
            transition: Mutex::new(()),
            events,
        }
    }

    pub(crate) fn active_index(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub(crate) fn active(&self) -> &Arc<dyn Engine> {
        &self.engines[self.active_index()]
    }

    pub(crate) fn engines(&self) -> &[Arc<dyn Engine>] {
        &self.engines
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Start the active engine unless it is already running.
    ///
    /// Never starts an engine that a concurrent rotation has just moved away
    /// from.
    pub(crate) fn notify_active(&self) -> bool {
        let _transition = self.transition.lock();
        Arc::clone(self.active()).process()
    }

    /// Hand back whatever the inactive providers left in their queues when an
    /// earlier process stopped.
    pub(crate) async fn recover(self: Arc<Self>) {
        let active = self.active_index();

        for (index, engine) in self.engines.iter().enumerate() {
            if index == active {
                continue;
            }

            engine.recover().await;
            // A rotation to this engine while it was recovering could not start it
            self.notify_active();
        }

        internal!(level = DEBUG, "Recovery of inactive providers finished");
    }

    /// Forward engine reports until shutdown, then drain what is already
    /// queued.
    pub(crate) async fn supervise(
        self: Arc<Self>,
        mut reports: mpsc::UnboundedReceiver<Report>,
        lifecycle: Lifecycle,
    ) {
        let mut shutdown = lifecycle.subscribe();
        internal!(level = DEBUG, providers = self.engines.len(), "Failover controller starting");

        while !lifecycle.is_stopped() {
            tokio::select! {
                report = reports.recv() => {
                    let Some(report) = report else {
                        break;
                    };
                    self.handle(report, &lifecycle);
                }
                sig = shutdown.recv() => {
                    if let Ok(Signal::Shutdown | Signal::Finalised) = sig {
                        internal!("Failover controller received shutdown signal");
                    }
                    break;
                }
            }
        }

        while let Ok(report) = reports.try_recv() {
            self.handle(report, &lifecycle);
        }

        internal!(level = DEBUG, "Failover controller stopped");
    }

    fn handle(&self, report: Report, lifecycle: &Lifecycle) {
        match report {
            Report::Event(event) => self.publish(event),
            Report::Failed { index } => {
                let Some(failed) = self.engines.get(index) else {
                    internal!(level = ERROR, index, "Failure reported by unknown engine");
                    return;
                };

                let _transition = self.transition.lock();

                if index != self.active_index() {
                    internal!(
                        level = WARN,
                        provider = failed.name(),
                        "Ignoring failure from a provider that is no longer active"
                    );
                    failed.release();
                    return;
                }

                let next = self.rotate(index);
                failed.release();

                if lifecycle.is_stopped() {
                    return;
                }

                let engine = Arc::clone(&self.engines[next]);
                let name = engine.name().to_string();
                engine.process();

                self.publish(Event::info(format!("Provider changed to {name}")));
            }
        }
    }

    /// Advance past `failed`, wrapping round. Returns the new active index.
    fn rotate(&self, failed: usize) -> usize {
        let next = (failed + 1) % self.engines.len();
        self.active.store(next, Ordering::SeqCst);

        internal!(
            level = WARN,
            from = self.engines[failed].name(),
            to = self.engines[next].name(),
            "Rotating provider"
        );

        next
    }

    fn publish(&self, event: Event) {
        match &event {
            Event::Sent { provider, batch } => {
                internal!(
                    level = INFO,
                    provider,
                    batch = %batch.id,
                    recipients = batch.len(),
                    "Email sent"
                );
            }
            Event::Error(diagnostic) if diagnostic.kind == DiagnosticKind::Critical => {
                internal!(level = ERROR, data = ?diagnostic.data, "{}", diagnostic.message);
            }
            Event::Error(diagnostic) => {
                internal!(level = INFO, data = ?diagnostic.data, "{}", diagnostic.message);
            }
            Event::Info { message } => {
                internal!(level = INFO, "{message}");
            }
        }

        if self.events.send(event).is_err() {
            internal!("No subscribers for event");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    use async_trait::async_trait;
    use mailring_providers::ProviderSettings;
    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Debug)]
    struct FakeEngine {
        settings: ProviderSettings,
        active: AtomicBool,
        started: AtomicUsize,
        recovered: AtomicUsize,
    }

    impl FakeEngine {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                settings: ProviderSettings::new(name),
                active: AtomicBool::new(false),
                started: AtomicUsize::new(0),
                recovered: AtomicUsize::new(0),
            })
        }

        fn started(&self) -> usize {
            self.started.load(Ordering::SeqCst)
        }

        fn recovered(&self) -> usize {
            self.recovered.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Engine for FakeEngine {
        fn settings(&self) -> &ProviderSettings {
            &self.settings
        }

        fn is_active(&self) -> bool {
            self.active.load(Ordering::SeqCst)
        }

        fn process(self: Arc<Self>) -> bool {
            if self.active.swap(true, Ordering::SeqCst) {
                return false;
            }
            self.started.fetch_add(1, Ordering::SeqCst);
            true
        }

        fn release(&self) {
            self.active.store(false, Ordering::SeqCst);
        }

        async fn recover(&self) {
            if self.active.swap(true, Ordering::SeqCst) {
                return;
            }
            self.recovered.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.release();
        }
    }

    fn failover(fakes: &[Arc<FakeEngine>]) -> (Failover, broadcast::Receiver<Event>) {
        let engines = fakes
            .iter()
            .map(|fake| Arc::clone(fake) as Arc<dyn Engine>)
            .collect();
        let (events, receiver) = broadcast::channel(16);
        (Failover::new(engines, events), receiver)
    }

    fn rotation(receiver: &mut broadcast::Receiver<Event>) -> Option<String> {
        match receiver.try_recv() {
            Ok(Event::Info { message }) => Some(message),
            _ => None,
        }
    }

    #[test]
    fn rotates_and_wraps() {
        let fakes = [FakeEngine::new("a"), FakeEngine::new("b"), FakeEngine::new("c")];
        let (failover, mut receiver) = failover(&fakes);
        let lifecycle = Lifecycle::new();

        Arc::clone(&fakes[0]).process();

        for (failed, next) in [(0, "b"), (1, "c"), (2, "a")] {
            failover.handle(Report::Failed { index: failed }, &lifecycle);

            assert_eq!(failover.active().name(), next);
            assert!(!fakes[failed].is_active());
            assert_eq!(rotation(&mut receiver), Some(format!("Provider changed to {next}")));
        }

        assert_eq!(fakes[0].started(), 2);
        assert_eq!(fakes[1].started(), 1);
        assert_eq!(fakes[2].started(), 1);
    }

    #[test]
    fn single_provider_restarts_itself() {
        let fakes = [FakeEngine::new("only")];
        let (failover, mut receiver) = failover(&fakes);
        let lifecycle = Lifecycle::new();

        Arc::clone(&fakes[0]).process();
        failover.handle(Report::Failed { index: 0 }, &lifecycle);

        assert_eq!(failover.active_index(), 0);
        assert!(fakes[0].is_active());
        assert_eq!(fakes[0].started(), 2);
        assert_eq!(rotation(&mut receiver), Some("Provider changed to only".to_string()));
    }

    #[test]
    fn ignores_stale_failures() {
        let fakes = [FakeEngine::new("a"), FakeEngine::new("b")];
        let (failover, mut receiver) = failover(&fakes);
        let lifecycle = Lifecycle::new();

        failover.handle(Report::Failed { index: 0 }, &lifecycle);
        assert_eq!(rotation(&mut receiver), Some("Provider changed to b".to_string()));

        failover.handle(Report::Failed { index: 0 }, &lifecycle);
        failover.handle(Report::Failed { index: 7 }, &lifecycle);

        assert_eq!(failover.active().name(), "b");
        assert_eq!(fakes[1].started(), 1);
        assert_eq!(rotation(&mut receiver), None);
    }

    #[test]
    fn rotates_without_starting_after_shutdown() {
        let fakes = [FakeEngine::new("a"), FakeEngine::new("b")];
        let (failover, mut receiver) = failover(&fakes);
        let lifecycle = Lifecycle::new();
        lifecycle.shutdown();

        failover.handle(Report::Failed { index: 0 }, &lifecycle);

        assert_eq!(failover.active().name(), "b");
        assert_eq!(fakes[1].started(), 0);
        assert_eq!(rotation(&mut receiver), None);
    }

    #[test]
    fn forwards_events() {
        let fakes = [FakeEngine::new("a")];
        let (failover, mut receiver) = failover(&fakes);
        let lifecycle = Lifecycle::new();

        let diagnostic = crate::Diagnostic::critical("Unknown response code").with_data(429);
        failover.handle(Report::Event(diagnostic.clone().into()), &lifecycle);

        assert_eq!(receiver.try_recv().ok(), Some(Event::Error(diagnostic)));
    }

    #[tokio::test]
    async fn recovers_inactive_providers_only() {
        let fakes = [FakeEngine::new("a"), FakeEngine::new("b"), FakeEngine::new("c")];
        let (failover, _receiver) = failover(&fakes);
        let failover = Arc::new(failover);

        assert!(failover.notify_active());
        Arc::clone(&failover).recover().await;

        assert_eq!(fakes[0].recovered(), 0);
        assert_eq!(fakes[1].recovered(), 1);
        assert_eq!(fakes[2].recovered(), 1);
        assert!(fakes[0].is_active());
        assert!(!fakes[1].is_active());
        assert!(!fakes[2].is_active());
    }

    #[tokio::test]
    async fn starts_provider_rotated_to_during_recovery() {
        let fakes = [FakeEngine::new("a"), FakeEngine::new("b")];
        let (failover, _receiver) = failover(&fakes);
        let failover = Arc::new(failover);
        let lifecycle = Lifecycle::new();

        failover.notify_active();

        // b is busy recovering, so the rotation cannot start it
        fakes[1].active.store(true, Ordering::SeqCst);
        failover.handle(Report::Failed { index: 0 }, &lifecycle);
        assert_eq!(fakes[1].started(), 0);
        fakes[1].release();

        Arc::clone(&failover).recover().await;

        assert!(fakes[1].is_active());
        assert_eq!(fakes[1].started(), 1);
        assert_eq!(fakes[0].recovered(), 1);
        assert!(!fakes[0].is_active());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn submissions_never_restart_a_rotated_engine() {
        for _ in 0..200 {
            let fakes = [FakeEngine::new("a"), FakeEngine::new("b")];
            let (failover, _receiver) = failover(&fakes);
            let failover = Arc::new(failover);
            let lifecycle = Lifecycle::new();

            failover.notify_active();

            let submissions = {
                let failover = Arc::clone(&failover);
                tokio::spawn(async move {
                    for _ in 0..50 {
                        failover.notify_active();
                        tokio::task::yield_now().await;
                    }
                })
            };

            failover.handle(Report::Failed { index: 0 }, &lifecycle);
            submissions.await.unwrap();

            assert!(!fakes[0].is_active());
            assert!(fakes[1].is_active());
        }
    }
}
