//! Adapter whose answers are scripted by the test
//!
//! Each send consumes the next scripted answer; once the script runs out the
//! fallback answer is used. Every batch handed to `do_send` is recorded.

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use mailring_common::Batch;
use mailring_providers::{Adapter, AdapterError, Response};
use mailring_queue::{QueueStore, TestQueueStore};
use parking_lot::Mutex;

/// One scripted answer
#[derive(Debug, Clone)]
pub enum Answer {
    Respond(Response),
    /// Building the request fails
    Poison,
}

impl From<u16> for Answer {
    fn from(status: u16) -> Self {
        Self::Respond(Response::new(status))
    }
}

impl From<Response> for Answer {
    fn from(response: Response) -> Self {
        Self::Respond(response)
    }
}

#[derive(Debug, Clone)]
pub struct ScriptedAdapter {
    script: Arc<Mutex<VecDeque<Answer>>>,
    fallback: Response,
    single_recipient: bool,
    delay: Duration,
    sent: Arc<Mutex<Vec<Batch>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    watched: Option<(TestQueueStore, String)>,
    observed: Arc<Mutex<Vec<usize>>>,
}

impl ScriptedAdapter {
    /// Accepts everything with a 200
    pub fn accepting() -> Self {
        Self {
            script: Arc::default(),
            fallback: Response::new(200_u16),
            single_recipient: false,
            delay: Duration::ZERO,
            sent: Arc::default(),
            in_flight: Arc::default(),
            max_in_flight: Arc::default(),
            watched: None,
            observed: Arc::default(),
        }
    }

    /// Fails everything with a 500
    pub fn failing() -> Self {
        Self::accepting().fallback(500)
    }

    pub fn script(self, answers: impl IntoIterator<Item = impl Into<Answer>>) -> Self {
        self.script.lock().extend(answers.into_iter().map(Into::into));
        self
    }

    pub fn fallback(mut self, status: u16) -> Self {
        self.fallback = Response::new(status);
        self
    }

    pub const fn single_recipient(mut self) -> Self {
        self.single_recipient = true;
        self
    }

    pub const fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Record the length of `key` every time a request goes out
    pub fn watch_queue(mut self, store: &TestQueueStore, key: impl Into<String>) -> Self {
        self.watched = Some((store.clone(), key.into()));
        self
    }

    /// Batches seen by `do_send`, in order
    pub fn sent(&self) -> Vec<Batch> {
        self.sent.lock().clone()
    }

    /// Receiver emails of every batch seen by `do_send`, in order
    pub fn sent_emails(&self) -> Vec<Vec<String>> {
        self.sent()
            .iter()
            .map(|batch| batch.receivers().iter().map(|r| r.email.clone()).collect())
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn observed(&self) -> Vec<usize> {
        self.observed.lock().clone()
    }

    fn next_is_poison(&self) -> bool {
        let mut script = self.script.lock();
        if matches!(script.front(), Some(Answer::Poison)) {
            script.pop_front();
            true
        } else {
            false
        }
    }

    fn next_response(&self) -> Response {
        match self.script.lock().pop_front() {
            Some(Answer::Respond(response)) => response,
            Some(Answer::Poison) | None => self.fallback.clone(),
        }
    }
}

#[async_trait]
impl Adapter for ScriptedAdapter {
    type Payload = Batch;

    fn single_recipient(&self) -> bool {
        self.single_recipient
    }

    async fn build_request_body(&self, batch: &Batch) -> Result<Self::Payload, AdapterError> {
        if self.next_is_poison() {
            return Err(AdapterError::Unsupported {
                provider: "scripted",
                reason: format!("batch {} is poisoned", batch.id),
            });
        }

        Ok(batch.clone())
    }

    async fn do_send(&self, payload: Self::Payload) -> Response {
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        if let Some((store, key)) = &self.watched {
            let len = store.len(key).await.unwrap_or_default();
            self.observed.lock().push(len);
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.sent.lock().push(payload);
        let response = self.next_response();

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }
}
