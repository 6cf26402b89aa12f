use async_trait::async_trait;
use mailring_common::Batch;

use crate::{AdapterError, Response};

/// The wire side of one delivery provider
///
/// Sending is split into three steps so the engine can tell a batch that can
/// never be sent (`build_request_body` fails) from a provider that is not
/// accepting it (`do_send` answers with a failure code).
#[async_trait]
pub trait Adapter: Send + Sync + 'static {
    /// The fully built request, ready to go on the wire
    type Payload: Send;

    /// Whether the provider can only address one recipient per call
    fn single_recipient(&self) -> bool {
        false
    }

    /// Rewrite content into the provider's personalisation syntax
    fn format_content(&self, batch: Batch) -> Batch {
        batch
    }

    async fn build_request_body(&self, batch: &Batch) -> Result<Self::Payload, AdapterError>;

    /// Perform the call. Transport failures are reported through the code.
    async fn do_send(&self, payload: Self::Payload) -> Response;

    /// Format, build and send a batch
    async fn send(&self, batch: Batch) -> Result<Response, AdapterError> {
        let batch = self.format_content(batch);
        let payload = self.build_request_body(&batch).await?;
        Ok(self.do_send(payload).await)
    }
}
