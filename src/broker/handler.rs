//! Message handlers invoked by polling workers

use crate::queue::Message;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Error returned by a handler; any error type converts into it with `?`
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

pub type HandlerResult = Result<(), HandlerError>;

/// Callback receiving the messages of one subscription
///
/// `cancel` fires when the subscription is being torn down. A handler that
/// is already running is always allowed to finish; the token only lets long
/// handlers cut their work short.
///
/// Returning an error drops the message (unless the consumer was configured
/// with retries or a dead-letter topic). It is never reported to the
/// subscriber.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, cancel: CancellationToken, message: Arc<Message>) -> HandlerResult;
}

#[async_trait]
impl<F, Fut> MessageHandler for F
where
    F: Fn(CancellationToken, Arc<Message>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, cancel: CancellationToken, message: Arc<Message>) -> HandlerResult {
        (self)(cancel, message).await
    }
}

/// Wrap an async closure into a shareable handler
///
/// ```rust
/// use topicq::broker::handler_fn;
///
/// let handler = handler_fn(|_cancel, message| async move {
///     println!("{} bytes on {}", message.payload().len(), message.topic());
///     Ok(())
/// });
/// # let _ = handler;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn MessageHandler>
where
    F: Fn(CancellationToken, Arc<Message>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(f)
}
