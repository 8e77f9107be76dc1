use bridge_claim_codec::WitnessedEvent;
use bridge_relayer_types::EventLogIndex;
use futures::TryFutureExt;

/// A trait that defines a handler for witnessed bridge events.
///
/// The handlers are implemented separately from the watchers, so that we can have
/// one chain watcher and many event handlers that will run in parallel.
#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    /// a method to be called with the event information,
    /// it is up to the handler to decide what to do with the event.
    ///
    /// If this method returned an error, the handler will be considered as failed.
    /// to have a retry mechanism, use the [`EventHandlerWithRetry::handle_event_with_retry`] method
    /// which does exactly what it says.
    async fn handle_event(
        &self,
        index: EventLogIndex,
        event: &WitnessedEvent,
    ) -> bridge_relayer_utils::Result<()>;

    /// Whether the event could be handled by the handler
    async fn can_handle_event(
        &self,
        _event: &WitnessedEvent,
    ) -> bridge_relayer_utils::Result<bool> {
        Ok(true)
    }
}

/// An Auxiliary trait to handle events with retry logic.
///
/// this trait is automatically implemented for all the event handlers.
#[async_trait::async_trait]
pub trait EventHandlerWithRetry: EventHandler {
    /// Calls [`EventHandler::handle_event`] until it succeeds, the backoff
    /// gives up, or the error is not retryable.
    ///
    /// **Note**: this method is automatically implemented for all the event handlers.
    async fn handle_event_with_retry(
        &self,
        index: EventLogIndex,
        event: &WitnessedEvent,
        backoff: impl backoff::backoff::Backoff + Send + Sync + 'static,
    ) -> bridge_relayer_utils::Result<()> {
        if !self.can_handle_event(event).await? {
            return Ok(());
        };

        let wrapped_task = || {
            self.handle_event(index, event).map_err(|e| {
                if e.is_retryable() {
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        };
        backoff::future::retry(backoff, wrapped_task).await
    }
}

impl<T> EventHandlerWithRetry for T where T: EventHandler + ?Sized {}
