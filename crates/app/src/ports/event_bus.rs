//! Event bus port — publish lifecycle and effect events.

use std::future::Future;

use flowhub_domain::error::FlowHubError;
use flowhub_domain::event::Event;

/// Publishes events to interested subscribers.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), FlowHubError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), FlowHubError>> + Send {
        (**self).publish(event)
    }
}
