//! Event system for decoded data sets.
//!
//! Every frame handed to a [`Subscriber`](crate::Subscriber) results in
//! events on a broadcast channel: one per decoded data set, or a single
//! event saying why nothing was delivered.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::error::DecodeError;
use crate::message::DataSetMessage;

/// Event types that can be dispatched.
#[derive(Debug, Clone)]
pub enum Event {
    /// A reader decoded a data set.
    DataSetReceived {
        /// Name of the reader that matched.
        reader: String,
        /// The decoded message.
        message: Box<DataSetMessage>,
    },
    /// A frame was malformed; data sets decoded before the failure were
    /// dispatched already.
    DecodeFailed {
        /// What was wrong with the frame.
        reason: DecodeError,
    },
    /// A frame matched no reader.
    Ignored,
}

impl Event {
    /// Returns the reader name for data set events.
    #[must_use]
    pub fn reader(&self) -> Option<&str> {
        match self {
            Self::DataSetReceived { reader, .. } => Some(reader.as_str()),
            Self::DecodeFailed { .. } | Self::Ignored => None,
        }
    }

    /// Returns the decoded message for data set events.
    #[must_use]
    pub fn message(&self) -> Option<&DataSetMessage> {
        match self {
            Self::DataSetReceived { message, .. } => Some(message.as_ref()),
            Self::DecodeFailed { .. } | Self::Ignored => None,
        }
    }
}

/// A subscription to events.
pub struct Subscription {
    receiver: broadcast::Receiver<Event>,
    filter: Option<EventFilter>,
}

impl Subscription {
    /// Receives the next event passing the subscription's filter.
    ///
    /// Events missed because the subscription lagged behind are skipped.
    /// Returns `None` once the dispatcher is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.as_ref().is_none_or(|f| f.matches(&event)) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("subscription lagged, {} event(s) skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Subscription filter for data set events.
///
/// An empty filter matches every event; a non-empty one matches only
/// [`Event::DataSetReceived`] events satisfying all of its conditions.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Filter by reader name.
    pub reader: Option<String>,
    /// Filter by DataSetWriter id.
    pub writer_id: Option<u16>,
}

impl EventFilter {
    /// Creates a filter for one reader.
    #[must_use]
    pub fn reader(name: impl Into<String>) -> Self {
        Self {
            reader: Some(name.into()),
            writer_id: None,
        }
    }

    /// Creates a filter for one DataSetWriter.
    #[must_use]
    pub const fn writer(writer_id: u16) -> Self {
        Self {
            reader: None,
            writer_id: Some(writer_id),
        }
    }

    /// Checks if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        if self.reader.is_none() && self.writer_id.is_none() {
            return true;
        }
        let Event::DataSetReceived { reader, message } = event else {
            return false;
        };

        if let Some(ref expected) = self.reader {
            if reader != expected {
                return false;
            }
        }

        if let Some(expected) = self.writer_id {
            if message.data_set_writer_id != expected {
                return false;
            }
        }

        true
    }
}

struct EventDispatcherInner {
    sender: broadcast::Sender<Event>,
}

/// Dispatches events to subscribers.
#[derive(Clone)]
pub struct EventDispatcher {
    inner: Arc<EventDispatcherInner>,
}

impl EventDispatcher {
    /// Creates a new event dispatcher.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(EventDispatcherInner { sender }),
        }
    }

    /// Dispatches an event to all subscribers.
    pub fn dispatch(&self, event: Event) {
        // No receivers is fine.
        let _ = self.inner.sender.send(event);
    }

    /// Subscribes to events with an optional filter.
    #[must_use]
    pub fn subscribe(&self, filter: Option<EventFilter>) -> Subscription {
        Subscription {
            receiver: self.inner.sender.subscribe(),
            filter,
        }
    }

    /// Waits for an event matching the filter with timeout.
    ///
    /// Returns `None` if the timeout expires or the channel is closed.
    pub async fn wait_for(
        &self,
        filter: EventFilter,
        timeout: std::time::Duration,
    ) -> Option<Event> {
        let mut subscription = self.subscribe(Some(filter));

        tokio::select! {
            biased;
            result = subscription.recv() => result,
            () = tokio::time::sleep(timeout) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataSet, DataValue};

    fn received(reader: &str, writer_id: u16) -> Event {
        let mut message = DataSetMessage::new(DataSet::from_iter([("x", DataValue::new(1))]));
        message.data_set_writer_id = writer_id;
        Event::DataSetReceived {
            reader: reader.into(),
            message: Box::new(message),
        }
    }

    #[tokio::test]
    async fn test_event_dispatch() {
        let dispatcher = EventDispatcher::new(16);
        let mut sub = dispatcher.subscribe(None);

        dispatcher.dispatch(Event::Ignored);

        let event = tokio::time::timeout(std::time::Duration::from_millis(100), sub.recv())
            .await
            .unwrap();

        assert!(matches!(event, Some(Event::Ignored)));
    }

    #[tokio::test]
    async fn test_filtered_subscription() {
        let dispatcher = EventDispatcher::new(16);
        let mut sub = dispatcher.subscribe(Some(EventFilter::reader("b")));

        dispatcher.dispatch(Event::Ignored);
        dispatcher.dispatch(received("a", 1));
        dispatcher.dispatch(received("b", 2));

        let event = sub.recv().await.unwrap();
        assert_eq!(event.reader(), Some("b"));
    }

    #[test]
    fn test_event_filter() {
        let filter = EventFilter::reader("boiler");

        assert!(filter.matches(&received("boiler", 1)));
        assert!(!filter.matches(&received("pump", 1)));
        assert!(!filter.matches(&Event::Ignored));
        assert!(EventFilter::default().matches(&Event::Ignored));
    }

    #[test]
    fn test_writer_filter() {
        let filter = EventFilter::writer(7);

        assert!(filter.matches(&received("any", 7)));
        assert!(!filter.matches(&received("any", 8)));
        assert!(!filter.matches(&Event::DecodeFailed {
            reason: DecodeError::InvalidJson("eof".into())
        }));
    }

    #[tokio::test]
    async fn test_wait_for_timeout() {
        let dispatcher = EventDispatcher::new(16);
        let event = dispatcher
            .wait_for(EventFilter::writer(1), std::time::Duration::from_millis(10))
            .await;
        assert!(event.is_none());
    }
}
