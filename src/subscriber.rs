//! Async [`Subscriber`] for received network messages.
//!
//! The subscriber owns a set of readers and turns raw frames from an
//! external transport into [`Event`]s. Transport itself is out of scope:
//! frames arrive either through [`Subscriber::ingest`] or an `mpsc` channel
//! handed to [`Subscriber::spawn`].

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::event::{Event, EventDispatcher, EventFilter, Subscription};
use crate::message::NetworkMessage;
use crate::types::ReaderConfig;

const EVENT_CAPACITY: usize = 256;

/// Decodes frames for a set of readers and dispatches the results.
pub struct Subscriber {
    readers: Arc<RwLock<Vec<ReaderConfig>>>,
    dispatcher: EventDispatcher,
    process_task: Option<JoinHandle<()>>,
}

impl Subscriber {
    /// Creates a subscriber for the given readers.
    ///
    /// # Errors
    ///
    /// Returns an error if any reader configuration is invalid.
    pub fn new(readers: Vec<ReaderConfig>) -> Result<Self> {
        for reader in &readers {
            reader.validate()?;
        }
        Ok(Self {
            readers: Arc::new(RwLock::new(readers)),
            dispatcher: EventDispatcher::new(EVENT_CAPACITY),
            process_task: None,
        })
    }

    /// Adds a reader; it takes part in decoding from the next frame on.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader configuration is invalid.
    pub async fn add_reader(&self, reader: ReaderConfig) -> Result<()> {
        reader.validate()?;
        self.readers.write().await.push(reader);
        Ok(())
    }

    /// Returns the configured readers.
    pub async fn readers(&self) -> Vec<ReaderConfig> {
        self.readers.read().await.clone()
    }

    /// Subscribes to events.
    #[must_use]
    pub fn subscribe(&self, filter: Option<EventFilter>) -> Subscription {
        self.dispatcher.subscribe(filter)
    }

    /// Waits for an event matching the filter with timeout.
    pub async fn wait_for(&self, filter: EventFilter, timeout: Duration) -> Option<Event> {
        self.dispatcher.wait_for(filter, timeout).await
    }

    /// Decodes one frame and dispatches the results.
    ///
    /// Returns the number of data sets delivered.
    pub async fn ingest(&self, frame: &[u8]) -> usize {
        process_frame(frame, &self.readers, &self.dispatcher).await
    }

    /// Starts a background task decoding every frame received on `frames`.
    ///
    /// A previously started task is stopped first. The task ends when the
    /// sending side closes.
    pub fn spawn(&mut self, mut frames: mpsc::Receiver<Bytes>) {
        self.stop();

        let readers = Arc::clone(&self.readers);
        let dispatcher = self.dispatcher.clone();
        let process_task = tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                process_frame(&frame, &readers, &dispatcher).await;
            }
            tracing::debug!("frame channel closed");
        });
        self.process_task = Some(process_task);
    }

    /// Stops the background task, if any.
    pub fn stop(&mut self) {
        if let Some(task) = self.process_task.take() {
            task.abort();
        }
    }
}

/// Decodes a received frame and dispatches the matching events.
async fn process_frame(
    frame: &[u8],
    readers: &RwLock<Vec<ReaderConfig>>,
    dispatcher: &EventDispatcher,
) -> usize {
    tracing::trace!("processing frame, {} bytes", frame.len());

    let readers = readers.read().await;
    let outcome = NetworkMessage::decode(frame, &readers);

    for (index, message) in outcome.matches() {
        dispatcher.dispatch(Event::DataSetReceived {
            reader: readers[index].name.clone(),
            message: Box::new(message.clone()),
        });
    }

    if let Some(reason) = outcome.diagnostic() {
        dispatcher.dispatch(Event::DecodeFailed {
            reason: reason.clone(),
        });
    } else if outcome.is_empty() {
        dispatcher.dispatch(Event::Ignored);
    }

    outcome.len()
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::DataSetMessage;
    use crate::protocol::{
        DataSetFieldContentMask, DataSetMessageContentMask, NetworkMessageContentMask,
    };
    use crate::types::{
        BuiltInType, DataSet, DataSetMetaData, DataValue, FieldMetaData, ReaderMessageSettings,
    };

    const TIMEOUT: Duration = Duration::from_millis(500);

    fn reader(name: &str, field: &str) -> ReaderConfig {
        ReaderConfig::new(
            name,
            DataSetMetaData::new(name).field(FieldMetaData::new(field, BuiltInType::Int32)),
        )
        .message_settings(ReaderMessageSettings::new(
            NetworkMessageContentMask::NETWORK_MESSAGE_HEADER,
            DataSetMessageContentMask::NONE,
            DataSetFieldContentMask::NONE,
        ))
    }

    fn frame(field: &str, value: i32) -> Bytes {
        let mut message = NetworkMessage::new();
        message.set_content_mask(NetworkMessageContentMask::NETWORK_MESSAGE_HEADER);
        message.push(DataSetMessage::new(DataSet::from_iter([(
            field,
            DataValue::new(value),
        )])));
        message.encode().unwrap()
    }

    #[tokio::test]
    async fn test_ingest_dispatches_matches() {
        let subscriber = Subscriber::new(vec![reader("level", "Level"), reader("flow", "Flow")])
            .unwrap();
        let mut sub = subscriber.subscribe(None);

        assert_eq!(subscriber.ingest(&frame("Flow", 12)).await, 1);

        let event = sub.recv().await.unwrap();
        assert_eq!(event.reader(), Some("flow"));
        let value = event.message().unwrap().data_set().get("Flow").unwrap();
        assert_eq!(value, &DataValue::new(12));
    }

    #[tokio::test]
    async fn test_ingest_reports_ignored_and_failed() {
        let subscriber = Subscriber::new(vec![reader("level", "Level")]).unwrap();
        let mut sub = subscriber.subscribe(None);

        assert_eq!(subscriber.ingest(&frame("Other", 1)).await, 0);
        assert!(matches!(sub.recv().await, Some(Event::Ignored)));

        assert_eq!(subscriber.ingest(b"{]").await, 0);
        assert!(matches!(sub.recv().await, Some(Event::DecodeFailed { .. })));
    }

    #[tokio::test]
    async fn test_add_reader() {
        let subscriber = Subscriber::new(Vec::new()).unwrap();
        assert_eq!(subscriber.ingest(&frame("Level", 3)).await, 0);

        subscriber.add_reader(reader("level", "Level")).await.unwrap();
        assert_eq!(subscriber.ingest(&frame("Level", 3)).await, 1);
        assert_eq!(subscriber.readers().await.len(), 1);

        let invalid = reader("bad", "Level").publisher("");
        assert!(subscriber.add_reader(invalid).await.is_err());
    }

    #[tokio::test]
    async fn test_spawned_task_processes_frames() {
        let mut subscriber = Subscriber::new(vec![reader("level", "Level")]).unwrap();
        let (frame_tx, frame_rx) = mpsc::channel(8);
        subscriber.spawn(frame_rx);

        let waiter = subscriber.wait_for(EventFilter::reader("level"), TIMEOUT);
        let (event, sent) = tokio::join!(waiter, frame_tx.send(frame("Level", 9)));
        sent.unwrap();

        let event = event.unwrap();
        let value = event.message().unwrap().data_set().get("Level").unwrap();
        assert_eq!(value, &DataValue::new(9));

        subscriber.stop();
    }
}
