use std::time::SystemTime;

use crossbeam::channel::{unbounded, Receiver, Sender};
use ndpulsegen_wire::{DropReason, Message, MessageCategory};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::trace;

/// Something that happened on a device connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DeviceEvent {
    /// Decoded telemetry, stamped when its id byte was read.
    Message { message: Message, at: SystemTime },
    /// Bytes discarded while resynchronizing.
    BytesDropped {
        id: u8,
        reason: DropReason,
        at: SystemTime,
    },
    /// A read failed or a frame could not be decoded.
    Error { message: String },
    /// A port was opened.
    Connected { port: String },
    /// The port was closed.
    Disconnected,
    /// The background reader exited.
    Finished,
}

impl DeviceEvent {
    /// Topic this event is published under.
    pub fn topic(&self) -> Topic {
        match self {
            Self::Message { message, .. } => Topic::Message(message.category()),
            Self::BytesDropped { .. } => Topic::BytesDropped,
            Self::Error { .. } => Topic::Error,
            Self::Connected { .. } => Topic::Connected,
            Self::Disconnected => Topic::Disconnected,
            Self::Finished => Topic::Finished,
        }
    }
}

/// What a subscriber wants to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// One telemetry category.
    Message(MessageCategory),
    BytesDropped,
    Error,
    Connected,
    Disconnected,
    Finished,
    /// Every event.
    All,
}

impl Topic {
    /// Returns true if a subscriber to `self` receives events on `topic`.
    pub fn matches(self, topic: Topic) -> bool {
        self == Topic::All || self == topic
    }
}

impl From<MessageCategory> for Topic {
    fn from(category: MessageCategory) -> Self {
        Topic::Message(category)
    }
}

/// Fan-out of events to any number of subscribers.
#[derive(Debug, Default)]
pub(crate) struct Subscribers {
    inner: Mutex<Vec<(Topic, Sender<DeviceEvent>)>>,
}

impl Subscribers {
    pub(crate) fn subscribe(&self, topic: Topic) -> Receiver<DeviceEvent> {
        let (tx, rx) = unbounded();
        self.inner.lock().push((topic, tx));
        rx
    }

    /// Deliver `event` to every matching subscriber, dropping those whose
    /// receiver is gone.
    pub(crate) fn publish(&self, event: DeviceEvent) {
        let topic = event.topic();
        let mut subscribers = self.inner.lock();
        subscribers.retain(|(wanted, tx)| !wanted.matches(topic) || tx.send(event.clone()).is_ok());
        trace!(?topic, subscribers = subscribers.len(), "published event");
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Hold the subscriber list, stalling every publisher until released.
    #[cfg(test)]
    pub(crate) fn stall(&self) -> parking_lot::MutexGuard<'_, Vec<(Topic, Sender<DeviceEvent>)>> {
        self.inner.lock()
    }
}

#[cfg(test)]
mod tests {
    use ndpulsegen_wire::Print;

    use super::*;

    fn print(value: u64) -> DeviceEvent {
        DeviceEvent::Message {
            message: Message::Print(Print {
                easy_printed_value: value,
            }),
            at: SystemTime::now(),
        }
    }

    #[test]
    fn events_reach_matching_topics_only() {
        let subscribers = Subscribers::default();
        let prints = subscribers.subscribe(MessageCategory::Print.into());
        let states = subscribers.subscribe(MessageCategory::DeviceState.into());
        let all = subscribers.subscribe(Topic::All);

        subscribers.publish(print(7));
        subscribers.publish(DeviceEvent::Finished);

        assert_eq!(prints.try_iter().count(), 1);
        assert_eq!(states.try_iter().count(), 0);
        let topics: Vec<Topic> = all.try_iter().map(|event| event.topic()).collect();
        assert_eq!(
            topics,
            vec![Topic::Message(MessageCategory::Print), Topic::Finished]
        );
    }

    #[test]
    fn dropped_receivers_are_pruned_on_publish() {
        let subscribers = Subscribers::default();
        let kept = subscribers.subscribe(Topic::Error);
        let gone = subscribers.subscribe(Topic::Error);
        let other = subscribers.subscribe(Topic::Connected);
        drop(gone);
        drop(other);
        assert_eq!(subscribers.len(), 3);

        subscribers.publish(DeviceEvent::Error {
            message: "boom".to_string(),
        });

        // Only receivers matching the published topic are checked.
        assert_eq!(subscribers.len(), 2);
        assert_eq!(kept.try_iter().count(), 1);
    }

    #[test]
    fn events_serialize_with_tag() {
        let json = serde_json::to_value(DeviceEvent::Connected {
            port: "sim0".to_string(),
        })
        .unwrap();
        assert_eq!(json["event"], "connected");
        assert_eq!(json["port"], "sim0");
    }
}
