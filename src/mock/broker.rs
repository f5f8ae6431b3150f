//! In-process topic bus.
//!
//! Publishes are queued and delivered by a dedicated dispatcher thread, so
//! handler callbacks never run on the publishing thread and delivery is
//! globally ordered (which implies per-topic ordering). Subscriptions are
//! exact topics or MQTT-style filters with `+` (one level) and a trailing
//! `#` (any remainder).

use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::transport::{Message, MessageHandler, Transport, TransportError};

struct Subscription {
    filter: String,
    handler: MessageHandler,
}

/// In-process broker for tests and the CLI self-check.
pub struct MockBroker {
    subscriptions: Arc<Mutex<Vec<Subscription>>>,
    queue: Mutex<Option<Sender<Message>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl MockBroker {
    pub fn new() -> Self {
        let subscriptions: Arc<Mutex<Vec<Subscription>>> = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::channel::<Message>();

        let subs = Arc::clone(&subscriptions);
        let dispatcher = thread::spawn(move || {
            while let Ok(message) = rx.recv() {
                // Clone matching handlers out so none are invoked while
                // the subscription lock is held.
                let handlers: Vec<MessageHandler> = subs
                    .lock()
                    .unwrap()
                    .iter()
                    .filter(|sub| topic_matches(&sub.filter, &message.topic))
                    .map(|sub| Arc::clone(&sub.handler))
                    .collect();
                for handler in handlers {
                    handler(&message);
                }
            }
        });

        Self {
            subscriptions,
            queue: Mutex::new(Some(tx)),
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }
}

impl Default for MockBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockBroker {
    fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        reply_topic: Option<&str>,
    ) -> Result<(), TransportError> {
        let message = Message {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            reply_topic: reply_topic.map(str::to_string),
        };
        let queue = self.queue.lock().unwrap();
        queue
            .as_ref()
            .ok_or_else(|| TransportError::Publish {
                topic: topic.to_string(),
                reason: "broker is shut down".to_string(),
            })?
            .send(message)
            .map_err(|_| TransportError::Publish {
                topic: topic.to_string(),
                reason: "dispatcher is gone".to_string(),
            })
    }

    fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<(), TransportError> {
        self.subscriptions.lock().unwrap().push(Subscription {
            filter: topic.to_string(),
            handler,
        });
        Ok(())
    }

    fn unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.subscriptions
            .lock()
            .unwrap()
            .retain(|sub| sub.filter != topic);
        Ok(())
    }
}

impl Drop for MockBroker {
    fn drop(&mut self) {
        // Closing the queue ends the dispatcher loop.
        self.queue.lock().unwrap().take();
        if let Some(dispatcher) = self.dispatcher.lock().unwrap().take() {
            let _ = dispatcher.join();
        }
    }
}

/// MQTT-style topic filter match: `+` matches one level, a trailing `#`
/// matches the whole remainder.
fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(expected), Some(actual)) if expected == actual => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
