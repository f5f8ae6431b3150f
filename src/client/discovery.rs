//! Device discovery.
//!
//! Discovery fans a broadcast probe out on the shared discovery topic and
//! fans replies in on a single-use unique reply topic, so concurrent runs
//! never see each other's answers. Replies are deduplicated by device
//! identifier; a late reply may only fill in a missing address.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use log::{info, warn};

use dab_protocol::{topics, DeviceReply, DiscoveredDevice};

use crate::transport::{Message, MessageHandler};

use super::{ClientError, DabClient};

/// Floor on the per-attempt wait, applied regardless of the caller's
/// value, to let straggling replies arrive.
pub const MIN_ATTEMPT_WAIT: Duration = Duration::from_millis(200);

impl DabClient {
    /// Broadcast a discovery probe and collect the devices that answered.
    ///
    /// The probe is published `max(1, attempts)` times with at least
    /// [`MIN_ATTEMPT_WAIT`] of settling time after each. A malformed
    /// individual reply is dropped with a warning, never fatal to the run.
    pub fn discover(
        &self,
        attempts: u32,
        wait_per_attempt: Duration,
    ) -> Result<Vec<DiscoveredDevice>, ClientError> {
        let reply = topics::discovery_reply_topic();
        let found: Arc<Mutex<BTreeMap<String, DiscoveredDevice>>> =
            Arc::new(Mutex::new(BTreeMap::new()));

        let sink = Arc::clone(&found);
        let handler: MessageHandler = Arc::new(move |msg: &Message| {
            match DeviceReply::parse(&msg.payload) {
                Ok(device) => {
                    let mut known = sink.lock().unwrap_or_else(PoisonError::into_inner);
                    match known.entry(device.device_id.clone()) {
                        Entry::Vacant(slot) => {
                            slot.insert(device);
                        }
                        Entry::Occupied(mut slot) => {
                            // Only ever fill a missing address; a present
                            // one is never overwritten.
                            let record = slot.get_mut();
                            if record.ip.is_none() {
                                record.ip = device.ip;
                            }
                        }
                    }
                }
                Err(err) => warn!("dropping malformed discovery reply on {}: {err}", msg.topic),
            }
        });

        self.transport().subscribe(&reply, handler)?;

        let wait = wait_per_attempt.max(MIN_ATTEMPT_WAIT);
        for attempt in 1..=attempts.max(1) {
            if let Err(err) = self
                .transport()
                .publish(topics::DISCOVERY_TOPIC, b"{}", Some(&reply))
            {
                self.unsubscribe_best_effort(&reply);
                return Err(err.into());
            }
            info!("discovery probe {attempt} published, settling {wait:?}");
            thread::sleep(wait);
        }

        self.unsubscribe_best_effort(&reply);

        let known = found.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(known.values().cloned().collect())
    }
}
