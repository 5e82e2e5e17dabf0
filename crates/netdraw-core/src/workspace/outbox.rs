// ── Outbound path ──
//
// Control messages are stamped, recorded in history when they mutate
// the document, then routed: dropped while disconnected, buffered
// until a client id is known, otherwise queued for the topology socket.
// The session drains the queues after every dispatch.

use serde::Serialize;
use tracing::{debug, trace};

use super::Workspace;
use super::selection::Item;
use crate::event::Event;
use crate::message::{Envelope, Message};
use crate::pipeline::Stage;

/// A side effect the host performs: navigation, panels, REST lookups.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    /// Navigate to a server endpoint (exports, downloads).
    Open { url: String },
    ShowDetails { target: Item },
    HideDetails,
    /// Look up an inventory host to fill the details panel.
    FetchHost { host_id: u64 },
    ShowContextMenu { x: f64, y: f64 },
    HideContextMenu,
}

#[derive(Debug, Default)]
pub struct Outbox {
    /// Ready for the topology socket.
    pub control: Vec<Envelope>,
    /// Ready for the test socket.
    pub test: Vec<Envelope>,
    /// Sent before a client id was assigned; flushed when one arrives.
    pub initial: Vec<Envelope>,
    pub effects: Vec<Effect>,
}

impl Outbox {
    pub fn take_control(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.control)
    }

    pub fn take_test(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.test)
    }

    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    pub fn clear(&mut self) {
        self.control.clear();
        self.test.clear();
        self.initial.clear();
        self.effects.clear();
    }
}

impl Workspace {
    pub fn next_message_id(&mut self) -> u64 {
        self.message_id_seq += 1;
        self.message_id_seq
    }

    /// Set sender and fresh message ids, batch members included.
    fn stamp(&mut self, envelope: &mut Envelope, sender: u64) {
        envelope.sender = sender;
        envelope.message_id = Some(self.next_message_id());
        if let Message::MultipleMessage(batch) = &mut envelope.message {
            for inner in &mut batch.messages {
                inner.sender = sender;
                inner.message_id = Some(self.next_message_id());
            }
        }
    }

    /// Broadcast a control message to the other clients.
    pub fn send_control_message(&mut self, message: Message) {
        let mut envelope = Envelope::new(self.client_id, message);
        self.stamp(&mut envelope, self.client_id);

        if envelope.message.is_mutating() && self.history.record(envelope.clone()) {
            self.queues.direct(Stage::Time, Event::HistoryTruncated);
        }

        if self.flags.disconnected {
            trace!(msg_type = envelope.name(), "disconnected, dropping control message");
        } else if !self.connected || self.client_id == 0 {
            debug!(msg_type = envelope.name(), "no client id yet, buffering");
            self.outbox.initial.push(envelope);
        } else {
            self.outbox.control.push(envelope);
        }
    }

    /// Queue a message for the test channel.
    pub fn send_test_message(&mut self, message: Message) {
        let mut envelope = Envelope::new(self.test_client_id, message);
        self.stamp(&mut envelope, self.test_client_id);
        self.outbox.test.push(envelope);
    }

    /// Move buffered messages to the control queue, re-stamped with the
    /// current client id, in their original order.
    pub fn flush_initial_messages(&mut self) {
        if !self.connected || self.client_id == 0 {
            return;
        }
        let buffered = std::mem::take(&mut self.outbox.initial);
        if !buffered.is_empty() {
            debug!(count = buffered.len(), client_id = self.client_id, "flushing buffered messages");
        }
        for mut envelope in buffered {
            envelope.sender = self.client_id;
            if let Message::MultipleMessage(batch) = &mut envelope.message {
                for inner in &mut batch.messages {
                    inner.sender = self.client_id;
                }
            }
            self.outbox.control.push(envelope);
        }
    }

    pub fn emit(&mut self, effect: Effect) {
        self.outbox.effects.push(effect);
    }

    /// Socket up or down. While down, control messages are buffered.
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
        if connected {
            self.flush_initial_messages();
        }
    }

    /// A new client id from the server.
    pub fn set_client_id(&mut self, client_id: u64) {
        self.client_id = client_id;
        self.connected = true;
        self.flush_initial_messages();
    }
}
