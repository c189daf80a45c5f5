//! Cross-frame handshake and event relay.
//!
//! # State Machine
//!
//! One session per frame origin. Only the configured child origin ever gets
//! past the gate, so in practice there is a single session.
//!
//! ```text
//!             listen()                "childReady"
//!   Idle ──────────────► AwaitingReady ───────────► Ready
//!    ▲                                                │
//!    └──────────────────── unlisten() ◄───────────────┘
//! ```
//!
//! On the readiness transition the page posts, in order and only to the
//! verified sender:
//!
//! 1. `"parentReady"`
//! 2. `{ event: "attribution", data: <record> }`
//! 3. `{ event: "clientId", clientId }` when the outbound queue has one
//!
//! A second `"childReady"` is ignored. Objects with a truthy `event` field are
//! appended verbatim to the outbound queue.
//!
//! # Origin Gate
//!
//! The origin check runs before anything else, including payload decoding.
//! Foreign messages are routine cross-window noise and are dropped without
//! logging above trace level.

use std::collections::HashMap;

use embed_attribution_protocol::{is_truthy, ChildMessage, ParentMessage};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, trace};

use crate::config::ChannelConfig;
use crate::resolver::AttributionSource;

/// A message as delivered by the host's cross-window messaging primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub origin: String,
    pub data: Value,
}

impl InboundMessage {
    pub fn new(origin: impl Into<String>, data: Value) -> Self {
        InboundMessage {
            origin: origin.into(),
            data,
        }
    }
}

/// The sending frame's side of the message channel.
pub trait FramePort {
    fn post_message(&mut self, message: &ParentMessage, target_origin: &str);
}

/// Collects posts instead of delivering them.
#[derive(Debug, Default)]
pub struct RecordingPort {
    pub posts: Vec<(ParentMessage, String)>,
}

impl FramePort for RecordingPort {
    fn post_message(&mut self, message: &ParentMessage, target_origin: &str) {
        self.posts.push((message.clone(), target_origin.to_string()));
    }
}

/// The shared outbound telemetry queue.
///
/// Append-only from the channel's point of view. The only read is the scan
/// for an analytics client id.
pub trait EventQueue {
    fn push(&mut self, event: Value);
    fn entries(&self) -> &[Value];
}

/// In-memory outbound queue.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DataLayer {
    events: Vec<Value>,
}

impl DataLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl From<Vec<Value>> for DataLayer {
    fn from(events: Vec<Value>) -> Self {
        DataLayer { events }
    }
}

impl EventQueue for DataLayer {
    fn push(&mut self, event: Value) {
        self.events.push(event);
    }

    fn entries(&self) -> &[Value] {
        &self.events
    }
}

/// First truthy `field` value in the queue, as a string.
///
/// The first truthy entry decides; if it is not a string or number there is
/// no usable id.
pub fn find_client_id<Q: EventQueue + ?Sized>(queue: &Q, field: &str) -> Option<String> {
    let value = queue
        .entries()
        .iter()
        .filter_map(|entry| entry.get(field))
        .find(|value| is_truthy(value))?;
    match value {
        Value::String(id) => Some(id.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    AwaitingReady,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    NotListening,
    UntrustedOrigin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    DuplicateReady,
    Unrecognized,
}

/// What the channel did with one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Dropped(DropReason),
    /// Handshake completed; `sent` posts went back to the frame.
    Handshake { sent: usize },
    Forwarded,
    Ignored(IgnoreReason),
}

pub struct CrossFrameChannel {
    config: ChannelConfig,
    listening: bool,
    sessions: HashMap<String, HandshakeState>,
}

impl CrossFrameChannel {
    pub fn new(config: ChannelConfig) -> Self {
        CrossFrameChannel {
            config,
            listening: false,
            sessions: HashMap::new(),
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Registers the listener. The trusted origin starts awaiting readiness.
    pub fn listen(&mut self) {
        if self.listening {
            return;
        }
        self.listening = true;
        self.sessions
            .insert(self.config.child_origin.clone(), HandshakeState::AwaitingReady);
        debug!(origin = %self.config.child_origin, "Frame listener registered");
    }

    /// Unregisters the listener and forgets every session.
    pub fn unlisten(&mut self) {
        self.listening = false;
        self.sessions.clear();
    }

    pub fn session_state(&self, origin: &str) -> HandshakeState {
        self.sessions
            .get(origin)
            .copied()
            .unwrap_or(HandshakeState::Idle)
    }

    pub fn handle_message<P, A, Q>(
        &mut self,
        message: &InboundMessage,
        port: &mut P,
        attribution: &mut A,
        queue: &mut Q,
    ) -> Disposition
    where
        P: FramePort + ?Sized,
        A: AttributionSource + ?Sized,
        Q: EventQueue + ?Sized,
    {
        if message.origin != self.config.child_origin {
            trace!(origin = %message.origin, "Dropping message from untrusted origin");
            return Disposition::Dropped(DropReason::UntrustedOrigin);
        }
        if !self.listening {
            return Disposition::Dropped(DropReason::NotListening);
        }

        match ChildMessage::decode(&message.data) {
            ChildMessage::Ready => {
                self.complete_handshake(&message.origin, port, attribution, &*queue)
            }
            ChildMessage::Event(event) => {
                trace!(event = ?event.get("event"), "Forwarding frame event");
                queue.push(Value::Object(event));
                Disposition::Forwarded
            }
            ChildMessage::Unrecognized => Disposition::Ignored(IgnoreReason::Unrecognized),
        }
    }

    fn complete_handshake<P, A, Q>(
        &mut self,
        origin: &str,
        port: &mut P,
        attribution: &mut A,
        queue: &Q,
    ) -> Disposition
    where
        P: FramePort + ?Sized,
        A: AttributionSource + ?Sized,
        Q: EventQueue + ?Sized,
    {
        if self.session_state(origin) == HandshakeState::Ready {
            debug!(origin, "Frame signalled readiness again, ignoring");
            return Disposition::Ignored(IgnoreReason::DuplicateReady);
        }

        let mut outbound = vec![
            ParentMessage::Ready,
            ParentMessage::Attribution(attribution.current_attribution().to_value()),
        ];
        if let Some(client_id) = find_client_id(queue, &self.config.client_id_field) {
            outbound.push(ParentMessage::ClientId(client_id));
        }

        for message in &outbound {
            port.post_message(message, origin);
        }
        self.sessions.insert(origin.to_string(), HandshakeState::Ready);

        info!(origin, sent = outbound.len(), "Frame handshake complete");
        Disposition::Handshake {
            sent: outbound.len(),
        }
    }
}
