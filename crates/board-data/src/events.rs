//! Push-event channel.
//!
//! The backend pushes four kinds of unsolicited events. A [`PushChannel`]
//! lets a subscriber register one handler per [`EventKind`] and remove it
//! again; [`EventHub`] is the in-process implementation that the WebSocket
//! feed publishes into.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;

use board_core::models::{MachineId, MachineStatus};
use board_core::Result;

// ── EventKind ─────────────────────────────────────────────────────────────────

/// Categories of push events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    MachineStateUpdate,
    ProductionUpdate,
    StoppageAdded,
    UnclassifiedStoppageDetected,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::MachineStateUpdate,
        EventKind::ProductionUpdate,
        EventKind::StoppageAdded,
        EventKind::UnclassifiedStoppageDetected,
    ];

    pub fn wire_name(self) -> &'static str {
        match self {
            Self::MachineStateUpdate => "machine-state-update",
            Self::ProductionUpdate => "production-update",
            Self::StoppageAdded => "stoppage-added",
            Self::UnclassifiedStoppageDetected => "unclassified-stoppage-detected",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.wire_name() == name)
    }
}

// ── PushEvent ─────────────────────────────────────────────────────────────────

/// A decoded push event.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// `status` is the live value; `db_status` the database-confirmed one.
    MachineState {
        machine_id: MachineId,
        status: MachineStatus,
        db_status: MachineStatus,
    },
    Production { machine_id: MachineId },
    StoppageAdded { machine_id: MachineId },
    UnclassifiedStoppage { machine_id: MachineId },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatePayload {
    machine_id: MachineId,
    status: MachineStatus,
    db_status: MachineStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignalPayload {
    machine_id: MachineId,
}

#[derive(Deserialize)]
struct Frame {
    event: String,
    #[serde(default)]
    data: Value,
}

impl PushEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::MachineState { .. } => EventKind::MachineStateUpdate,
            Self::Production { .. } => EventKind::ProductionUpdate,
            Self::StoppageAdded { .. } => EventKind::StoppageAdded,
            Self::UnclassifiedStoppage { .. } => EventKind::UnclassifiedStoppageDetected,
        }
    }

    pub fn machine_id(&self) -> MachineId {
        match self {
            Self::MachineState { machine_id, .. }
            | Self::Production { machine_id }
            | Self::StoppageAdded { machine_id }
            | Self::UnclassifiedStoppage { machine_id } => *machine_id,
        }
    }

    /// Decode the payload of an event of `kind`.
    pub fn decode(kind: EventKind, data: Value) -> Result<Self> {
        let event = match kind {
            EventKind::MachineStateUpdate => {
                let p: StatePayload = serde_json::from_value(data)?;
                Self::MachineState {
                    machine_id: p.machine_id,
                    status: p.status,
                    db_status: p.db_status,
                }
            }
            EventKind::ProductionUpdate => Self::Production {
                machine_id: serde_json::from_value::<SignalPayload>(data)?.machine_id,
            },
            EventKind::StoppageAdded => Self::StoppageAdded {
                machine_id: serde_json::from_value::<SignalPayload>(data)?.machine_id,
            },
            EventKind::UnclassifiedStoppageDetected => Self::UnclassifiedStoppage {
                machine_id: serde_json::from_value::<SignalPayload>(data)?.machine_id,
            },
        };
        Ok(event)
    }

    /// Decode a text frame of the form `{"event": "<name>", "data": {...}}`.
    ///
    /// Returns `Ok(None)` for well-formed frames naming an event the board
    /// does not consume.
    pub fn decode_frame(text: &str) -> Result<Option<Self>> {
        let frame: Frame = serde_json::from_str(text)?;
        match EventKind::from_wire(&frame.event) {
            Some(kind) => Self::decode(kind, frame.data).map(Some),
            None => Ok(None),
        }
    }
}

// ── PushChannel ───────────────────────────────────────────────────────────────

/// Callback invoked for every event of the kind it was registered for.
pub type EventHandler = Arc<dyn Fn(&PushEvent) + Send + Sync>;

/// Identity under which a subscriber registers its handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Allocate a process-unique id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Subscribe/unsubscribe surface of a push channel.
pub trait PushChannel: Send + Sync {
    /// Register `handler` for `kind` under `subscriber`, replacing any handler
    /// the subscriber already had for that kind.
    fn subscribe(&self, kind: EventKind, subscriber: SubscriberId, handler: EventHandler) -> Result<()>;

    /// Remove the subscriber's handler for `kind`. Removing a handler that is
    /// not registered is a no-op.
    fn unsubscribe(&self, kind: EventKind, subscriber: SubscriberId);
}

// ── EventHub ──────────────────────────────────────────────────────────────────

/// In-process [`PushChannel`] dispatching to handlers in registration order.
#[derive(Default)]
pub struct EventHub {
    handlers: RwLock<HashMap<EventKind, Vec<(SubscriberId, EventHandler)>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every handler registered for its kind.
    ///
    /// Returns the number of handlers invoked. Handlers run outside the lock,
    /// so a handler may itself subscribe or unsubscribe.
    pub fn publish(&self, event: &PushEvent) -> usize {
        let targets: Vec<EventHandler> = self
            .handlers
            .read()
            .get(&event.kind())
            .map(|hs| hs.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        for handler in &targets {
            handler(event);
        }
        targets.len()
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.read().get(&kind).map_or(0, Vec::len)
    }

    pub fn total_handlers(&self) -> usize {
        self.handlers.read().values().map(Vec::len).sum()
    }
}

impl PushChannel for EventHub {
    fn subscribe(&self, kind: EventKind, subscriber: SubscriberId, handler: EventHandler) -> Result<()> {
        let mut handlers = self.handlers.write();
        let slot = handlers.entry(kind).or_default();
        match slot.iter_mut().find(|(id, _)| *id == subscriber) {
            Some(existing) => existing.1 = handler,
            None => slot.push((subscriber, handler)),
        }
        tracing::debug!(event = kind.wire_name(), "handler subscribed");
        Ok(())
    }

    fn unsubscribe(&self, kind: EventKind, subscriber: SubscriberId) {
        let mut handlers = self.handlers.write();
        if let Some(slot) = handlers.get_mut(&kind) {
            slot.retain(|(id, _)| *id != subscriber);
            if slot.is_empty() {
                handlers.remove(&kind);
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
