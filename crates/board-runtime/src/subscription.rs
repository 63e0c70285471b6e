//! Push-event subscription lifecycle.
//!
//! While the board is active it holds exactly one handler per event kind on
//! the push channel. The stoppage-added and unclassified-stoppage kinds share
//! one handler value. Handlers carry no roster; they only forward the event,
//! so membership is always resolved against the board's current state.

use std::sync::Arc;

use board_core::Result;
use board_data::events::{EventHandler, EventKind, PushChannel, PushEvent, SubscriberId};

pub struct EventSubscription {
    channel: Arc<dyn PushChannel>,
    subscriber: SubscriberId,
    attached: bool,
}

impl EventSubscription {
    pub fn new(channel: Arc<dyn PushChannel>) -> Self {
        Self {
            channel,
            subscriber: SubscriberId::next(),
            attached: false,
        }
    }

    /// Register `forward` for all four event kinds.
    ///
    /// Stops at the first registration failure and returns it. Whatever was
    /// registered before the failure stays registered until
    /// [`EventSubscription::deactivate`], which removes all four regardless.
    pub fn activate<F>(&mut self, forward: F) -> Result<()>
    where
        F: Fn(PushEvent) + Send + Sync + 'static,
    {
        let forward = Arc::new(forward);
        self.attached = true;

        let state: EventHandler = {
            let f = Arc::clone(&forward);
            Arc::new(move |e: &PushEvent| f(e.clone()))
        };
        let production: EventHandler = {
            let f = Arc::clone(&forward);
            Arc::new(move |e: &PushEvent| f(e.clone()))
        };
        let stoppage: EventHandler = {
            let f = Arc::clone(&forward);
            Arc::new(move |e: &PushEvent| f(e.clone()))
        };

        let registrations = [
            (EventKind::MachineStateUpdate, state),
            (EventKind::ProductionUpdate, production),
            (EventKind::StoppageAdded, Arc::clone(&stoppage)),
            (EventKind::UnclassifiedStoppageDetected, stoppage),
        ];

        for (kind, handler) in registrations {
            if let Err(e) = self.channel.subscribe(kind, self.subscriber, handler) {
                tracing::warn!(event = kind.wire_name(), error = %e, "push subscription failed");
                return Err(e);
            }
        }
        tracing::debug!("push handlers registered");
        Ok(())
    }

    /// Unregister the handlers for all four kinds. Safe to call repeatedly.
    pub fn deactivate(&mut self) {
        if !self.attached {
            return;
        }
        for kind in EventKind::ALL {
            self.channel.unsubscribe(kind, self.subscriber);
        }
        self.attached = false;
        tracing::debug!("push handlers removed");
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.deactivate();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use board_core::models::MachineId;
    use board_core::BoardError;
    use board_data::events::EventHub;
    use parking_lot::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<PushEvent>>>, impl Fn(PushEvent) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |e| sink.lock().push(e))
    }

    /// Channel that refuses registrations for one kind.
    struct FlakyChannel {
        inner: EventHub,
        refuse: EventKind,
    }

    impl PushChannel for FlakyChannel {
        fn subscribe(&self, kind: EventKind, subscriber: SubscriberId, handler: EventHandler) -> Result<()> {
            if kind == self.refuse {
                return Err(BoardError::Subscription(format!("{} refused", kind.wire_name())));
            }
            self.inner.subscribe(kind, subscriber, handler)
        }

        fn unsubscribe(&self, kind: EventKind, subscriber: SubscriberId) {
            self.inner.unsubscribe(kind, subscriber);
        }
    }

    #[test]
    fn test_activate_registers_one_handler_per_kind() {
        let hub = Arc::new(EventHub::new());
        let mut sub = EventSubscription::new(hub.clone());
        let (seen, forward) = recorder();
        sub.activate(forward).unwrap();

        for kind in EventKind::ALL {
            assert_eq!(hub.handler_count(kind), 1);
        }

        hub.publish(&PushEvent::StoppageAdded { machine_id: MachineId(1) });
        hub.publish(&PushEvent::UnclassifiedStoppage { machine_id: MachineId(2) });
        assert_eq!(seen.lock().len(), 2);
    }

    #[test]
    fn test_activate_twice_does_not_duplicate() {
        let hub = Arc::new(EventHub::new());
        let mut sub = EventSubscription::new(hub.clone());
        let (seen, forward) = recorder();
        sub.activate(forward).unwrap();
        let (_, forward) = recorder();
        sub.activate(forward).unwrap();

        assert_eq!(hub.total_handlers(), 4);
        hub.publish(&PushEvent::Production { machine_id: MachineId(1) });
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_deactivate_removes_all_handlers() {
        let hub = Arc::new(EventHub::new());
        let mut sub = EventSubscription::new(hub.clone());
        let (seen, forward) = recorder();
        sub.activate(forward).unwrap();

        sub.deactivate();
        sub.deactivate();
        assert_eq!(hub.total_handlers(), 0);
        assert!(!sub.is_attached());

        hub.publish(&PushEvent::Production { machine_id: MachineId(1) });
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_drop_unsubscribes() {
        let hub = Arc::new(EventHub::new());
        {
            let mut sub = EventSubscription::new(hub.clone());
            let (_, forward) = recorder();
            sub.activate(forward).unwrap();
            assert_eq!(hub.total_handlers(), 4);
        }
        assert_eq!(hub.total_handlers(), 0);
    }

    #[test]
    fn test_partial_failure_is_reported_and_cleaned_up() {
        let channel = Arc::new(FlakyChannel {
            inner: EventHub::new(),
            refuse: EventKind::StoppageAdded,
        });
        let mut sub = EventSubscription::new(channel.clone());
        let (_, forward) = recorder();

        let err = sub.activate(forward).unwrap_err();
        assert!(matches!(err, BoardError::Subscription(_)));
        assert_eq!(channel.inner.total_handlers(), 2);

        sub.deactivate();
        assert_eq!(channel.inner.total_handlers(), 0);
    }

    #[test]
    fn test_unclassified_stoppage_is_forwarded() {
        let hub = Arc::new(EventHub::new());
        let mut sub = EventSubscription::new(hub.clone());
        let (seen, forward) = recorder();
        sub.activate(forward).unwrap();

        hub.publish(&PushEvent::UnclassifiedStoppage { machine_id: MachineId(5) });
        assert_eq!(
            seen.lock().as_slice(),
            &[PushEvent::UnclassifiedStoppage { machine_id: MachineId(5) }]
        );
    }
}
