//! Registry event fan-out.
//!
//! Listeners are invoked synchronously in subscription order. A panicking
//! listener is logged and skipped; delivery to siblings continues.

use crate::failure::FailureCategory;
use crate::pattern::types::TemplateType;
use serde::Serialize;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Events emitted by the pattern registry.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PatternEvent {
    PatternLearned {
        pattern_id: String,
        template_type: TemplateType,
        domain: String,
    },
    PatternApplied {
        pattern_id: String,
        domain: String,
        success: bool,
        confidence: f64,
    },
    PatternArchived {
        pattern_id: String,
        reason: String,
    },
    ConfidenceDecayed {
        pattern_id: String,
        from: f64,
        to: f64,
    },
    AntiPatternCreated {
        anti_pattern_id: String,
        source_pattern_id: String,
        category: FailureCategory,
    },
}

/// Listener callback.
pub type Listener = Arc<dyn Fn(&PatternEvent) + Send + Sync>;

/// Handle returned by `subscribe`; pass back to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Ordered listener set.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    // Vec preserves subscription order for delivery
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; returns a handle for unsubscription.
    pub fn subscribe(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .expect("listener lock poisoned")
            .push((id, listener));
        id
    }

    /// Remove a listener. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: ListenerId) {
        self.listeners
            .lock()
            .expect("listener lock poisoned")
            .retain(|(lid, _)| *lid != id);
    }

    /// Deliver an event to every listener, in subscription order.
    pub fn emit(&self, event: &PatternEvent) {
        let listeners: Vec<Listener> = {
            let guard = self.listeners.lock().expect("listener lock poisoned");
            guard.iter().map(|(_, l)| Arc::clone(l)).collect()
        };

        for listener in listeners {
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| listener(event)));
            if result.is_err() {
                tracing::warn!(?event, "Pattern event listener panicked; skipping");
            }
        }
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.lock().expect("listener lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.len())
            .finish()
    }
}

/// Collects events into a map of counts; test helper for listener order
/// and panic isolation.
pub fn event_kind(event: &PatternEvent) -> &'static str {
    match event {
        PatternEvent::PatternLearned { .. } => "pattern_learned",
        PatternEvent::PatternApplied { .. } => "pattern_applied",
        PatternEvent::PatternArchived { .. } => "pattern_archived",
        PatternEvent::ConfidenceDecayed { .. } => "confidence_decayed",
        PatternEvent::AntiPatternCreated { .. } => "anti_pattern_created",
    }
}

/// Count events by kind; useful in tests.
pub fn count_kinds<'a>(events: impl Iterator<Item = &'a PatternEvent>) -> HashMap<&'static str, usize> {
    let mut counts = HashMap::new();
    for event in events {
        *counts.entry(event_kind(event)).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> PatternEvent {
        PatternEvent::PatternApplied {
            pattern_id: "bootstrap:reddit".into(),
            domain: "reddit.com".into(),
            success: true,
            confidence: 1.0,
        }
    }

    #[test]
    fn test_listeners_receive_in_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = Arc::clone(&order);
            bus.subscribe(Arc::new(move |_| order.lock().unwrap().push(i)));
        }

        bus.emit(&sample_event());
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_panicking_listener_does_not_drop_siblings() {
        let bus = EventBus::new();
        let delivered = Arc::new(Mutex::new(0));

        bus.subscribe(Arc::new(|_| panic!("bad listener")));
        {
            let delivered = Arc::clone(&delivered);
            bus.subscribe(Arc::new(move |_| *delivered.lock().unwrap() += 1));
        }

        bus.emit(&sample_event());
        assert_eq!(*delivered.lock().unwrap(), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let delivered = Arc::new(Mutex::new(0));

        let id = {
            let delivered = Arc::clone(&delivered);
            bus.subscribe(Arc::new(move |_| *delivered.lock().unwrap() += 1))
        };

        bus.emit(&sample_event());
        bus.unsubscribe(id);
        bus.emit(&sample_event());

        assert_eq!(*delivered.lock().unwrap(), 1);
    }

    #[test]
    fn test_event_serialization_tags() {
        let json = serde_json::to_string(&sample_event()).unwrap();
        assert!(json.contains("\"type\":\"pattern_applied\""));
    }
}
