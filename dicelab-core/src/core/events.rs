//! In-process event bus.
//!
//! One bus per engine, threaded through explicitly - there is no process
//! global. Delivery is synchronous within a session: `emit` appends to the
//! ring buffer and fans out to every subscribed sink before returning.
//! Cross-session aggregation happens on the runner's result channel, never
//! by broadcasting events between workers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// Maximum events retained in the ring buffer.
pub const EVENT_HISTORY_LIMIT: usize = 10_000;

/// The sixteen event kinds emitted by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    BetPlaced,
    BetResolved,
    BetDecision,
    BetResult,
    WinningStreak,
    LosingStreak,
    DrawdownAlert,
    ProfitTargetReached,
    StopLossTriggered,
    SessionStart,
    SessionEnd,
    StrategyToggle,
    StrategySeedChange,
    StrategyParkingBet,
    StrategySwitch,
    CheckpointWritten,
}

/// One event with its full payload, as written to the JSONL log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub session_id: Option<Uuid>,
    pub payload: serde_json::Value,
}

impl Event {
    pub fn new(kind: EventKind, session_id: Option<Uuid>, payload: serde_json::Value) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            session_id,
            payload,
        }
    }
}

/// A consumer of emitted events (log writer, dashboard feed, test probe).
pub trait EventSink: Send {
    fn on_event(&mut self, event: &Event);

    /// Called at session end; buffering sinks must persist here.
    fn flush(&mut self) {}
}

/// Single-writer ring-buffered bus with synchronous fan-out.
pub struct EventBus {
    history: VecDeque<Event>,
    sinks: Vec<Box<dyn EventSink>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            history: VecDeque::with_capacity(256),
            sinks: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    /// Append to history (evicting the oldest past the cap) and deliver to
    /// every sink in subscription order.
    pub fn emit(&mut self, event: Event) {
        if self.history.len() == EVENT_HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(event);
        let event = self.history.back().expect("just pushed");
        for sink in &mut self.sinks {
            sink.on_event(event);
        }
    }

    /// Recent events, optionally filtered by kind, newest last.
    pub fn history(&self, kind: Option<EventKind>, limit: usize) -> Vec<&Event> {
        let iter = self
            .history
            .iter()
            .filter(|e| kind.map_or(true, |k| e.kind == k));
        let matched: Vec<&Event> = iter.collect();
        let start = matched.len().saturating_sub(limit);
        matched[start..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn flush(&mut self) {
        for sink in &mut self.sinks {
            sink.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Probe {
        seen: Arc<Mutex<Vec<EventKind>>>,
    }

    impl EventSink for Probe {
        fn on_event(&mut self, event: &Event) {
            self.seen.lock().unwrap().push(event.kind);
        }
    }

    fn probe() -> (Box<Probe>, Arc<Mutex<Vec<EventKind>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Box::new(Probe { seen: seen.clone() }),
            seen,
        )
    }

    #[test]
    fn test_synchronous_fanout_in_order() {
        let mut bus = EventBus::new();
        let (sink, seen) = probe();
        bus.subscribe(sink);

        bus.emit(Event::new(EventKind::SessionStart, None, serde_json::json!({})));
        bus.emit(Event::new(EventKind::BetDecision, None, serde_json::json!({})));
        bus.emit(Event::new(EventKind::BetResult, None, serde_json::json!({})));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                EventKind::SessionStart,
                EventKind::BetDecision,
                EventKind::BetResult
            ]
        );
    }

    #[test]
    fn test_ring_buffer_eviction() {
        let mut bus = EventBus::new();
        for _ in 0..(EVENT_HISTORY_LIMIT + 10) {
            bus.emit(Event::new(EventKind::BetResult, None, serde_json::json!({})));
        }
        assert_eq!(bus.len(), EVENT_HISTORY_LIMIT);
    }

    #[test]
    fn test_history_filter_and_limit() {
        let mut bus = EventBus::new();
        for i in 0..10 {
            let kind = if i % 2 == 0 {
                EventKind::BetResult
            } else {
                EventKind::BetDecision
            };
            bus.emit(Event::new(kind, None, serde_json::json!({ "i": i })));
        }
        let results = bus.history(Some(EventKind::BetResult), 3);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|e| e.kind == EventKind::BetResult));
        assert_eq!(results[2].payload["i"], 8);
    }

    #[test]
    fn test_event_kind_serializes_screaming() {
        let json = serde_json::to_string(&EventKind::StrategySeedChange).unwrap();
        assert_eq!(json, "\"STRATEGY_SEED_CHANGE\"");
    }
}
