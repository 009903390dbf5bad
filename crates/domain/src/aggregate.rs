//! Core aggregate and domain event traits.

use common::AggregateId;
use event_store::Version;
use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events are facts that already happened. They are immutable and
/// named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name used for storage and filtering.
    fn event_type(&self) -> &'static str;
}

/// Trait for event-sourced aggregates.
///
/// An aggregate is rebuilt by replaying its events in order. `apply` must be
/// pure and deterministic, and it must not fail: events are facts, so an
/// event that no longer makes sense for the current state is ignored rather
/// than rejected.
pub trait Aggregate: Default + Send + Sync + Sized {
    /// The type of events this aggregate consumes.
    type Event: DomainEvent;

    /// Returns the aggregate type name.
    fn aggregate_type() -> &'static str;

    /// Returns the aggregate's identifier, or None before its first event.
    fn id(&self) -> Option<&AggregateId>;

    /// Returns the version of the last applied event.
    fn version(&self) -> Version;

    /// Sets the aggregate version after events were persisted or loaded.
    fn set_version(&mut self, version: Version);

    /// Applies an event to the aggregate.
    fn apply(&mut self, event: Self::Event);

    /// Applies multiple events in sequence.
    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}

/// Aggregates whose state is checkpointed to the store.
pub trait SnapshotCapable: Aggregate + Serialize + DeserializeOwned {
    /// Returns true if a checkpoint should be written after `event`.
    fn should_snapshot(&self, event: &Self::Event) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum CounterEvent {
        Opened { id: String },
        Incremented,
    }

    impl DomainEvent for CounterEvent {
        fn event_type(&self) -> &'static str {
            match self {
                CounterEvent::Opened { .. } => "Opened",
                CounterEvent::Incremented => "Incremented",
            }
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Counter {
        id: Option<AggregateId>,
        count: u32,
        version: Version,
    }

    impl Aggregate for Counter {
        type Event = CounterEvent;

        fn aggregate_type() -> &'static str {
            "Counter"
        }

        fn id(&self) -> Option<&AggregateId> {
            self.id.as_ref()
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                CounterEvent::Opened { id } => self.id = Some(AggregateId::new(id)),
                CounterEvent::Incremented => self.count += 1,
            }
        }
    }

    impl SnapshotCapable for Counter {
        fn should_snapshot(&self, event: &CounterEvent) -> bool {
            matches!(event, CounterEvent::Opened { .. })
        }
    }

    #[test]
    fn apply_events_in_sequence() {
        let mut counter = Counter::default();
        counter.apply_events(vec![
            CounterEvent::Opened {
                id: "c-1".to_string(),
            },
            CounterEvent::Incremented,
            CounterEvent::Incremented,
        ]);

        assert_eq!(counter.id().map(AggregateId::as_str), Some("c-1"));
        assert_eq!(counter.count, 2);
    }

    #[test]
    fn snapshot_policy_is_per_event() {
        let counter = Counter::default();
        assert!(counter.should_snapshot(&CounterEvent::Opened {
            id: "c-1".to_string()
        }));
        assert!(!counter.should_snapshot(&CounterEvent::Incremented));
        assert_eq!(CounterEvent::Incremented.event_type(), "Incremented");
    }
}
