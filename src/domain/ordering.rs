//! Stable event ordering for deterministic processing.

use crate::domain::RawEvent;

/// Stable ordering key for raw events.
///
/// Ordering: ledger close time -> event_key. Same-ledger events have no
/// intrinsic order on chain; the key makes the tie deterministic so every
/// recomputation folds them identically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct EventOrderingKey {
    pub time_ms: i64,
    pub event_key: String,
}

impl EventOrderingKey {
    pub fn from_event(event: &RawEvent) -> Self {
        EventOrderingKey {
            time_ms: event.ledger_closed_at.as_ms(),
            event_key: event.event_key().to_string(),
        }
    }
}

/// Sort events deterministically, oldest first.
pub fn sort_events_deterministic(events: &mut [RawEvent]) {
    events.sort_by(|a, b| EventOrderingKey::from_event(a).cmp(&EventOrderingKey::from_event(b)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActionType, AssetId, PoolId, Symbol, TimeMs};

    fn event(time_ms: i64, tx_hash: &str) -> RawEvent {
        RawEvent::new(
            PoolId::new("pool-1"),
            "Prime Pool",
            AssetId::new("CUSDC"),
            Symbol::new("USDC"),
            Some(7),
            ActionType::Supply,
            Some(10_000_000),
            None,
            None,
            TimeMs::new(time_ms),
            Some(tx_hash.to_string()),
        )
    }

    #[test]
    fn test_sort_by_time_then_key() {
        let mut events = vec![event(2000, "cc"), event(1000, "bb"), event(1000, "aa")];
        sort_events_deterministic(&mut events);

        assert_eq!(events[0].ledger_closed_at, TimeMs::new(1000));
        assert_eq!(events[0].event_key, "aa");
        assert_eq!(events[1].event_key, "bb");
        assert_eq!(events[2].event_key, "cc");
    }

    #[test]
    fn test_sort_is_stable_across_runs() {
        let mut a = vec![event(1000, "bb"), event(1000, "aa"), event(500, "zz")];
        let mut b = vec![event(500, "zz"), event(1000, "aa"), event(1000, "bb")];
        sort_events_deterministic(&mut a);
        sort_events_deterministic(&mut b);
        assert_eq!(a, b);
    }
}
