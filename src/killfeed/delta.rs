// Watermark-based deduplication of fetched kill events.

use crate::upstream::KillEvent;

/// Result of comparing one fetch against the current watermark.
#[derive(Debug, Clone, PartialEq)]
pub struct KillDelta {
    /// Events strictly newer than the previous watermark, oldest first.
    /// Events with equal timestamps keep their response order.
    pub new_events: Vec<KillEvent>,
    /// Watermark to use from now on. Never lower than the previous one.
    pub watermark: i64,
}

/// Split `fetched` into the events not seen yet and the next watermark.
///
/// The next watermark is the maximum timestamp over *all* fetched events
/// (not only the new ones), clamped so it never moves backwards when the
/// upstream window drops older events.
pub fn compute_delta(fetched: Vec<KillEvent>, watermark: i64) -> KillDelta {
    let next = fetched
        .iter()
        .map(|e| e.timestamp)
        .max()
        .map_or(watermark, |max| max.max(watermark));

    let mut new_events: Vec<KillEvent> = fetched
        .into_iter()
        .filter(|e| e.timestamp > watermark)
        .collect();
    // sort_by_key is stable
    new_events.sort_by_key(|e| e.timestamp);

    KillDelta {
        new_events,
        watermark: next,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kill(killer: &str, timestamp: i64) -> KillEvent {
        KillEvent {
            killer: killer.into(),
            victim: "B".into(),
            weapon: "sword".into(),
            distance: 3.0,
            timestamp,
        }
    }

    fn killers(delta: &KillDelta) -> Vec<&str> {
        delta.new_events.iter().map(|e| e.killer.as_str()).collect()
    }

    #[test]
    fn test_two_poll_scenario() {
        let first = compute_delta(vec![kill("A", 100)], 50);
        assert_eq!(killers(&first), vec!["A"]);
        assert_eq!(first.watermark, 100);

        let second = compute_delta(vec![kill("A", 100), kill("C", 150)], first.watermark);
        assert_eq!(killers(&second), vec!["C"]);
        assert_eq!(second.watermark, 150);
    }

    #[test]
    fn test_empty_fetch_keeps_watermark() {
        let delta = compute_delta(vec![], 500);
        assert!(delta.new_events.is_empty());
        assert_eq!(delta.watermark, 500);
    }

    #[test]
    fn test_older_window_never_lowers_watermark() {
        let delta = compute_delta(vec![kill("A", 10), kill("B", 20)], 300);
        assert!(delta.new_events.is_empty());
        assert_eq!(delta.watermark, 300);
    }

    #[test]
    fn test_new_events_sorted_ascending_with_stable_ties() {
        let fetched = vec![
            kill("late", 300),
            kill("tie-first", 200),
            kill("old", 90),
            kill("tie-second", 200),
            kill("early", 150),
        ];
        let delta = compute_delta(fetched, 100);
        assert_eq!(
            killers(&delta),
            vec!["early", "tie-first", "tie-second", "late"]
        );
        assert_eq!(delta.watermark, 300);
    }

    #[test]
    fn test_event_at_watermark_is_dropped() {
        let delta = compute_delta(vec![kill("same", 100), kill("next", 101)], 100);
        assert_eq!(killers(&delta), vec!["next"]);
    }

    #[test]
    fn test_delta_matches_filter_for_any_watermark() {
        let fetched: Vec<KillEvent> = [5, 1, 9, 3, 9, 7]
            .iter()
            .enumerate()
            .map(|(i, ts)| kill(&format!("k{i}"), *ts))
            .collect();

        for w in 0..=10 {
            let delta = compute_delta(fetched.clone(), w);
            let mut expected: Vec<&KillEvent> =
                fetched.iter().filter(|e| e.timestamp > w).collect();
            expected.sort_by_key(|e| e.timestamp);
            let got: Vec<&KillEvent> = delta.new_events.iter().collect();
            assert_eq!(got, expected, "watermark {w}");
            assert!(delta.watermark >= w);
            assert_eq!(delta.watermark, w.max(9));
        }
    }
}
