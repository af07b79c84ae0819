//! Adaptive downsampling for chart rendering.
//!
//! Plotting hundreds of thousands of points is useless and slow, so
//! sequences above the cap are thinned with a uniform stride. Critical
//! events (full collections and pauses over the significance
//! threshold) are always retained, which is why the output may exceed
//! the nominal cap: the diagnostically interesting points are exactly
//! the ones a uniform stride would drop.

use crate::parser::schema::GcEvent;
use crate::utils::config::{CRITICAL_PAUSE_MS, DEFAULT_MAX_SAMPLE_POINTS};
use log::debug;

/// Thin an event sequence for display with [`DEFAULT_MAX_SAMPLE_POINTS`]
/// and the default criticality threshold
pub fn sample_for_display(events: &[GcEvent]) -> Vec<GcEvent> {
    sample(events, DEFAULT_MAX_SAMPLE_POINTS, CRITICAL_PAUSE_MS)
}

/// Thin `events` to roughly `max_points`, keeping every critical event.
///
/// Sequences at or under the cap are returned whole. Relative order is
/// always preserved; the result is a subsequence of the input.
pub fn sample(events: &[GcEvent], max_points: usize, critical_pause_ms: f64) -> Vec<GcEvent> {
    if max_points == 0 || events.len() <= max_points {
        return events.to_vec();
    }

    let stride = events.len().div_ceil(max_points);
    let sampled: Vec<GcEvent> = events
        .iter()
        .enumerate()
        .filter(|(i, event)| i % stride == 0 || event.is_critical(critical_pause_ms))
        .map(|(_, event)| event.clone())
        .collect();

    debug!(
        "sampled {} of {} events (stride {})",
        sampled.len(),
        events.len(),
        stride
    );
    sampled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::schema::{EventKind, GcEvent};

    fn events_of(pauses: &[(EventKind, f64)]) -> Vec<GcEvent> {
        pauses
            .iter()
            .enumerate()
            .map(|(i, &(kind, pause_ms))| {
                let mut e = GcEvent::new(i as u64, kind);
                e.pause_ms = pause_ms;
                e
            })
            .collect()
    }

    #[test]
    fn test_under_cap_returns_everything() {
        let events = events_of(&[(EventKind::Young, 5.0); 100]);
        let sampled = sample(&events, 100, 100.0);
        assert_eq!(sampled.len(), 100);
    }

    #[test]
    fn test_over_cap_thins_to_roughly_max() {
        let events = events_of(&[(EventKind::Young, 5.0); 10_000]);
        let sampled = sample(&events, 1_000, 100.0);
        assert!(sampled.len() <= 1_000);
        assert!(!sampled.is_empty());
    }

    #[test]
    fn test_critical_events_always_kept() {
        let mut pauses: Vec<(EventKind, f64)> = vec![(EventKind::Young, 5.0); 10_000];
        pauses[4_321] = (EventKind::Full, 800.0);
        pauses[7_777] = (EventKind::Young, 250.0);
        let events = events_of(&pauses);

        let sampled = sample(&events, 100, 100.0);
        assert!(sampled.iter().any(|e| e.sequence_index == 4_321));
        assert!(sampled.iter().any(|e| e.sequence_index == 7_777));
    }

    #[test]
    fn test_order_preserved() {
        let events = events_of(&[(EventKind::Young, 5.0); 5_000]);
        let sampled = sample(&events, 200, 100.0);
        for pair in sampled.windows(2) {
            assert!(pair[0].sequence_index < pair[1].sequence_index);
        }
    }

    #[test]
    fn test_all_critical_overrides_cap() {
        // every event critical: nothing may be dropped
        let events = events_of(&[(EventKind::Full, 500.0); 500]);
        let sampled = sample(&events, 50, 100.0);
        assert_eq!(sampled.len(), 500);
    }
}
