use gclens::aggregator::aggregate;
use gclens::diff::{compare, Verdict};
use gclens::parser::schema::{EventKind, GcEvent};

fn summary_with_pauses(pauses: &[f64]) -> gclens::MetricsSummary {
    let events: Vec<GcEvent> = pauses
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            let mut e = GcEvent::new(i as u64, EventKind::Young);
            e.pause_ms = p;
            e.runtime_secs = Some(10.0 * i as f64);
            e
        })
        .collect();
    aggregate(&events)
}

#[test]
fn test_self_comparison_is_unchanged() {
    let summary = summary_with_pauses(&[12.0, 34.0, 56.0, 78.0]);
    let result = compare(&summary, &summary.clone());
    assert_eq!(result.overall, Verdict::Unchanged);
    for metric in &result.metrics {
        assert_eq!(metric.verdict, Verdict::Unchanged, "{} changed", metric.name);
        assert_eq!(metric.absolute_change, 0.0);
    }
}

#[test]
fn test_tuning_win_reads_as_improvement() {
    let baseline = summary_with_pauses(&[80.0, 90.0, 100.0, 110.0]);
    let candidate = summary_with_pauses(&[20.0, 25.0, 30.0, 35.0]);

    let result = compare(&baseline, &candidate);
    assert_eq!(result.overall, Verdict::Improved);
    assert!(result
        .metrics
        .iter()
        .filter(|m| m.name.ends_with("pause_ms"))
        .all(|m| m.verdict == Verdict::Improved));
}

#[test]
fn test_single_regressed_metric_dominates_overall() {
    let baseline = summary_with_pauses(&[50.0, 50.0, 50.0]);
    let mut candidate = baseline.clone();
    candidate.max_pause_ms = 500.0;

    let result = compare(&baseline, &candidate);
    assert_eq!(result.overall, Verdict::Regressed);
    let max = result
        .metrics
        .iter()
        .find(|m| m.name == "max_pause_ms")
        .unwrap();
    assert_eq!(max.verdict, Verdict::Regressed);
    assert_eq!(max.absolute_change, 450.0);
}

#[test]
fn test_jitter_within_noise_band_is_unchanged() {
    let baseline = summary_with_pauses(&[100.0, 100.0, 100.0]);
    let mut candidate = baseline.clone();
    // every pause metric moves by 1%, inside the noise band
    candidate.mean_pause_ms *= 1.01;
    candidate.max_pause_ms *= 1.01;
    candidate.total_pause_ms *= 1.01;
    candidate.percentiles.p99 *= 1.01;

    let result = compare(&baseline, &candidate);
    assert_eq!(result.overall, Verdict::Unchanged);
}

#[test]
fn test_report_names_are_stable() {
    let summary = summary_with_pauses(&[10.0, 20.0]);
    let result = compare(&summary, &summary.clone());
    let names: Vec<_> = result.metrics.iter().map(|m| m.name).collect();
    assert!(names.contains(&"throughput_pct"));
    assert!(names.contains(&"mean_pause_ms"));
    assert!(names.contains(&"p99_pause_ms"));
    assert!(names.contains(&"gc_frequency_hz"));
}
