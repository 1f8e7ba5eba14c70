mod common;

use agentperf_telemetry::{CollectorError, CollectorState, MetricsCollector};
use common::{Reading, ScriptedProbe, init_test_logging};
use tracing::info;

fn reading(at_ms: u64, rss_mb: u64, cpu_ms: u64) -> Reading {
    Reading {
        at_ms,
        rss_mb,
        vms_mb: 512,
        cpu_ms,
        gen0: None,
    }
}

#[test]
fn test_full_lifecycle_with_snapshots() {
    init_test_logging();
    info!(test = "test_full_lifecycle_with_snapshots", phase = "setup");

    let probe = ScriptedProbe::new(
        [
            reading(0, 100, 0),
            reading(1000, 110, 500),
            reading(2000, 130, 1500),
            reading(3000, 120, 1500),
        ],
        2,
    );
    let mut collector = MetricsCollector::with_probe(probe);
    assert_eq!(collector.state(), CollectorState::Created);

    info!(test = "test_full_lifecycle_with_snapshots", phase = "execute");
    collector.start().expect("start");
    assert_eq!(collector.state(), CollectorState::Started);

    for ms in [10.0, 20.0, 30.0, 40.0] {
        collector.record_measurement(ms).expect("record");
    }
    assert_eq!(collector.state(), CollectorState::Recording);

    let first = collector.capture_snapshot().expect("snapshot 1").clone();
    let second = collector.capture_snapshot().expect("snapshot 2").clone();
    let summary = collector.finalize().expect("finalize");

    info!(
        test = "test_full_lifecycle_with_snapshots",
        phase = "assert",
        mean = summary.statistics.mean,
        cpu_avg = summary.cpu.average_percent
    );
    // 500ms cpu over 1s on 2 cores, then 1000ms over 1s.
    assert!((first.cpu_percent - 25.0).abs() < 1e-6);
    assert!((second.cpu_percent - 50.0).abs() < 1e-6);
    assert!((first.elapsed_ms - 1000.0).abs() < 1e-6);
    assert!((second.rss_delta_mb - 30.0).abs() < 1e-9);
    assert_eq!(first.thread_count, 4);
    assert!(first.collections.is_none());

    assert_eq!(summary.iteration_count, 4);
    assert!((summary.total_elapsed_ms - 3000.0).abs() < 1e-6);
    assert!((summary.statistics.p90 - 37.0).abs() < 1e-9);
    assert!((summary.memory.rss_delta_mb - 20.0).abs() < 1e-9);
    assert!((summary.memory.peak_rss_mb - 130.0).abs() < 1e-9);
    assert!((summary.cpu.average_percent - 37.5).abs() < 1e-6);
    assert!((summary.cpu.max_percent - 50.0).abs() < 1e-6);
    assert_eq!(summary.snapshots.len(), 2);
    assert_eq!(collector.state(), CollectorState::Finalized);

    info!(test = "test_full_lifecycle_with_snapshots", phase = "complete", status = "passed");
}

#[test]
fn test_start_twice_is_invalid_state() {
    init_test_logging();
    info!(test = "test_start_twice_is_invalid_state", phase = "execute");

    let mut collector =
        MetricsCollector::with_probe(ScriptedProbe::new([reading(0, 1, 0), reading(5, 1, 0)], 1));
    collector.start().expect("first start");
    let err = collector.start().expect_err("second start must fail");

    assert!(matches!(
        err,
        CollectorError::InvalidState {
            operation: "start",
            state: CollectorState::Started
        }
    ));

    info!(test = "test_start_twice_is_invalid_state", phase = "complete", status = "passed");
}

#[test]
fn test_record_before_start_is_invalid_state() {
    init_test_logging();
    info!(test = "test_record_before_start_is_invalid_state", phase = "execute");

    let mut collector = MetricsCollector::with_probe(ScriptedProbe::new([], 1));
    assert!(matches!(
        collector.record_measurement(1.0),
        Err(CollectorError::InvalidState {
            state: CollectorState::Created,
            ..
        })
    ));
    assert!(matches!(
        collector.capture_snapshot(),
        Err(CollectorError::InvalidState { .. })
    ));
    assert!(matches!(
        collector.finalize(),
        Err(CollectorError::InvalidState { .. })
    ));

    info!(test = "test_record_before_start_is_invalid_state", phase = "complete", status = "passed");
}

#[test]
fn test_finalize_twice_and_record_after_finalize_fail() {
    init_test_logging();
    info!(test = "test_finalize_twice_and_record_after_finalize_fail", phase = "execute");

    let mut collector =
        MetricsCollector::with_probe(ScriptedProbe::new([reading(0, 1, 0), reading(10, 1, 0)], 1));
    collector.start().expect("start");
    collector.record_measurement(5.0).expect("record");
    collector.finalize().expect("first finalize");

    assert!(matches!(
        collector.finalize(),
        Err(CollectorError::InvalidState {
            operation: "finalize",
            state: CollectorState::Finalized
        })
    ));
    assert!(matches!(
        collector.record_measurement(1.0),
        Err(CollectorError::InvalidState {
            state: CollectorState::Finalized,
            ..
        })
    ));

    info!(test = "test_finalize_twice_and_record_after_finalize_fail", phase = "complete", status = "passed");
}

#[test]
fn test_finalize_without_measurements_or_snapshots() {
    init_test_logging();
    info!(test = "test_finalize_without_measurements_or_snapshots", phase = "execute");

    let mut collector =
        MetricsCollector::with_probe(ScriptedProbe::new([reading(0, 64, 0), reading(250, 64, 0)], 1));
    collector.start().expect("start");
    let summary = collector.finalize().expect("finalize from Started");

    assert_eq!(summary.iteration_count, 0);
    assert!(summary.statistics.is_empty());
    assert_eq!(summary.statistics.mean, 0.0);
    assert!(summary.snapshots.is_empty());
    assert_eq!(summary.cpu.average_percent, 0.0);

    info!(test = "test_finalize_without_measurements_or_snapshots", phase = "complete", status = "passed");
}

#[test]
fn test_finalize_survives_probe_failure() {
    init_test_logging();
    info!(test = "test_finalize_survives_probe_failure", phase = "execute");

    // Script holds only the baseline; the final read fails.
    let mut collector = MetricsCollector::with_probe(ScriptedProbe::new([reading(0, 64, 0)], 1));
    collector.start().expect("start");
    collector.record_measurement(12.0).expect("record");
    let summary = collector.finalize().expect("finalize tolerates probe failure");

    assert_eq!(summary.iteration_count, 1);
    assert_eq!(summary.statistics.median, 12.0);
    assert_eq!(summary.memory.rss_delta_mb, 0.0);

    info!(test = "test_finalize_survives_probe_failure", phase = "complete", status = "passed");
}

#[test]
fn test_collection_deltas_when_probe_reports_them() {
    init_test_logging();
    info!(test = "test_collection_deltas_when_probe_reports_them", phase = "execute");

    let probe = ScriptedProbe::new(
        [
            Reading { gen0: Some(3), ..reading(0, 10, 0) },
            Reading { gen0: Some(7), ..reading(100, 10, 0) },
            Reading { gen0: Some(12), ..reading(200, 10, 0) },
        ],
        1,
    );
    let mut collector = MetricsCollector::with_probe(probe);
    collector.start().expect("start");
    let snap = collector.capture_snapshot().expect("snapshot").clone();
    let summary = collector.finalize().expect("finalize");

    assert_eq!(snap.collections.map(|c| c.gen0), Some(4));
    assert_eq!(summary.collections.map(|c| c.gen0), Some(9));

    info!(test = "test_collection_deltas_when_probe_reports_them", phase = "complete", status = "passed");
}
