mod common;

use agentperf_telemetry::collect::cpu::CpuInfo;
use agentperf_telemetry::collect::memory::SystemMemory;
use agentperf_telemetry::collect::process::{ProcessCpuTime, ProcessStatus};
use common::{fixture, init_test_logging};
use std::time::Duration;
use tracing::info;

#[test]
fn test_parse_status_fixture() {
    init_test_logging();
    info!(test = "test_parse_status_fixture", phase = "setup");

    let status = ProcessStatus::parse(fixture("proc_self_status.txt")).expect("status parse");

    info!(
        test = "test_parse_status_fixture",
        phase = "assert",
        rss_kb = status.vm_rss_kb,
        threads = status.threads
    );
    assert_eq!(status.vm_rss_kb, 40960);
    assert_eq!(status.vm_size_kb, 233472);
    assert_eq!(status.vm_hwm_kb, Some(51200));
    assert_eq!(status.vm_peak_kb, Some(245760));
    assert_eq!(status.threads, 6);

    info!(test = "test_parse_status_fixture", phase = "complete", status = "passed");
}

#[test]
fn test_parse_stat_fixture() {
    init_test_logging();
    info!(test = "test_parse_stat_fixture", phase = "setup");

    let cpu = ProcessCpuTime::parse(fixture("proc_self_stat.txt")).expect("stat parse");

    info!(
        test = "test_parse_stat_fixture",
        phase = "assert",
        utime = cpu.utime_ticks,
        stime = cpu.stime_ticks
    );
    assert_eq!(cpu.utime_ticks, 1234);
    assert_eq!(cpu.stime_ticks, 567);
    assert_eq!(cpu.as_duration(), Duration::from_millis(18_010));

    info!(test = "test_parse_stat_fixture", phase = "complete", status = "passed");
}

#[test]
fn test_parse_meminfo_fixture() {
    init_test_logging();
    info!(test = "test_parse_meminfo_fixture", phase = "setup");

    let mem = SystemMemory::parse(fixture("proc_meminfo_sample.txt")).expect("meminfo parse");

    info!(
        test = "test_parse_meminfo_fixture",
        phase = "assert",
        total_kb = mem.total_kb,
        available_kb = mem.available_kb
    );
    assert_eq!(mem.total_kb, 16384000);
    assert_eq!(mem.available_kb, 10240000);
    assert_eq!(mem.swap_total_gb(), 4.0);

    info!(test = "test_parse_meminfo_fixture", phase = "complete", status = "passed");
}

#[test]
fn test_parse_cpuinfo_fixture() {
    init_test_logging();
    info!(test = "test_parse_cpuinfo_fixture", phase = "setup");

    let cpu = CpuInfo::parse(fixture("proc_cpuinfo_sample.txt")).expect("cpuinfo parse");

    info!(
        test = "test_parse_cpuinfo_fixture",
        phase = "assert",
        logical = cpu.logical_cpus,
        physical = cpu.physical_cores
    );
    assert_eq!(cpu.logical_cpus, 4);
    assert_eq!(cpu.physical_cores, 2);
    assert_eq!(cpu.max_mhz, Some(4700.0));
    assert_eq!(
        cpu.model_name.as_deref(),
        Some("Intel(R) Core(TM) i7-10700 CPU @ 2.90GHz")
    );

    info!(test = "test_parse_cpuinfo_fixture", phase = "complete", status = "passed");
}

#[cfg(target_os = "linux")]
#[test]
fn test_live_proc_self_reads() {
    init_test_logging();
    info!(test = "test_live_proc_self_reads", phase = "execute");

    let status = ProcessStatus::read_from_proc().expect("live status");
    let _cpu = ProcessCpuTime::read_from_proc().expect("live stat");
    assert!(status.vm_rss_kb > 0);
    assert!(status.threads >= 1);

    info!(test = "test_live_proc_self_reads", phase = "complete", status = "passed");
}
