//! Host descriptor detection for artifact `MachineInfo`.

use crate::collect::cpu::{self, CpuInfo};
use crate::collect::memory::SystemMemory;
use agentperf_common::MachineInfo;
use std::process::Command;
use tracing::debug;

/// Describe the current host. Anything that cannot be read stays `None`.
pub fn detect_machine_info() -> MachineInfo {
    let cpu = CpuInfo::read_from_proc()
        .inspect_err(|e| debug!(error = %e, "cpuinfo unavailable"))
        .ok();
    let memory = SystemMemory::read_from_proc()
        .inspect_err(|e| debug!(error = %e, "meminfo unavailable"))
        .ok();
    let gpu = query_nvidia_smi();

    let logical = std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .ok()
        .or_else(|| cpu.as_ref().map(|c| c.logical_cpus));

    let cpu_max_freq_ghz = cpu::read_max_frequency_ghz()
        .or_else(|| cpu.as_ref().and_then(|c| c.max_mhz).map(|mhz| mhz / 1000.0))
        .map(round2);

    MachineInfo {
        os_system: Some(os_name().to_string()),
        os_release: read_trimmed("/proc/sys/kernel/osrelease"),
        os_version: read_trimmed("/proc/sys/kernel/version"),
        architecture: Some(std::env::consts::ARCH.to_string()),
        processor_count: cpu.as_ref().map(|c| c.physical_cores),
        logical_processor_count: logical,
        cpu_model: cpu.and_then(|c| c.model_name),
        cpu_max_freq_ghz,
        total_memory_gb: memory.map(|m| round2(m.total_gb())),
        available_memory_gb: memory.map(|m| round2(m.available_gb())),
        total_swap_gb: memory.map(|m| round2(m.swap_total_gb())),
        gpu_model: gpu.as_ref().map(|(name, _)| name.clone()),
        gpu_memory: gpu.map(|(_, mem)| mem),
        runtime_version: None,
    }
}

fn os_name() -> &'static str {
    match std::env::consts::OS {
        "linux" => "Linux",
        "macos" => "Darwin",
        "windows" => "Windows",
        other => other,
    }
}

fn read_trimmed(path: &str) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn query_nvidia_smi() -> Option<(String, String)> {
    let output = Command::new("nvidia-smi")
        .args(["--query-gpu=name,memory.total", "--format=csv,noheader"])
        .output()
        .ok()?;
    if !output.status.success() {
        debug!(status = %output.status, "nvidia-smi exited unsuccessfully");
        return None;
    }
    parse_nvidia_smi(&String::from_utf8_lossy(&output.stdout))
}

/// First GPU from `name, memory.total` CSV output.
pub fn parse_nvidia_smi(output: &str) -> Option<(String, String)> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty())?;
    let (name, memory) = line.split_once(',')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), memory.trim().to_string()))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
