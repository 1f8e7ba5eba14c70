//! CPU description from /proc/cpuinfo and process CPU utilization math.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum CpuError {
    #[error("failed to read /proc/cpuinfo: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("no processor entries in /proc/cpuinfo")]
    Empty,
}

/// Processor topology summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuInfo {
    pub model_name: Option<String>,
    /// Distinct (physical id, core id) pairs; falls back to the logical
    /// count when the kernel omits topology fields.
    pub physical_cores: u32,
    pub logical_cpus: u32,
    /// Highest `cpu MHz` seen, used only when cpufreq is unavailable.
    pub max_mhz: Option<f64>,
}

impl CpuInfo {
    pub fn read_from_proc() -> Result<Self, CpuError> {
        let content = std::fs::read_to_string("/proc/cpuinfo")?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, CpuError> {
        let mut logical = 0u32;
        let mut model_name = None;
        let mut max_mhz: Option<f64> = None;
        let mut cores: HashSet<(String, String)> = HashSet::new();
        let mut physical_id = String::new();

        for line in content.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "processor" => logical += 1,
                "model name" if model_name.is_none() => model_name = Some(value.to_string()),
                "cpu MHz" => {
                    if let Ok(mhz) = value.parse::<f64>() {
                        max_mhz = Some(max_mhz.map_or(mhz, |m| m.max(mhz)));
                    }
                }
                "physical id" => physical_id = value.to_string(),
                "core id" => {
                    cores.insert((physical_id.clone(), value.to_string()));
                }
                _ => {}
            }
        }

        if logical == 0 {
            return Err(CpuError::Empty);
        }

        let physical_cores = if cores.is_empty() {
            logical
        } else {
            cores.len() as u32
        };
        debug!(logical, physical_cores, ?model_name, "parsed cpuinfo");

        Ok(Self {
            model_name,
            physical_cores,
            logical_cpus: logical,
            max_mhz,
        })
    }
}

/// Read `cpuinfo_max_freq` (kHz) for cpu0 and convert to GHz.
pub fn read_max_frequency_ghz() -> Option<f64> {
    let raw =
        std::fs::read_to_string("/sys/devices/system/cpu/cpu0/cpufreq/cpuinfo_max_freq").ok()?;
    parse_khz_to_ghz(&raw)
}

pub fn parse_khz_to_ghz(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|khz| *khz > 0.0)
        .map(|khz| khz / 1_000_000.0)
}

/// Process CPU utilization over an interval, normalized by logical cores.
///
/// Returns 0.0 when the wall interval is empty or the cpu counter went
/// backwards.
pub fn process_cpu_percent(cpu_delta: Duration, wall_delta: Duration, logical_cores: u32) -> f64 {
    let wall = wall_delta.as_secs_f64();
    if wall <= 0.0 {
        return 0.0;
    }
    let cores = f64::from(logical_cores.max(1));
    (cpu_delta.as_secs_f64() / wall / cores * 100.0).max(0.0)
}
