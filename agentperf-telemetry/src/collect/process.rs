//! Per-process counters from /proc/self/status and /proc/self/stat.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Kernel clock ticks per second for `utime`/`stime` (USER_HZ).
pub const CLOCK_TICKS_PER_SEC: u64 = 100;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("malformed stat line: {0}")]
    MalformedStat(String),
}

/// Memory and thread counters from /proc/self/status, in kB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessStatus {
    pub vm_rss_kb: u64,
    pub vm_size_kb: u64,
    /// High-water mark for RSS, when the kernel reports it.
    pub vm_hwm_kb: Option<u64>,
    pub vm_peak_kb: Option<u64>,
    pub threads: u32,
}

impl ProcessStatus {
    pub fn read_from_proc() -> Result<Self, ProcessError> {
        let content =
            std::fs::read_to_string("/proc/self/status").map_err(|source| ProcessError::Read {
                path: "/proc/self/status",
                source,
            })?;
        Self::parse(&content)
    }

    /// Parse /proc/[pid]/status content.
    ///
    /// Lines look like `VmRSS:\t  123456 kB` and `Threads:\t4`.
    pub fn parse(content: &str) -> Result<Self, ProcessError> {
        let map: HashMap<&str, u64> = content
            .lines()
            .filter_map(|line| {
                let (key, value) = line.split_once(':')?;
                let value = value.trim().trim_end_matches("kB").trim();
                value.parse::<u64>().ok().map(|n| (key.trim(), n))
            })
            .collect();

        let vm_rss_kb = *map
            .get("VmRSS")
            .ok_or(ProcessError::MissingField("VmRSS"))?;
        let vm_size_kb = *map
            .get("VmSize")
            .ok_or(ProcessError::MissingField("VmSize"))?;
        let threads = map
            .get("Threads")
            .copied()
            .and_then(|t| u32::try_from(t).ok())
            .unwrap_or(1);

        Ok(Self {
            vm_rss_kb,
            vm_size_kb,
            vm_hwm_kb: map.get("VmHWM").copied(),
            vm_peak_kb: map.get("VmPeak").copied(),
            threads,
        })
    }
}

/// CPU time consumed by the process, in clock ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessCpuTime {
    pub utime_ticks: u64,
    pub stime_ticks: u64,
}

impl ProcessCpuTime {
    pub fn read_from_proc() -> Result<Self, ProcessError> {
        let content =
            std::fs::read_to_string("/proc/self/stat").map_err(|source| ProcessError::Read {
                path: "/proc/self/stat",
                source,
            })?;
        Self::parse(&content)
    }

    /// Parse /proc/[pid]/stat content.
    ///
    /// The command name sits in parentheses and may itself contain spaces or
    /// parentheses, so fields are counted from the last `)`.
    pub fn parse(content: &str) -> Result<Self, ProcessError> {
        let (_, rest) = content
            .rsplit_once(')')
            .ok_or_else(|| ProcessError::MalformedStat("no command terminator".to_string()))?;
        let fields: Vec<&str> = rest.split_whitespace().collect();

        // rest starts at field 3 (state); utime and stime are fields 14 and 15.
        let field = |idx: usize, name: &str| -> Result<u64, ProcessError> {
            fields
                .get(idx)
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| ProcessError::MalformedStat(format!("bad or missing {name}")))
        };

        let cpu = Self {
            utime_ticks: field(11, "utime")?,
            stime_ticks: field(12, "stime")?,
        };
        debug!(
            utime_ticks = cpu.utime_ticks,
            stime_ticks = cpu.stime_ticks,
            "parsed process cpu time"
        );
        Ok(cpu)
    }

    pub fn total_ticks(&self) -> u64 {
        self.utime_ticks.saturating_add(self.stime_ticks)
    }

    pub fn as_duration(&self) -> Duration {
        let ticks = self.total_ticks();
        let secs = ticks / CLOCK_TICKS_PER_SEC;
        let rem = ticks % CLOCK_TICKS_PER_SEC;
        Duration::from_secs(secs) + Duration::from_nanos(rem * 1_000_000_000 / CLOCK_TICKS_PER_SEC)
    }
}
