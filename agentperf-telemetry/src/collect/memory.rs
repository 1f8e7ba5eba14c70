//! System memory totals from /proc/meminfo.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("failed to read /proc/meminfo: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("failed to parse /proc/meminfo: missing required field '{0}'")]
    MissingField(String),
}

/// Values in kB as reported by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemMemory {
    pub total_kb: u64,
    pub available_kb: u64,
    pub swap_total_kb: u64,
}

impl SystemMemory {
    pub fn read_from_proc() -> Result<Self, MemoryError> {
        let content = std::fs::read_to_string("/proc/meminfo")?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, MemoryError> {
        let mut map: HashMap<&str, u64> = HashMap::new();
        for line in content.lines() {
            if let Some((key, value)) = line.split_once(':') {
                let value = value.trim().trim_end_matches(" kB").trim();
                if let Ok(kb) = value.parse::<u64>() {
                    map.insert(key, kb);
                }
            }
        }

        let total_kb = *map
            .get("MemTotal")
            .ok_or_else(|| MemoryError::MissingField("MemTotal".to_string()))?;

        // Kernels before 3.14 lack MemAvailable.
        let available_kb = match map.get("MemAvailable") {
            Some(kb) => *kb,
            None => {
                let free = map.get("MemFree").copied().unwrap_or(0);
                let buffers = map.get("Buffers").copied().unwrap_or(0);
                let cached = map.get("Cached").copied().unwrap_or(0);
                debug!(free, buffers, cached, "MemAvailable missing, estimating");
                free + buffers + cached
            }
        };

        Ok(Self {
            total_kb,
            available_kb,
            swap_total_kb: map.get("SwapTotal").copied().unwrap_or(0),
        })
    }

    pub fn total_gb(&self) -> f64 {
        kb_to_gb(self.total_kb)
    }

    pub fn available_gb(&self) -> f64 {
        kb_to_gb(self.available_kb)
    }

    pub fn swap_total_gb(&self) -> f64 {
        kb_to_gb(self.swap_total_kb)
    }

    pub fn available_bytes(&self) -> u64 {
        self.available_kb.saturating_mul(1024)
    }
}

fn kb_to_gb(kb: u64) -> f64 {
    kb as f64 / 1_048_576.0
}
