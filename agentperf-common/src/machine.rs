//! Machine descriptor embedded in metrics artifacts.
//!
//! Producers in different runtimes fill different subsets of these fields,
//! so every field is optional and absent fields are omitted on write.

use serde::{Deserialize, Serialize};

/// Host the run executed on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineInfo {
    #[serde(rename = "OSSystem", default, skip_serializing_if = "Option::is_none")]
    pub os_system: Option<String>,
    #[serde(rename = "OSRelease", default, skip_serializing_if = "Option::is_none")]
    pub os_release: Option<String>,
    #[serde(rename = "OSVersion", default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    #[serde(rename = "Architecture", default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    /// Physical cores.
    #[serde(rename = "ProcessorCount", default, skip_serializing_if = "Option::is_none")]
    pub processor_count: Option<u32>,
    #[serde(
        rename = "LogicalProcessorCount",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub logical_processor_count: Option<u32>,
    #[serde(rename = "CPUModel", default, skip_serializing_if = "Option::is_none")]
    pub cpu_model: Option<String>,
    #[serde(rename = "CPUMaxFreqGHz", default, skip_serializing_if = "Option::is_none")]
    pub cpu_max_freq_ghz: Option<f64>,
    #[serde(rename = "TotalMemoryGB", default, skip_serializing_if = "Option::is_none")]
    pub total_memory_gb: Option<f64>,
    #[serde(rename = "AvailableMemoryGB", default, skip_serializing_if = "Option::is_none")]
    pub available_memory_gb: Option<f64>,
    #[serde(rename = "TotalSwapGB", default, skip_serializing_if = "Option::is_none")]
    pub total_swap_gb: Option<f64>,
    #[serde(rename = "GPUModel", default, skip_serializing_if = "Option::is_none")]
    pub gpu_model: Option<String>,
    /// Free-form, e.g. "8192 MiB", as reported by the GPU tooling.
    #[serde(rename = "GPUMemoryMB", default, skip_serializing_if = "Option::is_none")]
    pub gpu_memory: Option<String>,
    #[serde(
        rename = "RuntimeVersion",
        alias = "PythonVersion",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub runtime_version: Option<String>,
}

impl MachineInfo {
    /// "Linux 6.8.0" style label, or `None` when the OS name is unknown.
    pub fn os_label(&self) -> Option<String> {
        let system = self.os_system.as_deref()?;
        Some(match self.os_release.as_deref() {
            Some(release) if !release.is_empty() => format!("{system} {release}"),
            _ => system.to_string(),
        })
    }
}
