use std::path::Path;

use serde::{Deserialize, Serialize};
use sysinfo::{Disks, System, MINIMUM_CPU_UPDATE_INTERVAL};

use crate::errors::GuardError;
use crate::utils::formatting::{format_gb, format_percent, format_uptime};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryDetail {
    pub total: String,
    pub available: String,
    pub used: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskDetail {
    pub total: String,
    pub used: String,
    pub free: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub cpu_usage: String,
    pub memory_usage: String,
    pub disk_usage: String,
    pub uptime: String,
    pub detailed_memory: MemoryDetail,
    pub detailed_disk: DiskDetail,
}

/// Raw figures, in bytes and percent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceSample {
    pub cpu_percent: f32,
    pub memory_total: u64,
    pub memory_available: u64,
    pub disk_total: u64,
    pub disk_available: u64,
    pub uptime_secs: u64,
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

impl ResourceSample {
    pub fn to_status(&self) -> SystemStatus {
        let memory_used = self.memory_total.saturating_sub(self.memory_available);
        let disk_used = self.disk_total.saturating_sub(self.disk_available);
        SystemStatus {
            cpu_usage: format_percent(self.cpu_percent as f64),
            memory_usage: format_percent(percent(memory_used, self.memory_total)),
            disk_usage: format_percent(percent(disk_used, self.disk_total)),
            uptime: format_uptime(self.uptime_secs),
            detailed_memory: MemoryDetail {
                total: format_gb(self.memory_total),
                available: format_gb(self.memory_available),
                used: format_gb(memory_used),
            },
            detailed_disk: DiskDetail {
                total: format_gb(self.disk_total),
                used: format_gb(disk_used),
                free: format_gb(self.disk_available),
            },
        }
    }
}

/// Blocks for one CPU sampling interval.
fn sample() -> ResourceSample {
    let mut sys = System::new();
    sys.refresh_cpu();
    std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu();
    sys.refresh_memory();

    let disks = Disks::new_with_refreshed_list();
    let root = disks
        .list()
        .iter()
        .find(|d| d.mount_point() == Path::new("/"))
        .or_else(|| disks.list().first());

    ResourceSample {
        cpu_percent: sys.global_cpu_info().cpu_usage(),
        memory_total: sys.total_memory(),
        memory_available: sys.available_memory(),
        disk_total: root.map(|d| d.total_space()).unwrap_or(0),
        disk_available: root.map(|d| d.available_space()).unwrap_or(0),
        uptime_secs: System::uptime(),
    }
}

pub async fn collect_system_status() -> Result<SystemStatus, GuardError> {
    let sample = tokio::task::spawn_blocking(sample)
        .await
        .map_err(|e| GuardError::Internal(format!("system sampling task failed: {}", e)))?;
    Ok(sample.to_status())
}
