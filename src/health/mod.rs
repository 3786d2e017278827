//! Live host posture for the dashboard: quick security indicators and
//! resource usage. Nothing here is persisted.

pub mod indicators;
pub mod system;

pub use indicators::{collect_indicators, HealthIndicators, ThreatLevel};
pub use system::{collect_system_status, SystemStatus};
