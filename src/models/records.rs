use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use super::status::ToggleStatus;

/// One normalized record inside a scan report.
///
/// Each scan domain has its own record shape; the `kind` tag keeps reports
/// self-describing so they can be read back without knowing the scan type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanRecord {
    FirewallCheck(FirewallCheck),
    FirewallRule(FirewallRule),
    SipStatus(SipStatus),
    PrivacyGrant(PrivacyGrant),
    Process(ProcessInfo),
    NetworkConnection(NetworkConnection),
    BrowserExtension(BrowserExtension),
    StartupItem(StartupItem),
    ScheduledTask(ScheduledTask),
    Software(SoftwareExposure),
    RansomwareIndicator(RansomwareIndicator),
    ExecutableHash(ExecutableHash),
    LargeOldFile(LargeOldFile),
    DuplicateSet(DuplicateSet),
    Service(ServiceEntry),
    AppSignature(AppSignature),
    SoftwareUpdate(SoftwareUpdate),
    Snapshot(Snapshot),
    UserAccount(UserAccount),
    AppEntitlements(AppEntitlements),
    ListeningPort(ListeningPort),
    MiningIndicator(MiningIndicator),
}

/// A single firewall setting such as global state or stealth mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirewallCheck {
    pub check: String,
    pub status: ToggleStatus,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Allow,
    Block,
    Unknown,
}

/// A per-application firewall rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirewallRule {
    pub application: String,
    pub action: RuleAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SipStatus {
    pub status: ToggleStatus,
    pub detail: String,
}

/// A TCC permission row: which client may use which protected service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivacyGrant {
    pub service: String,
    pub client: String,
    pub allowed: bool,
    /// `system` or `user`, depending on which TCC database answered.
    pub database: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub user: String,
    pub pid: u32,
    pub cpu_percent: f32,
    pub mem_percent: f32,
    pub command: String,
}

/// An established connection with best-effort attribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConnection {
    pub process: Option<String>,
    pub pid: Option<u32>,
    pub protocol: String,
    pub local_address: String,
    pub remote_ip: String,
    pub remote_port: Option<u16>,
    /// Coarse location, or a sentinel such as "Internal Network".
    pub location: String,
    pub internal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserExtension {
    pub browser: String,
    pub id: String,
    pub name: String,
    pub version: Option<String>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartupItem {
    pub location: String,
    pub name: String,
    pub path: String,
    pub suspicious: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTask {
    /// `launchd`, `user_crontab`, `system_crontab`, `periodic` or `login_item`.
    pub source: String,
    pub name: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExploitReference {
    pub id: String,
    pub title: String,
    pub url: String,
    /// Version bounds pulled from the title, e.g. "Version 2.1 and below".
    pub vulnerable_versions: Vec<String>,
}

/// An installed application or package and any public exploits naming it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftwareExposure {
    pub name: String,
    pub version: String,
    /// `application` or `homebrew`.
    pub source: String,
    pub exploits: Vec<ExploitReference>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    HighEntropyFile,
    RansomNote,
    SuspiciousProcess,
    PersistenceItem,
}

impl IndicatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighEntropyFile => "high_entropy_file",
            Self::RansomNote => "ransom_note",
            Self::SuspiciousProcess => "suspicious_process",
            Self::PersistenceItem => "persistence_item",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RansomwareIndicator {
    pub indicator: IndicatorKind,
    pub subject: String,
    pub entropy: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutableHash {
    pub path: String,
    pub sha256: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LargeOldFile {
    pub path: String,
    pub size_bytes: u64,
    pub modified: DateTime<Utc>,
    pub large: bool,
    pub old: bool,
}

/// Two or more files with identical content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateSet {
    pub sha256: String,
    pub size_bytes: u64,
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceCategory {
    System,
    #[serde(rename = "User-defined")]
    UserDefined,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub label: String,
    pub pid: Option<u32>,
    pub last_exit_status: Option<i32>,
    pub category: ServiceCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureStatus {
    Signed,
    Unsigned,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSignature {
    pub application: String,
    pub path: String,
    pub status: SignatureStatus,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftwareUpdate {
    /// `macos` or `homebrew`.
    pub source: String,
    pub name: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub name: String,
    pub created: Option<DateTime<Utc>>,
    pub recent: bool,
}

/// A local account from the directory service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub username: String,
    pub real_name: Option<String>,
    pub uid: Option<u32>,
    pub primary_gid: Option<u32>,
    pub home: Option<String>,
    pub shell: Option<String>,
    pub admin: bool,
    /// False for `nologin`/`false` shells.
    pub interactive: bool,
    /// Sensitive home subdirectories that other users can read or enter.
    pub exposed_dirs: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskyEntitlement {
    pub entitlement: String,
    pub name: String,
    pub risk_level: RiskLevel,
}

/// Code-signing verdict and sensitive entitlements of one app bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppEntitlements {
    pub application: String,
    pub path: String,
    pub signature: SignatureStatus,
    pub detail: String,
    pub entitlements: Vec<RiskyEntitlement>,
}

/// A TCP socket in the LISTEN state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListeningPort {
    pub process: String,
    pub pid: Option<u32>,
    pub user: String,
    pub address: String,
    pub port: u16,
    /// Bound to a wildcard address rather than loopback.
    pub exposed: bool,
    pub suspicious: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MiningIndicatorKind {
    HighCpuProcess,
    MinerProcess,
    MinerFile,
    BrowserMiner,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningIndicator {
    pub indicator: MiningIndicatorKind,
    pub subject: String,
    pub detail: String,
}
