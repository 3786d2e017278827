use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;

use crate::models::{RecordCounter, ScanBuilder, ScanRecord, UserAccount};
use super::parse::lines;
use super::{ScanContext, ScanDefinition, Scanner, TimeoutClass};

pub static DEFINITION: ScanDefinition = ScanDefinition {
    key: "user_permissions",
    scan_type: "User_Audit",
    display_name: "User Permissions",
    budget: TimeoutClass::Quick,
};

const COUNTERS: &[RecordCounter] = &[
    ("admin", |r| matches!(r, ScanRecord::UserAccount(u) if u.admin)),
    ("interactive", |r| matches!(r, ScanRecord::UserAccount(u) if u.interactive)),
    ("exposed_home_dirs", |r| matches!(r, ScanRecord::UserAccount(u) if !u.exposed_dirs.is_empty())),
];

const USER_ATTRIBUTES: &[&str] = &["RealName", "UniqueID", "PrimaryGroupID", "NFSHomeDirectory", "UserShell"];
const SENSITIVE_DIRS: &[&str] = &["Documents", "Downloads", "Library", ".ssh"];
const NON_LOGIN_SHELLS: &[&str] = &["/usr/bin/false", "/bin/false", "/sbin/nologin", "/usr/sbin/nologin"];

pub struct UserPermissionsScanner;

#[async_trait]
impl Scanner for UserPermissionsScanner {
    fn definition(&self) -> &'static ScanDefinition {
        &DEFINITION
    }

    async fn collect(&self, ctx: &ScanContext, out: &mut ScanBuilder, _deadline: Instant) {
        let users = match ctx.output(&["dscl", ".", "-list", "/Users"]).await {
            Ok(output) if output.success() => parse_user_list(&output.stdout),
            Ok(output) => {
                out.record_error("dscl -list /Users", output.stderr.trim());
                return;
            }
            Err(e) => {
                out.record_error("dscl -list /Users", e);
                return;
            }
        };

        let admins = match ctx.output(&["dscl", ".", "-read", "/Groups/admin", "GroupMembership"]).await {
            Ok(output) if output.success() => parse_group_membership(&output.stdout),
            Ok(output) => {
                out.record_error("admin group", output.stderr.trim());
                HashSet::new()
            }
            Err(e) => {
                out.record_error("admin group", e);
                HashSet::new()
            }
        };
        out.note("admin_members", admins.len().to_string());

        for username in users {
            let record_path = format!("/Users/{}", username);
            let mut args = vec!["dscl", ".", "-read", record_path.as_str()];
            args.extend_from_slice(USER_ATTRIBUTES);
            let mut account = match ctx.output(&args).await {
                Ok(output) if output.success() => parse_user_record(&username, &output.stdout),
                Ok(output) => {
                    out.record_error(format!("dscl {}", record_path), output.stderr.trim());
                    parse_user_record(&username, "")
                }
                Err(e) => {
                    out.record_error(format!("dscl {}", record_path), e);
                    parse_user_record(&username, "")
                }
            };
            account.admin = admins.contains(&username);
            if let Some(home) = account.home.clone() {
                account.exposed_dirs = exposed_dirs(Path::new(&home)).await;
            }
            out.push(ScanRecord::UserAccount(account));
        }
    }

    fn counters(&self) -> &'static [RecordCounter] {
        COUNTERS
    }
}

/// Account names from `dscl . -list /Users`, minus `_` service accounts.
pub fn parse_user_list(text: &str) -> Vec<String> {
    lines(text)
        .filter(|name| !name.starts_with('_'))
        .map(str::to_string)
        .collect()
}

/// Members listed on the `GroupMembership:` line.
pub fn parse_group_membership(text: &str) -> HashSet<String> {
    parse_attributes(text)
        .into_iter()
        .find(|(key, _)| key == "GroupMembership")
        .map(|(_, value)| value.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// `Key: value` pairs. dscl moves values containing spaces onto indented
/// continuation lines after a bare `Key:`.
fn parse_attributes(text: &str) -> Vec<(String, String)> {
    let mut attributes: Vec<(String, String)> = Vec::new();
    for raw in text.lines() {
        if raw.trim().is_empty() {
            continue;
        }
        if raw.starts_with(char::is_whitespace) {
            if let Some((_, value)) = attributes.last_mut() {
                if !value.is_empty() {
                    value.push(' ');
                }
                value.push_str(raw.trim());
            }
            continue;
        }
        if let Some((key, value)) = raw.split_once(':') {
            attributes.push((key.trim().to_string(), value.trim().to_string()));
        }
    }
    attributes
}

pub fn parse_user_record(username: &str, text: &str) -> UserAccount {
    let attributes = parse_attributes(text);
    let get = |name: &str| {
        attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
            .filter(|value| !value.is_empty())
    };
    let shell = get("UserShell");
    UserAccount {
        username: username.to_string(),
        real_name: get("RealName"),
        uid: get("UniqueID").and_then(|v| v.parse().ok()),
        primary_gid: get("PrimaryGroupID").and_then(|v| v.parse().ok()),
        home: get("NFSHomeDirectory"),
        interactive: shell.as_deref().map(is_login_shell).unwrap_or(false),
        shell,
        admin: false,
        exposed_dirs: Vec::new(),
    }
}

fn is_login_shell(shell: &str) -> bool {
    !NON_LOGIN_SHELLS.contains(&shell)
}

/// Sensitive subdirectories of `home` with any "other" permission bits set.
pub async fn exposed_dirs(home: &Path) -> Vec<String> {
    let mut exposed = Vec::new();
    for name in SENSITIVE_DIRS {
        let Ok(meta) = tokio::fs::metadata(home.join(name)).await else {
            continue;
        };
        if meta.is_dir() && is_world_accessible(&meta) {
            exposed.push(name.to_string());
        }
    }
    exposed
}

#[cfg(unix)]
fn is_world_accessible(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o007 != 0
}

#[cfg(not(unix))]
fn is_world_accessible(_meta: &std::fs::Metadata) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scans::run_scanner;
    use crate::scans::testing::{context, ScriptedExecutor};

    const ALICE: &str = "NFSHomeDirectory: /nonexistent/alice
PrimaryGroupID: 20
RealName:
 Alice Example
UniqueID: 501
UserShell: /bin/zsh
";

    #[test]
    fn test_user_list_skips_service_accounts() {
        let users = parse_user_list("_amavisd\n_www\nalice\ndaemon\nroot\n");
        assert_eq!(users, vec!["alice", "daemon", "root"]);
    }

    #[test]
    fn test_record_with_continuation_line() {
        let account = parse_user_record("alice", ALICE);
        assert_eq!(account.real_name.as_deref(), Some("Alice Example"));
        assert_eq!(account.uid, Some(501));
        assert_eq!(account.primary_gid, Some(20));
        assert_eq!(account.shell.as_deref(), Some("/bin/zsh"));
        assert!(account.interactive);
    }

    #[test]
    fn test_nologin_shell_is_not_interactive() {
        let account = parse_user_record("daemon", "UniqueID: 1\nUserShell: /usr/bin/false\n");
        assert!(!account.interactive);
        assert_eq!(account.real_name, None);
    }

    #[test]
    fn test_group_membership() {
        let admins = parse_group_membership("GroupMembership: root alice\n");
        assert!(admins.contains("alice"));
        assert!(admins.contains("root"));
        assert!(parse_group_membership("No such key: GroupMembership\n").is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_world_readable_dirs_are_flagged() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        for name in ["Documents", ".ssh"] {
            std::fs::create_dir(dir.path().join(name)).unwrap();
        }
        std::fs::set_permissions(dir.path().join("Documents"), std::fs::Permissions::from_mode(0o755)).unwrap();
        std::fs::set_permissions(dir.path().join(".ssh"), std::fs::Permissions::from_mode(0o700)).unwrap();
        assert_eq!(exposed_dirs(dir.path()).await, vec!["Documents"]);
    }

    #[tokio::test]
    async fn test_scan_marks_admins() {
        let executor = ScriptedExecutor::new()
            .stdout("dscl . -list /Users", "_www\nalice\nbob\n")
            .stdout("dscl . -read /Groups/admin GroupMembership", "GroupMembership: root alice\n")
            .stdout(
                "dscl . -read /Users/alice RealName UniqueID PrimaryGroupID NFSHomeDirectory UserShell",
                ALICE,
            );
        let result = run_scanner(&UserPermissionsScanner, &context(executor)).await;
        assert_eq!(result.summary.total, 2);
        assert_eq!(result.summary.counts["admin"], 1);
        assert_eq!(result.summary.notes["admin_members"], "2");
        // bob's record lookup was not scripted
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].context.contains("/Users/bob"));
    }

    #[tokio::test]
    async fn test_missing_dscl_is_recorded() {
        let result = run_scanner(&UserPermissionsScanner, &context(ScriptedExecutor::new())).await;
        assert_eq!(result.summary.total, 0);
        assert_eq!(result.errors[0].context, "dscl -list /Users");
    }
}
