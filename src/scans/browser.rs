use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::GuardError;
use crate::models::{BrowserExtension, RecordCounter, ScanBuilder, ScanRecord};
use super::startup::list_dir;
use super::{display_path, ScanContext, ScanDefinition, Scanner, TimeoutClass};

pub static DEFINITION: ScanDefinition = ScanDefinition {
    key: "browser_extensions",
    scan_type: "Browser_Extensions",
    display_name: "Browser Extensions Scan",
    budget: TimeoutClass::Long,
};

const CHROME: &str = "Chrome";
const BRAVE: &str = "Brave";
const FIREFOX: &str = "Firefox";
const SAFARI: &str = "Safari";

const COUNTERS: &[RecordCounter] = &[
    ("chrome", |r| matches!(r, ScanRecord::BrowserExtension(e) if e.browser == CHROME)),
    ("brave", |r| matches!(r, ScanRecord::BrowserExtension(e) if e.browser == BRAVE)),
    ("firefox", |r| matches!(r, ScanRecord::BrowserExtension(e) if e.browser == FIREFOX)),
    ("safari", |r| matches!(r, ScanRecord::BrowserExtension(e) if e.browser == SAFARI)),
];

const CHROMIUM_PROFILES: &[(&str, &str)] = &[
    (CHROME, "Library/Application Support/Google/Chrome"),
    (BRAVE, "Library/Application Support/BraveSoftware/Brave-Browser"),
];
const FIREFOX_PROFILES: &str = "Library/Application Support/Firefox/Profiles";
const SAFARI_PREFS: &str = "Library/Containers/com.apple.Safari/Data/Library/Preferences/com.apple.Safari.plist";
const PLIST_BUDDY: &str = "/usr/libexec/PlistBuddy";
const UNKNOWN_NAME: &str = "Unknown";

pub struct BrowserExtensionsScanner;

#[async_trait]
impl Scanner for BrowserExtensionsScanner {
    fn definition(&self) -> &'static ScanDefinition {
        &DEFINITION
    }

    async fn collect(&self, ctx: &ScanContext, out: &mut ScanBuilder, _deadline: Instant) {
        for (browser, root) in CHROMIUM_PROFILES {
            let dir = ctx.home(root).join("Default").join("Extensions");
            scan_chromium(browser, &dir, out).await;
        }
        scan_firefox(&ctx.home(FIREFOX_PROFILES), out).await;
        scan_safari(ctx, out).await;
    }

    fn counters(&self) -> &'static [RecordCounter] {
        COUNTERS
    }
}

async fn read_json(path: &Path) -> Result<Value, GuardError> {
    let text = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&text)?)
}

/// Chromium keeps one directory per extension id, each holding one
/// directory per installed version. Missing browsers are skipped silently.
async fn scan_chromium(browser: &str, extensions_dir: &Path, out: &mut ScanBuilder) {
    let ids = match list_dir(extensions_dir).await {
        Ok(ids) => ids,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return,
        Err(e) => {
            out.record_error(format!("{} extensions", browser), e);
            return;
        }
    };
    for id in ids.into_iter().filter(|id| !id.starts_with('.')) {
        let ext_dir = extensions_dir.join(&id);
        let Some(version_dir) = latest_version_dir(&ext_dir).await else {
            continue;
        };
        let manifest_path = version_dir.join("manifest.json");
        let (name, version) = match read_json(&manifest_path).await {
            Ok(manifest) => {
                let name = manifest_name(&manifest, &version_dir).await;
                let version = manifest.get("version").and_then(Value::as_str).map(str::to_string);
                (name, version)
            }
            Err(e) => {
                out.record_error(format!("{} manifest {}", browser, id), e);
                (UNKNOWN_NAME.to_string(), None)
            }
        };
        out.push(ScanRecord::BrowserExtension(BrowserExtension {
            browser: browser.to_string(),
            id,
            name,
            version,
            enabled: None,
        }));
    }
}

async fn latest_version_dir(ext_dir: &Path) -> Option<PathBuf> {
    let versions = list_dir(ext_dir).await.ok()?;
    versions
        .into_iter()
        .filter(|v| !v.starts_with('.'))
        .max_by(|a, b| compare_versions(a, b))
        .map(|v| ext_dir.join(v))
}

/// Numeric comparison of dotted versions; `1.10.0_0` sorts after `1.9.2_0`.
fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    let key = |s: &str| -> Vec<u64> {
        s.split(['.', '_']).map(|p| p.parse().unwrap_or(0)).collect()
    };
    key(a).cmp(&key(b))
}

/// `__MSG_key__` names point into `_locales/<locale>/messages.json`.
pub fn message_key(name: &str) -> Option<&str> {
    name.strip_prefix("__MSG_")?.strip_suffix("__")
}

async fn manifest_name(manifest: &Value, version_dir: &Path) -> String {
    let raw = manifest.get("name").and_then(Value::as_str).unwrap_or(UNKNOWN_NAME);
    let Some(key) = message_key(raw) else {
        return raw.to_string();
    };
    let locales_dir = version_dir.join("_locales");
    let mut locales: Vec<String> = Vec::new();
    if let Some(default) = manifest.get("default_locale").and_then(Value::as_str) {
        locales.push(default.to_string());
    }
    locales.push("en".to_string());
    if let Ok(all) = list_dir(&locales_dir).await {
        locales.extend(all);
    }
    for locale in locales {
        let path = locales_dir.join(&locale).join("messages.json");
        if let Ok(messages) = read_json(&path).await {
            if let Some(message) = lookup_message(&messages, key) {
                return message;
            }
        }
    }
    UNKNOWN_NAME.to_string()
}

/// Message keys are case-insensitive.
pub fn lookup_message(messages: &Value, key: &str) -> Option<String> {
    messages
        .as_object()?
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .and_then(|(_, v)| v.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

async fn scan_firefox(profiles_dir: &Path, out: &mut ScanBuilder) {
    let pattern = format!(
        "{}/*/extensions.json",
        glob::Pattern::escape(&display_path(profiles_dir))
    );
    let paths = match glob::glob(&pattern) {
        Ok(paths) => paths,
        Err(e) => {
            out.record_error("Firefox profiles", e);
            return;
        }
    };
    for entry in paths {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                out.record_error("Firefox profiles", e);
                continue;
            }
        };
        match read_json(&path).await {
            Ok(doc) => out.extend(parse_firefox_addons(&doc).into_iter().map(ScanRecord::BrowserExtension)),
            Err(e) => out.record_error(display_path(&path), e),
        }
    }
}

/// Extensions from a profile's `extensions.json`; themes, dictionaries and
/// other add-on types are skipped.
pub fn parse_firefox_addons(doc: &Value) -> Vec<BrowserExtension> {
    let Some(addons) = doc.get("addons").and_then(Value::as_array) else {
        return Vec::new();
    };
    addons
        .iter()
        .filter(|a| a.get("type").and_then(Value::as_str) == Some("extension"))
        .map(|a| BrowserExtension {
            browser: FIREFOX.to_string(),
            id: a.get("id").and_then(Value::as_str).unwrap_or_default().to_string(),
            name: a
                .pointer("/defaultLocale/name")
                .or_else(|| a.get("name"))
                .and_then(Value::as_str)
                .unwrap_or(UNKNOWN_NAME)
                .to_string(),
            version: a.get("version").and_then(Value::as_str).map(str::to_string),
            enabled: a.get("active").and_then(Value::as_bool),
        })
        .collect()
}

async fn scan_safari(ctx: &ScanContext, out: &mut ScanBuilder) {
    let prefs = ctx.home(SAFARI_PREFS);
    if !tokio::fs::try_exists(&prefs).await.unwrap_or(false) {
        return;
    }
    let prefs = display_path(&prefs);
    match ctx.output(&[PLIST_BUDDY, "-c", "Print :ManagedExtensions", &prefs]).await {
        Ok(output) if output.success() => out.extend(
            parse_plistbuddy_keys(&output.stdout)
                .into_iter()
                .map(|id| {
                    ScanRecord::BrowserExtension(BrowserExtension {
                        browser: SAFARI.to_string(),
                        name: id.clone(),
                        id,
                        version: None,
                        enabled: None,
                    })
                }),
        ),
        // PlistBuddy exits 1 when the key does not exist.
        Ok(output) if output.stdout.contains("Does Not Exist") || output.stderr.contains("Does Not Exist") => {}
        Ok(output) => out.record_error("Safari managed extensions", output.stderr.trim()),
        Err(e) => out.record_error("Safari managed extensions", e),
    }
}

/// Top-level keys of a PlistBuddy `Dict { ... }` dump.
pub fn parse_plistbuddy_keys(text: &str) -> Vec<String> {
    let mut depth = 0usize;
    let mut keys = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line == "}" {
            depth = depth.saturating_sub(1);
            continue;
        }
        if depth == 1 {
            if let Some((key, _)) = line.split_once(" = ") {
                keys.push(key.trim().to_string());
            }
        }
        if line.ends_with('{') {
            depth += 1;
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::scans::run_scanner;
    use crate::scans::testing::{context, ScriptedExecutor};

    #[test]
    fn test_message_key() {
        assert_eq!(message_key("__MSG_appName__"), Some("appName"));
        assert_eq!(message_key("uBlock Origin"), None);
    }

    #[test]
    fn test_lookup_message_case_insensitive() {
        let messages = json!({"AppName": {"message": "Password Manager"}});
        assert_eq!(lookup_message(&messages, "appname").as_deref(), Some("Password Manager"));
        assert_eq!(lookup_message(&messages, "other"), None);
    }

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("1.10.0_0", "1.9.2_0"), std::cmp::Ordering::Greater);
    }

    #[test]
    fn test_parse_firefox_addons() {
        let doc = json!({"addons": [
            {"id": "uBlock0@raymondhill.net", "type": "extension", "version": "1.58.0", "active": true,
             "defaultLocale": {"name": "uBlock Origin"}},
            {"id": "firefox-compact-dark@mozilla.org", "type": "theme", "version": "1.2"}
        ]});
        let exts = parse_firefox_addons(&doc);
        assert_eq!(exts.len(), 1);
        assert_eq!(exts[0].name, "uBlock Origin");
        assert_eq!(exts[0].enabled, Some(true));
    }

    #[test]
    fn test_parse_plistbuddy_keys() {
        let text = "Dict {\n    com.example.blocker = Dict {\n        Enabled = true\n    }\n    com.example.notes = Dict {\n    }\n}\n";
        assert_eq!(parse_plistbuddy_keys(text), vec!["com.example.blocker", "com.example.notes"]);
    }

    #[tokio::test]
    async fn test_chrome_localized_name_and_missing_browsers() {
        let home = tempfile::tempdir().unwrap();
        let version_dir = home
            .path()
            .join("Library/Application Support/Google/Chrome/Default/Extensions/abcdef/2.1.0_0");
        std::fs::create_dir_all(version_dir.join("_locales/en")).unwrap();
        std::fs::write(
            version_dir.join("manifest.json"),
            r#"{"name": "__MSG_extName__", "version": "2.1.0", "default_locale": "en"}"#,
        )
        .unwrap();
        std::fs::write(
            version_dir.join("_locales/en/messages.json"),
            r#"{"extName": {"message": "Tab Saver"}}"#,
        )
        .unwrap();

        let ctx = context(ScriptedExecutor::new()).with_home(home.path());
        let result = run_scanner(&BrowserExtensionsScanner, &ctx).await;
        assert!(result.errors.is_empty());
        assert_eq!(result.summary.counts["chrome"], 1);
        assert_eq!(result.summary.counts["brave"], 0);
        match &result.results[0] {
            ScanRecord::BrowserExtension(e) => {
                assert_eq!(e.name, "Tab Saver");
                assert_eq!(e.version.as_deref(), Some("2.1.0"));
            }
            other => panic!("unexpected record {:?}", other),
        }
    }
}
