fn main() {
    println!(
        "cargo:rustc-env=GUARDSTICK_BUILD_DATE={}",
        chrono::Utc::now().format("%Y-%m-%d")
    );

    // Short commit hash for `--version` and /api/health, when built from a checkout
    let commit = std::process::Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .map(|out| String::from_utf8_lossy(&out.stdout).trim().to_string());
    if let Some(hash) = commit {
        println!("cargo:rustc-env=GUARDSTICK_COMMIT={hash}");
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
}
