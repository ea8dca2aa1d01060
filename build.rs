use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

// Both values may be pinned by the release pipeline for reproducible images.
fn main() {
    let timestamp = std::env::var("NSYNC_BUILD_TIMESTAMP")
        .ok()
        .and_then(|ts| ts.parse::<u64>().ok())
        .unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |elapsed| elapsed.as_secs())
        });

    let git_hash = std::env::var("NSYNC_GIT_HASH")
        .ok()
        .or_else(short_head)
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=NSYNC_BUILD_TIMESTAMP={timestamp}");
    println!("cargo:rustc-env=NSYNC_GIT_HASH={git_hash}");
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-env-changed=NSYNC_BUILD_TIMESTAMP");
    println!("cargo:rerun-if-env-changed=NSYNC_GIT_HASH");
}

fn short_head() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let hash = String::from_utf8(output.stdout).ok()?;
    Some(hash.trim().to_string()).filter(|hash| !hash.is_empty())
}
