use std::process::Command;

fn main() {
    write_git_rev();
    write_commit_date();
}

/// Export the current git hash as NIFVIEW_BUILD_COMMIT_HASH so it's
/// available to version.rs. Silently does nothing outside a git checkout.
fn write_git_rev() {
    let commit_hash = match git(&["rev-parse", "--short", "HEAD"]) {
        Some(x) => x,
        None => return,
    };
    let changes_in_working_dir = git(&["status", "--porcelain"]).unwrap_or_default();

    let wip = if changes_in_working_dir.is_empty() { "" } else { "WIP " };
    println!("cargo:rustc-env=NIFVIEW_BUILD_COMMIT_HASH={}{}", wip, commit_hash);
}

fn write_commit_date() {
    if let Some(date) = git(&["log", "-1", "--format=%cd", "--date=short"]) {
        println!("cargo:rustc-env=NIFVIEW_BUILD_COMMIT_DATE={}", date);
    }
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    // Drop the trailing newline
    let s = String::from_utf8(output.stdout).ok()?;
    Some(s.trim_end().to_string())
}
