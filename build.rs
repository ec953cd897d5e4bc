use std::process::Command;

fn main() {
    write_git_info();
}

/// Pass the current git hash and commit date to the compiler as
/// SKELBAKE_BUILD_COMMIT_HASH / SKELBAKE_BUILD_COMMIT_DATE so version.rs can
/// print them. Building outside a git checkout just leaves them unset.
fn write_git_info() {
    if let Some(hash) = git(&["rev-parse", "--short", "HEAD"]) {
        let wip = git(&["status", "--porcelain"])
            .map(|changes| !changes.is_empty())
            .unwrap_or(false);
        let hash = if wip { format!("WIP {}", hash) } else { hash };
        println!("cargo:rustc-env=SKELBAKE_BUILD_COMMIT_HASH={}", hash);
    }
    if let Some(date) = git(&["log", "-1", "--format=%cd", "--date=short"]) {
        println!("cargo:rustc-env=SKELBAKE_BUILD_COMMIT_DATE={}", date);
    }
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let s = String::from_utf8(output.stdout).ok()?;
    Some(s.trim_end().to_string())
}
