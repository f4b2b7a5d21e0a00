use std::process::Command;

/// Embed the commit and build date shown by `verisight version`.
///
/// Packagers can pin both through `VERISIGHT_GIT_HASH` and
/// `SOURCE_DATE_EPOCH` for reproducible builds.
fn main() {
    let git_hash = std::env::var("VERISIGHT_GIT_HASH")
        .ok()
        .or_else(|| command_stdout("git", &["rev-parse", "--short", "HEAD"]))
        .unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=VERISIGHT_GIT_HASH={}", git_hash);

    let build_date = match std::env::var("SOURCE_DATE_EPOCH") {
        Ok(epoch) => command_stdout("date", &["-u", "-d", &format!("@{epoch}"), "+%Y-%m-%d"]),
        Err(_) => command_stdout("date", &["-u", "+%Y-%m-%d"]),
    }
    .unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=VERISIGHT_BUILD_DATE={}", build_date);

    println!("cargo:rerun-if-env-changed=VERISIGHT_GIT_HASH");
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");
}

fn command_stdout(program: &str, args: &[&str]) -> Option<String> {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .filter(|s| !s.is_empty())
}
