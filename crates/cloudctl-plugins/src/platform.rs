//! Host platform tag, in the plugin index's naming convention

/// Platform tag for the running host (`osx`, `linux64`, `win64`, ...)
pub fn current() -> String {
    tag_for(std::env::consts::OS, std::env::consts::ARCH)
}

/// Map an OS/architecture pair onto the index's platform tag.
///
/// Pairs the index has no established tag for fall back to `<os>-<arch>`.
pub fn tag_for(os: &str, arch: &str) -> String {
    match (os, arch) {
        ("macos", "x86_64") => "osx".to_string(),
        ("macos", "aarch64") => "osx-arm64".to_string(),
        ("linux", "x86_64") => "linux64".to_string(),
        ("linux", "x86") => "linux32".to_string(),
        ("linux", "aarch64") => "linux-arm64".to_string(),
        ("windows", "x86_64") => "win64".to_string(),
        ("windows", "x86") => "win32".to_string(),
        _ => format!("{}-{}", os, arch),
    }
}
