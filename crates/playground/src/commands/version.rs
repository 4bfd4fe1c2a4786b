//! Version command implementation

/// The line printed by `topos-playground version`
pub fn version_line(quiet: bool) -> String {
    let version = env!("CARGO_PKG_VERSION");
    if quiet {
        version.to_string()
    } else {
        format!("{} version {}", env!("CARGO_PKG_NAME"), version)
    }
}

/// Print the version; `--quiet` does not suppress it
pub fn execute_version(quiet: bool) {
    println!("{}", version_line(quiet));
}
