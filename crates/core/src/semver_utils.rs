//! Semantic version utilities for tool version checks
//!
//! Tool version banners are free-form (`Docker version 24.0.7, build afdd53b`,
//! `git version 2.39.2`, `v18.17.0`) and not always strict semver
//! (`17.05.0-ce`). Versions are therefore read from the first
//! `major.minor[.patch]` occurrence and built numerically, which also accepts
//! leading zeros.
//!
//! ## Examples
//!
//! ```rust
//! use playground_core::semver_utils;
//!
//! let version = semver_utils::extract_version("Docker version 17.05.0-ce, build 89658be").unwrap();
//! assert_eq!(version.to_string(), "17.5.0");
//!
//! let minimum = semver_utils::parse_version("17.6.0").unwrap();
//! assert!(!semver_utils::meets_minimum(&version, &minimum));
//! ```

use regex::Regex;
use semver::Version;
use std::cmp::Ordering;
use std::sync::OnceLock;

fn version_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(\d+)\.(\d+)(?:\.(\d+))?").ok())
        .as_ref()
}

/// Parse a semantic version from a tag string
///
/// Handles tags like "v1.2.3", "1.2.3", "1.2", "1"
///
/// # Examples
///
/// ```rust
/// use playground_core::semver_utils::parse_version;
///
/// assert!(parse_version("1.2.3").is_some());
/// assert!(parse_version("v1.2.3").is_some());
/// assert!(parse_version("1.2").is_some());
/// assert!(parse_version("1").is_some());
/// assert!(parse_version("invalid").is_none());
/// ```
pub fn parse_version(tag: &str) -> Option<Version> {
    // Strip leading 'v' if present
    let version_str = tag.strip_prefix('v').unwrap_or(tag);

    if let Ok(version) = Version::parse(version_str) {
        return Some(version);
    }

    // Try with .0 suffix for major.minor versions
    if let Ok(version) = Version::parse(&format!("{}.0", version_str)) {
        return Some(version);
    }

    // Try with .0.0 suffix for major versions
    if let Ok(version) = Version::parse(&format!("{}.0.0", version_str)) {
        return Some(version);
    }

    extract_version(version_str)
}

/// Find the first `major.minor[.patch]` number in free-form text
///
/// # Examples
///
/// ```rust
/// use playground_core::semver_utils::extract_version;
///
/// assert_eq!(extract_version("git version 2.39.2").unwrap().to_string(), "2.39.2");
/// assert_eq!(extract_version("v18.17").unwrap().to_string(), "18.17.0");
/// assert!(extract_version("command not found").is_none());
/// ```
pub fn extract_version(text: &str) -> Option<Version> {
    let captures = version_pattern()?.captures(text)?;
    let number = |index: usize| -> Option<u64> {
        match captures.get(index) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(0),
        }
    };
    Some(Version::new(number(1)?, number(2)?, number(3)?))
}

/// Compare two versions by their numeric components
pub fn compare_versions(a: &Version, b: &Version) -> Ordering {
    (a.major, a.minor, a.patch).cmp(&(b.major, b.minor, b.patch))
}

/// Whether `found` is at least `minimum`, ignoring pre-release tags
pub fn meets_minimum(found: &Version, minimum: &Version) -> bool {
    compare_versions(found, minimum) != Ordering::Less
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("1.2.3"), Some(Version::new(1, 2, 3)));
        assert_eq!(parse_version("v1.2.3"), Some(Version::new(1, 2, 3)));
        assert_eq!(parse_version("1.2"), Some(Version::new(1, 2, 0)));
        assert_eq!(parse_version("1"), Some(Version::new(1, 0, 0)));
        assert_eq!(parse_version("17.05.0"), Some(Version::new(17, 5, 0)));
        assert_eq!(parse_version("invalid"), None);
    }

    #[test]
    fn test_extract_version_from_tool_banners() {
        assert_eq!(
            extract_version("Docker version 24.0.7, build afdd53b"),
            Some(Version::new(24, 0, 7))
        );
        assert_eq!(
            extract_version("Docker version 17.05.0-ce, build 89658be"),
            Some(Version::new(17, 5, 0))
        );
        assert_eq!(
            extract_version("git version 2.39.2 (Apple Git-143)"),
            Some(Version::new(2, 39, 2))
        );
        assert_eq!(extract_version("v18.17.0"), Some(Version::new(18, 17, 0)));
        assert_eq!(extract_version("no digits here"), None);
    }

    #[test]
    fn test_compare_versions() {
        let v1 = Version::new(1, 0, 0);
        let v2 = Version::new(2, 0, 0);

        assert_eq!(compare_versions(&v1, &v2), Ordering::Less);
        assert_eq!(compare_versions(&v2, &v1), Ordering::Greater);
        assert_eq!(compare_versions(&v1, &v1), Ordering::Equal);
    }

    #[test]
    fn test_meets_minimum() {
        let minimum = Version::new(17, 6, 0);

        assert!(!meets_minimum(&Version::new(17, 5, 0), &minimum));
        assert!(meets_minimum(&Version::new(17, 6, 0), &minimum));
        assert!(meets_minimum(&Version::new(24, 0, 7), &minimum));
        // pre-release tags do not push a release below its minimum
        assert!(meets_minimum(&Version::parse("17.6.0-rc.1").unwrap(), &minimum));
    }
}
