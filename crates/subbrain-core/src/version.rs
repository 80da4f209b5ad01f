use semver::Version;

/// Version reported when an engine answered but did not reveal its version.
pub const UNKNOWN_VERSION: &str = "Unknown";

/// Most recent engine release known to this build.
pub const LATEST_ENGINE_VERSION: &str = "2026.02.0";

/// Parse an engine version such as `2026.02.0` or `v2.1`.
///
/// Engine releases are calendar-style with zero-padded months, which strict
/// semver rejects, so each dotted component is read as a plain number.
/// Missing minor/patch components default to zero.
pub fn parse_engine_version(raw: &str) -> Option<Version> {
    let trimmed = raw.trim().trim_start_matches(['v', 'V']);
    if trimmed.is_empty() {
        return None;
    }
    let mut parts = trimmed.split('.').map(|part| part.parse::<u64>());
    let major = parts.next()?.ok()?;
    let minor = parts.next().transpose().ok()?.unwrap_or(0);
    let patch = parts.next().transpose().ok()?.unwrap_or(0);
    if parts.next().is_some() {
        return None;
    }
    Some(Version::new(major, minor, patch))
}

/// Whether `version` is older than `latest`.
///
/// "Unknown" and unparsable versions are never considered outdated.
pub fn is_outdated(version: &str, latest: &str) -> bool {
    if version == UNKNOWN_VERSION {
        return false;
    }
    match (parse_engine_version(version), parse_engine_version(latest)) {
        (Some(current), Some(latest)) => current < latest,
        _ => false,
    }
}
