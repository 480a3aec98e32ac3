//! Satellite version normalization
//!
//! The API accepts only the version labels it lists (`sat-6.14`, `sat-6.15`,
//! ...). Callers often pass something longer, like a full `sat-6.14.2` build
//! string, or a release the API does not know yet. `normalize_version` maps
//! the request onto a listed label.

use tracing::debug;

/// Map `requested` onto one of `valid`.
///
/// A listed label is returned as is. Long or three-part versions are truncated to their first two dot-separated
/// components. If the result is still not listed, the label with the highest
/// minor number is used instead. `valid` must not be empty; callers check.
pub fn normalize_version(requested: &str, valid: &[String]) -> String {
    if valid.iter().any(|v| v == requested) {
        return requested.to_string();
    }

    let mut version = requested.to_string();

    if version.len() > 8 || version.matches('.').count() >= 2 {
        version = version.split('.').take(2).collect::<Vec<_>>().join(".");
    }

    if valid.iter().any(|v| *v == version) {
        return version;
    }

    match latest(valid) {
        Some(fallback) => {
            debug!(requested, fallback = %fallback, "version not offered; using latest");
            fallback.clone()
        }
        None => version,
    }
}

/// Label with the greatest numeric minor component; ties keep list order.
fn latest(valid: &[String]) -> Option<&String> {
    let mut sorted: Vec<&String> = valid.iter().collect();
    sorted.sort_by_key(|v| std::cmp::Reverse(minor(v)));
    sorted.into_iter().next()
}

fn minor(version: &str) -> u64 {
    version
        .rsplit('.')
        .next()
        .and_then(|y| y.parse().ok())
        .unwrap_or(0)
}
