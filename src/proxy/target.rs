//! Target URL construction.
//!
//! The backend routes `/x` and `/x/` differently and answers the wrong one
//! with a redirect, so the suffix after the mount point is copied byte for
//! byte. Only the configured base is normalized.

/// Remove trailing slashes from the backend base.
pub fn normalize_base(base: &str) -> &str {
    base.trim_end_matches('/')
}

/// The part of `path` after `prefix`, if `path` lives under the mount point.
///
/// `prefix` must match whole segments: `/api/proxyfoo` is not under
/// `/api/proxy`.
pub fn strip_mount<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

/// `<normalized base><suffix>[?query]`.
pub fn target_url(base: &str, suffix: &str, query: Option<&str>) -> String {
    let base = normalize_base(base);
    let mut url = String::with_capacity(base.len() + suffix.len() + 1);
    url.push_str(base);
    if !suffix.is_empty() && !suffix.starts_with('/') {
        url.push('/');
    }
    url.push_str(suffix);
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(query);
    }
    url
}

/// Backend media root: the base without its API-version suffix, plus `media_root`.
///
/// `http://host/api/v1` with `/media/` becomes `http://host/media/`.
pub fn media_base(base: &str, media_root: &str) -> String {
    let mut root = normalize_base(base);

    if let Some((head, last)) = root.rsplit_once('/') {
        if is_version_segment(last) {
            root = head;
        }
    }
    if let Some(head) = root.strip_suffix("/api") {
        root = head;
    }

    let media_root = media_root.trim_matches('/');
    if media_root.is_empty() {
        format!("{}/", root)
    } else {
        format!("{}/{}/", root, media_root)
    }
}

/// `v1`, `v2`, ... but not `v` or `views`.
fn is_version_segment(segment: &str) -> bool {
    segment
        .strip_prefix('v')
        .map(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

/// Media URL for a suffix under the media mount.
pub fn media_url(base: &str, media_root: &str, suffix: &str, query: Option<&str>) -> String {
    let root = media_base(base, media_root);
    let mut url = root;
    url.push_str(suffix.trim_start_matches('/'));
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(query);
    }
    url
}
