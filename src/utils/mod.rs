pub(crate) mod retry;

use crate::constants::PATH_SEPARATOR;

/// Joins a parent path and a child name the way the namespace spells child
/// paths: `/services/foo` + `node1:22` = `/services/foo/node1:22`.
pub fn child_path(
    parent: &str,
    child: &str,
) -> String {
    if parent.ends_with(PATH_SEPARATOR) {
        format!("{parent}{child}")
    } else {
        format!("{parent}{PATH_SEPARATOR}{child}")
    }
}

/// Splits `/a/b/c` into (`/a/b`, `c`). Returns `None` for the root.
pub fn split_path(path: &str) -> Option<(&str, &str)> {
    let trimmed = path.trim_end_matches(PATH_SEPARATOR);
    let idx = trimmed.rfind(PATH_SEPARATOR)?;
    let name = &trimmed[idx + 1..];
    if name.is_empty() {
        return None;
    }
    let parent = if idx == 0 { "/" } else { &trimmed[..idx] };
    Some((parent, name))
}
