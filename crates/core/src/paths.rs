//! Pure helpers over hierarchical path strings.
//!
//! Paths are `/`-joined segments from the namespace root, e.g. `acme/team/repo`.
//! Nothing here touches storage; the store builds its cascade rewrite on
//! [`rewrite_prefix`] so the rule is testable in isolation.

pub const SEPARATOR: char = '/';

/// Joins a parent path and a child segment. An empty parent yields the segment.
pub fn concatenate(parent: &str, segment: &str) -> String {
    let parent = parent.trim_end_matches(SEPARATOR);
    let segment = segment.trim_start_matches(SEPARATOR);
    if parent.is_empty() {
        return segment.to_string();
    }
    if segment.is_empty() {
        return parent.to_string();
    }
    format!("{parent}{SEPARATOR}{segment}")
}

pub fn segments(value: &str) -> impl Iterator<Item = &str> {
    value.split(SEPARATOR)
}

pub fn depth(value: &str) -> usize {
    if value.is_empty() {
        0
    } else {
        segments(value).count()
    }
}

/// Splits `a/b/c` into `(Some("a/b"), "c")` and `c` into `(None, "c")`.
pub fn split_leaf(value: &str) -> (Option<&str>, &str) {
    match value.rfind(SEPARATOR) {
        Some(idx) => (Some(&value[..idx]), &value[idx + 1..]),
        None => (None, value),
    }
}

pub fn parent(value: &str) -> Option<&str> {
    split_leaf(value).0
}

/// True when `value` lies strictly below `ancestor` in the tree.
pub fn is_descendant(value: &str, ancestor: &str) -> bool {
    !ancestor.is_empty()
        && value.len() > ancestor.len() + 1
        && value.starts_with(ancestor)
        && value[ancestor.len()..].starts_with(SEPARATOR)
}

/// Replaces the `old_prefix` ancestor of `value` with `new_prefix`.
///
/// Returns `None` when `value` is not a strict descendant of `old_prefix`;
/// the ancestor itself is never rewritten here.
pub fn rewrite_prefix(value: &str, old_prefix: &str, new_prefix: &str) -> Option<String> {
    if !is_descendant(value, old_prefix) {
        return None;
    }
    let rest = &value[old_prefix.len() + 1..];
    Some(concatenate(new_prefix, rest))
}

/// Escapes `%`, `_` and the escape character for a SQL `LIKE ... ESCAPE '\'` pattern.
pub fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// `LIKE` pattern matching every strict descendant of `ancestor`.
pub fn descendant_like_pattern(ancestor: &str) -> String {
    format!("{}{SEPARATOR}%", escape_like(ancestor))
}
