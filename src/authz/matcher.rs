/// Does a stored resource pattern cover `resource`?
///
/// `"*"` matches everything, a pattern ending in `*` matches any resource that
/// starts with the rest of the pattern, anything else must be equal byte for
/// byte. A `*` anywhere but the last position is a literal character.
pub fn matches(pattern: &str, resource: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    match pattern.strip_suffix('*') {
        Some(prefix) => resource.starts_with(prefix),
        None => pattern == resource,
    }
}
