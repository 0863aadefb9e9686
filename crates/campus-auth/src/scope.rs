//! Scope matching.
//!
//! Scopes are strings of the form `domain:action`. A granted scope may end
//! in a `*` suffix (`finance:*`), which covers every action under that
//! domain. Required scopes are never wildcards.

/// Returns true if every scope in `required` is satisfied by `granted`.
///
/// A required scope is satisfied when it appears verbatim in `granted`, or
/// when some granted wildcard (`domain:*`) covers it. An empty `required`
/// set is always satisfied (public capability).
pub fn has_scope(granted: &[String], required: &[String]) -> bool {
    required.iter().all(|req| is_covered(granted, req))
}

/// The subset of `required` not satisfied by `granted`, in declaration order.
pub fn missing_scopes(granted: &[String], required: &[String]) -> Vec<String> {
    required
        .iter()
        .filter(|req| !is_covered(granted, req))
        .cloned()
        .collect()
}

/// The domain part of a scope string (`"finance:read"` → `"finance"`).
pub fn scope_prefix(scope: &str) -> &str {
    scope.split(':').next().unwrap_or(scope)
}

fn is_covered(granted: &[String], required: &str) -> bool {
    granted.iter().any(|g| covers(g, required))
}

fn covers(granted: &str, required: &str) -> bool {
    if granted == required {
        return true;
    }
    // Wildcard grants only: "finance:*" covers "finance:read" but a more
    // specific grant never covers a wildcard requirement.
    match granted.strip_suffix('*') {
        Some(prefix) if prefix.ends_with(':') => required.starts_with(prefix),
        _ => false,
    }
}
