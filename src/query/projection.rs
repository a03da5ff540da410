//! Projection normalizer.
//!
//! Document stores reject projections that name both a path and one of its
//! descendants (`a` and `a.b`). The parent already decides the child, so the
//! more specific path is pruned with a warning.

use std::collections::{BTreeMap, HashSet};

use tracing::warn;

/// Field path to include (`true`) or exclude (`false`).
pub type Projection = BTreeMap<String, bool>;

/// Remove every path that has an ancestor path in the same projection.
pub fn fix(projection: Projection) -> Projection {
    let keys: HashSet<String> = projection.keys().cloned().collect();
    projection
        .into_iter()
        .filter(|(path, _)| match ancestors(path).find(|a| keys.contains(*a)) {
            Some(ancestor) => {
                warn!(path = %path, ancestor, "pruning projection path covered by its ancestor");
                false
            }
            None => true,
        })
        .collect()
}

/// Whether any proper ancestor of `path` is a key of `projection`.
pub fn has_ancestor(projection: &Projection, path: &str) -> bool {
    ancestors(path).any(|a| projection.contains_key(a))
}

/// Whether the projection selects fields rather than only excluding them.
pub fn is_inclusion(projection: &Projection) -> bool {
    projection.values().any(|include| *include)
}

/// Parse a select string (`"title -body +author.name"`, spaces or commas).
pub fn parse_select(select: &str) -> Projection {
    select_tokens(select)
        .map(|token| {
            let (field, include) = split_token(token);
            (field.to_string(), include)
        })
        .filter(|(field, _)| !field.is_empty())
        .collect()
}

/// Deduplicate select tokens (first occurrence wins), prune tokens covered by
/// an ancestor token, and rejoin them in their original order.
pub fn normalize_select(select: &str) -> String {
    let mut seen = HashSet::new();
    let tokens: Vec<&str> = select_tokens(select)
        .filter(|token| {
            let field = split_token(token).0;
            !field.is_empty() && seen.insert(field)
        })
        .collect();

    tokens
        .iter()
        .filter(|token| {
            let field = split_token(token).0;
            match ancestors(field).find(|a| seen.contains(a)) {
                Some(ancestor) => {
                    warn!(field, ancestor, "pruning select field covered by its ancestor");
                    false
                }
                None => true,
            }
        })
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Proper ancestors of a dotted path, nearest last: `a.b.c` yields `a`, `a.b`.
pub fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('.').map(move |(i, _)| &path[..i])
}

fn select_tokens(select: &str) -> impl Iterator<Item = &str> {
    select
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
}

fn split_token(token: &str) -> (&str, bool) {
    if let Some(field) = token.strip_prefix('-') {
        (field, false)
    } else {
        (token.strip_prefix('+').unwrap_or(token), true)
    }
}
