//! Text heuristics over policy predicates.
//!
//! These checks look at the predicate text only. They are best-effort: a
//! tautology hidden behind a function call is missed, and a predicate that
//! scopes rows through an unlisted helper is reported as missing user
//! context. Findings produced from them are WARN, never FAIL.

use std::sync::LazyLock;

use regex::Regex;

/// `... OR true`, `... OR 1=1`, `... OR 'a'='a'` anywhere in the predicate,
/// including the `OR (1 = 1)` form Postgres stores in `pg_policies.qual`.
static OR_TAUTOLOGY: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"\bor\s+\(*\s*(?:(true)\b|(\d+|'[^']*')\s*=\s*(\d+|'[^']*'))").ok()
});

/// Casts Postgres adds when it deparses a stored expression.
static CASTS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"::\s*(boolean|bool|text|integer|int)").ok());

/// Result of assessing one predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateVerdict {
    /// No predicate at all; every row is admitted.
    Missing,
    /// Always true.
    Tautology,
    /// Never references the caller identity.
    NoUserContext,
    /// Looks scoped to the caller.
    Scoped,
}

impl PredicateVerdict {
    /// Whether the predicate admits rows regardless of the caller.
    #[must_use]
    pub const fn is_permissive(self) -> bool {
        matches!(self, Self::Missing | Self::Tautology)
    }
}

/// Assesses a predicate against the identity markers.
pub fn assess_predicate(predicate: Option<&str>, context_markers: &[&str]) -> PredicateVerdict {
    let Some(raw) = predicate else {
        return PredicateVerdict::Missing;
    };
    let normalized = normalize(raw);
    if normalized.is_empty() {
        return PredicateVerdict::Missing;
    }
    if is_tautology(&normalized) {
        return PredicateVerdict::Tautology;
    }

    let lowered = raw.to_ascii_lowercase();
    let compact: String = lowered.chars().filter(|c| !c.is_whitespace()).collect();
    let scoped = context_markers.iter().any(|marker| {
        let marker: String = marker
            .to_ascii_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        compact.contains(&marker)
    });

    if scoped {
        PredicateVerdict::Scoped
    } else {
        PredicateVerdict::NoUserContext
    }
}

/// Lowercases, strips casts and redundant outer parentheses, collapses whitespace.
fn normalize(predicate: &str) -> String {
    let mut text = predicate.to_ascii_lowercase();
    if let Some(casts) = CASTS.as_ref() {
        text = casts.replace_all(&text, "").into_owned();
    }
    let mut text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    while let Some(inner) = strip_outer_parens(&text) {
        text = inner.trim().to_string();
    }
    text
}

fn strip_outer_parens(text: &str) -> Option<&str> {
    let inner = text.strip_prefix('(')?.strip_suffix(')')?;
    // Reject "(a) and (b)": the opening paren must close at the very end.
    let mut depth = 0i32;
    for c in inner.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            _ => {}
        }
    }
    (depth == 0).then_some(inner)
}

fn is_tautology(normalized: &str) -> bool {
    if matches!(normalized, "true" | "'t'" | "'true'" | "not false" | "1") {
        return true;
    }

    if let Some((left, right)) = normalized.split_once('=') {
        let (left, right) = (left.trim(), right.trim());
        if !right.contains('=') && is_literal(left) && left == right {
            return true;
        }
    }

    OR_TAUTOLOGY.as_ref().is_some_and(|re| {
        re.captures_iter(normalized).any(|caps| {
            caps.get(1).is_some()
                || matches!((caps.get(2), caps.get(3)), (Some(l), Some(r)) if l.as_str() == r.as_str())
        })
    })
}

fn is_literal(token: &str) -> bool {
    token.chars().all(|c| c.is_ascii_digit())
        || (token.len() >= 2 && token.starts_with('\'') && token.ends_with('\''))
}
