//! Content filter
//!
//! Stateless deny-list predicate over message text. Terms come from
//! immutable configuration; members holding a bypass role are exempt
//! before any text is inspected.

use std::collections::HashSet;

/// Case-insensitive substring filter with role-based bypass
///
/// Holds no mutable state, so a single instance is shared across all
/// concurrently handled messages.
#[derive(Debug, Clone)]
pub struct ContentFilter {
    /// Configured spelling, kept for reporting
    terms: Vec<String>,
    /// Lowercased shadow of `terms`, index-aligned
    terms_folded: Vec<String>,
    bypass_roles: HashSet<String>,
}

impl ContentFilter {
    #[must_use]
    pub fn new(terms: Vec<String>, bypass_roles: HashSet<String>) -> Self {
        let terms_folded = terms.iter().map(|t| t.to_lowercase()).collect();
        Self {
            terms,
            terms_folded,
            bypass_roles,
        }
    }

    /// First denied term found in `text`, in deny-list order
    ///
    /// Returns `None` unconditionally when the member holds any bypass
    /// role. Matching is case-insensitive substring containment.
    #[must_use]
    pub fn matches(&self, text: &str, member_roles: &[String]) -> Option<&str> {
        if member_roles.iter().any(|r| self.bypass_roles.contains(r)) {
            return None;
        }

        let folded = text.to_lowercase();
        self.terms_folded
            .iter()
            .position(|term| folded.contains(term))
            .map(|i| self.terms[i].as_str())
    }

    /// Whether any terms are configured at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}
