//! [`Filter`]: one event-matcher rule, and the ordered set a channel holds of them (§3
//! "Filter (event matcher rule)").

use notisync_wire::EventName;
use regex::Regex;

/// One rule a listener's filter sequence can be built from.
///
/// `NamePrefix` matches component-wise, the same unit [`EventName::has_prefix`] already uses
/// for request/reply name relationships. `NameRegex` matches against the name rendered the
/// way [`EventName`]'s `Display` impl renders it (`/s/e/a/1`), since the original config
/// schema's `filter` rule is written as a single string pattern, not a per-component one.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Filter {
    /// Match any name with this component-wise prefix.
    NamePrefix(EventName),
    /// Match any name whose rendered form matches this regular expression.
    NameRegex(Regex),
}

impl Filter {
    /// True iff `name` satisfies this one rule.
    pub fn matches(&self, name: &EventName) -> bool {
        match self {
            Filter::NamePrefix(prefix) => name.has_prefix(prefix),
            Filter::NameRegex(re) => re.is_match(&name.to_string()),
        }
    }
}

impl PartialEq for Filter {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Filter::NamePrefix(a), Filter::NamePrefix(b)) => a == b,
            (Filter::NameRegex(a), Filter::NameRegex(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl Eq for Filter {}

/// An ordered sequence of [`Filter`] rules. Matching semantics are **OR** across every rule;
/// an empty sequence matches everything (§3).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    rules: Vec<Filter>,
}

impl FilterSet {
    /// A filter set with no rules, matching every name.
    pub fn match_all() -> Self {
        FilterSet::default()
    }

    /// A filter set holding `rules`, in order.
    pub fn new(rules: Vec<Filter>) -> Self {
        FilterSet { rules }
    }

    /// This set's rules.
    pub fn rules(&self) -> &[Filter] {
        &self.rules
    }

    /// True iff `self.rules()` is empty.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// True iff the rule set is empty, or `name` satisfies at least one rule.
    pub fn matches(&self, name: &EventName) -> bool {
        self.rules.is_empty() || self.rules.iter().any(|rule| rule.matches(name))
    }
}
