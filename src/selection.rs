//! The selection predicate (spec §4.6, component F).
//!
//! Consulted once, when a CCS is first created in [`crate::push`]; the
//! resulting bit is read later by a heap-profiling collaborator outside this
//! crate's scope.

use crate::cc::CostCentre;
use crate::ccs::CcsHandle;
use crate::config::ProfilerConfig;

/// `*`-only shell-glob match, case-sensitive, literal otherwise.
///
/// Grounded directly in spec §4.6's grammar ("a simple shell-glob-style
/// match (`*` wildcard, literal otherwise; case-sensitive)"); a crate like
/// `glob` is a poor fit here since cost-centre labels are not filesystem
/// paths, so this is hand-rolled against the pattern's bytes using the
/// standard two-pointer "star" backtracking algorithm, which handles any
/// number of `*`s without the exponential blowup of naive recursion.
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
    let p = pattern.as_bytes();
    let t = text.as_bytes();
    let (mut pi, mut ti) = (0usize, 0usize);
    let (mut star_p, mut star_t) = (None, 0usize);

    while ti < t.len() {
        if pi < p.len() && (p[pi] == b'*' || p[pi] == t[ti]) {
            if p[pi] == b'*' {
                star_p = Some(pi);
                star_t = ti;
                pi += 1;
            } else {
                pi += 1;
                ti += 1;
            }
        } else if let Some(sp) = star_p {
            pi = sp + 1;
            star_t += 1;
            ti = star_t;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == b'*' {
        pi += 1;
    }
    pi == p.len()
}

fn matches_selector(pattern: &Option<String>, value: &str) -> bool {
    match pattern {
        None => true,
        Some(p) => glob_match(p, value),
    }
}

/// Computes the `selected` bit for a CCS about to be created as a child of
/// `parent` carrying cost centre `own_cc` (spec §4.6).
pub(crate) fn compute_selected(
    config: &ProfilerConfig,
    own_cc: &CostCentre,
    parent: CcsHandle<'_>,
) -> bool {
    let sel = &config.selectors;

    if !matches_selector(&sel.module, own_cc.module()) {
        return false;
    }
    if !matches_selector(&sel.cost_centre, own_cc.label()) {
        return false;
    }
    if let Some(pattern) = &sel.ancestor_cost_centre {
        let mut matched = glob_match(pattern, own_cc.label());
        let mut ancestor = Some(parent);
        while !matched {
            let Some(node) = ancestor else { break };
            matched = glob_match(pattern, node.cc().label());
            ancestor = node.prev();
        }
        if !matched {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::glob_match;

    #[test]
    fn literal_match() {
        assert!(glob_match("foo", "foo"));
        assert!(!glob_match("foo", "foobar"));
    }

    #[test]
    fn trailing_star() {
        assert!(glob_match("foo*", "foobar"));
        assert!(glob_match("foo*", "foo"));
        assert!(!glob_match("foo*", "fo"));
    }

    #[test]
    fn leading_star() {
        assert!(glob_match("*bar", "foobar"));
        assert!(!glob_match("*bar", "foobaz"));
    }

    #[test]
    fn multiple_stars() {
        assert!(glob_match("*foo*bar*", "xxfooyybarzz"));
        assert!(!glob_match("*foo*bar*", "xxbarzz"));
    }

    #[test]
    fn whole_wildcard() {
        assert!(glob_match("*", "anything at all"));
        assert!(glob_match("*", ""));
    }

    #[test]
    fn case_sensitive() {
        assert!(!glob_match("Foo", "foo"));
    }
}
