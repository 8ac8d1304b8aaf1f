//! Configured search entries and their inline overrides.
//!
//! An entry is plain query text, optionally prefixed to narrow it:
//!
//! - `CA|water rights` searches California only
//! - `75|water rights` keeps results above relevance 75
//! - `CA,75|water rights` does both
//!
//! A state prefix always needs the `|`, so a query that merely starts with
//! two letters is left alone.

/// State value searching every jurisdiction.
pub const ALL_STATES: &str = "ALL";

/// One search as it will be sent, after overrides are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPlan {
    pub state: String,
    pub query: String,
    /// Results at or below this relevance are ignored and end paging.
    pub relevance: i64,
}

impl SearchPlan {
    /// Resolve `entry` against the pass defaults.
    pub fn parse(entry: &str, state: &str, relevance: i64) -> Self {
        let mut plan = Self { state: state.to_string(), query: entry.trim().to_string(), relevance };

        if let Some((abbr, rest)) = split_state(&plan.query) {
            plan.state = abbr;
            plan.query = rest;
        }
        if let Some((cutoff, rest)) = split_relevance(&plan.query) {
            plan.relevance = cutoff;
            plan.query = rest;
        }
        plan
    }
}

/// `XX|rest` or `XX,NN|rest`, returning the state and `rest` (or `NN|rest`).
fn split_state(entry: &str) -> Option<(String, String)> {
    let abbr = entry.get(..2)?;
    if !abbr.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let mut rest = entry[2..].trim_start();
    let mut digits = "";
    if let Some(after_comma) = rest.strip_prefix(',') {
        let after_comma = after_comma.trim_start();
        let end = after_comma.find(|c: char| !c.is_ascii_digit()).unwrap_or(after_comma.len());
        if end == 0 {
            return None;
        }
        digits = &after_comma[..end];
        rest = after_comma[end..].trim_start();
    }

    let query = rest.strip_prefix('|')?;
    if query.is_empty() {
        return None;
    }
    let query = if digits.is_empty() { query.to_string() } else { format!("{digits}|{query}") };
    Some((abbr.to_uppercase(), query))
}

/// `NN|rest`, returning the cutoff and the trimmed query.
fn split_relevance(entry: &str) -> Option<(i64, String)> {
    let end = entry.find(|c: char| !c.is_ascii_digit()).unwrap_or(entry.len());
    if end == 0 {
        return None;
    }
    let cutoff = entry[..end].parse().ok()?;
    let query = entry[end..].trim_start().strip_prefix('|')?;
    Some((cutoff, query.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_query_keeps_defaults() {
        let plan = SearchPlan::parse("  water rights ", "CA", 50);
        assert_eq!(plan, SearchPlan { state: "CA".into(), query: "water rights".into(), relevance: 50 });
    }

    #[test]
    fn test_state_override() {
        let plan = SearchPlan::parse("tx|groundwater", ALL_STATES, 0);
        assert_eq!(plan.state, "TX");
        assert_eq!(plan.query, "groundwater");
        assert_eq!(plan.relevance, 0);
    }

    #[test]
    fn test_relevance_override() {
        let plan = SearchPlan::parse("75 | water rights", "NY", 10);
        assert_eq!(plan.state, "NY");
        assert_eq!(plan.query, "water rights");
        assert_eq!(plan.relevance, 75);
    }

    #[test]
    fn test_state_and_relevance_override() {
        let plan = SearchPlan::parse("CA , 90 |drought", ALL_STATES, 0);
        assert_eq!(plan, SearchPlan { state: "CA".into(), query: "drought".into(), relevance: 90 });
    }

    #[test]
    fn test_query_starting_with_letters_untouched() {
        let plan = SearchPlan::parse("water|power", "CA", 0);
        assert_eq!(plan.query, "water|power");
        assert_eq!(plan.state, "CA");

        let plan = SearchPlan::parse("CA,|water", "NY", 0);
        assert_eq!(plan.state, "NY");
        assert_eq!(plan.query, "CA,|water");
    }
}
