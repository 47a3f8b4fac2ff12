//! Display ordering for listed rules.
//!
//! pg_hba.conf is first-match-wins, so these sorts only ever apply to
//! in-memory copies shown to the user.

use crate::error::HbaError;
use crate::rule::{Rule, RuleWithLine};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Type,
    Database,
    User,
    Address,
    Method,
}

impl SortColumn {
    pub const ALL: [SortColumn; 5] = [
        SortColumn::Type,
        SortColumn::Database,
        SortColumn::User,
        SortColumn::Address,
        SortColumn::Method,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortColumn::Type => "type",
            SortColumn::Database => "database",
            SortColumn::User => "user",
            SortColumn::Address => "address",
            SortColumn::Method => "method",
        }
    }

    /// The field of `rule` this column orders by.
    pub fn key(self, rule: &Rule) -> &str {
        match self {
            SortColumn::Type => &rule.kind,
            SortColumn::Database => &rule.database,
            SortColumn::User => &rule.user,
            SortColumn::Address => &rule.address,
            SortColumn::Method => &rule.method,
        }
    }

    /// Stable sort by this column.
    pub fn sort<T: AsRef<Rule>>(self, items: &mut [T]) {
        items.sort_by(|a, b| self.key(a.as_ref()).cmp(self.key(b.as_ref())));
    }
}

impl fmt::Display for SortColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortColumn {
    type Err = HbaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| HbaError::InvalidSortColumn(s.to_string()))
    }
}

pub fn valid_sort_column(name: &str) -> bool {
    name.parse::<SortColumn>().is_ok()
}

/// Sort by column name; an unknown name leaves `rules` as they are.
pub fn sort_rules(rules: &mut [Rule], column: &str) {
    if let Ok(column) = column.parse::<SortColumn>() {
        column.sort(rules);
    }
}

/// Same as [`sort_rules`], keeping each rule's index and line number.
pub fn sort_rules_with_line(rules: &mut [RuleWithLine], column: &str) {
    if let Ok(column) = column.parse::<SortColumn>() {
        column.sort(rules);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::parse_str_with_line_numbers;

    const FILE: &str = "\
host all zed 10.0.0.3/32 md5
local all amy trust
host db2 bob 10.0.0.1/32 md5
host db1 bob 10.0.0.2/32 trust
";

    #[test]
    fn test_valid_sort_column() {
        for name in ["type", "database", "user", "address", "method"] {
            assert!(valid_sort_column(name));
        }
        assert!(!valid_sort_column("netmask"));
        assert!(!valid_sort_column("User"));
    }

    #[test]
    fn test_sort_by_user_is_stable() {
        let mut rules = parse_str_with_line_numbers(FILE);
        sort_rules_with_line(&mut rules, "user");
        let order: Vec<(usize, &str)> = rules
            .iter()
            .map(|r| (r.index, r.rule.user.as_str()))
            .collect();
        assert_eq!(order, vec![(2, "amy"), (3, "bob"), (4, "bob"), (1, "zed")]);
    }

    #[test]
    fn test_sort_rules_by_method() {
        let mut rules = crate::reader::parse_str(FILE);
        sort_rules(&mut rules, "method");
        let methods: Vec<&str> = rules.iter().map(|r| r.method.as_str()).collect();
        assert_eq!(methods, vec!["md5", "md5", "trust", "trust"]);
        assert_eq!(rules[0].user, "zed");
    }

    #[test]
    fn test_unknown_column_is_noop() {
        let mut rules = crate::reader::parse_str(FILE);
        let before = rules.clone();
        sort_rules(&mut rules, "bogus");
        assert_eq!(rules, before);
    }
}
