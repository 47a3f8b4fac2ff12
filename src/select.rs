//! Choosing which rules a removal targets.

use crate::error::HbaError;
use crate::rule::RuleWithLine;
use std::fmt;

/// What to remove: one rule by index, or every rule matching a user or an
/// address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalCriteria {
    Index(usize),
    User { user: String, database: String },
    Address(String),
}

impl RemovalCriteria {
    /// Build criteria from the raw remove options, rejecting illegal mixes.
    ///
    /// Values are trimmed; blank strings count as absent.
    pub fn from_options(
        index: Option<usize>,
        user: Option<&str>,
        database: Option<&str>,
        address: Option<&str>,
    ) -> Result<Self, HbaError> {
        let user = user.map(str::trim).filter(|s| !s.is_empty());
        let address = address.map(str::trim).filter(|s| !s.is_empty());
        let database = database.map(str::trim).unwrap_or_default();

        match (index, user, address) {
            (Some(0), _, _) => Err(HbaError::InvalidCriteria(
                "index must be >= 1".to_string(),
            )),
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => Err(HbaError::InvalidCriteria(
                "use either an index or user/address criteria, not both".to_string(),
            )),
            (None, Some(_), Some(_)) => Err(HbaError::InvalidCriteria(
                "use only one of user or address per run".to_string(),
            )),
            (Some(index), None, None) => Ok(RemovalCriteria::Index(index)),
            (None, Some(user), None) => Ok(RemovalCriteria::User {
                user: user.to_string(),
                database: database.to_string(),
            }),
            (None, None, Some(address)) => Ok(RemovalCriteria::Address(address.to_string())),
            (None, None, None) => Err(HbaError::InvalidCriteria(
                "specify an index, a user (optionally with a database), or an address".to_string(),
            )),
        }
    }

    /// Rules to remove, in file order. Never empty on success.
    pub fn select<'a>(&self, rules: &'a [RuleWithLine]) -> Result<Vec<&'a RuleWithLine>, HbaError> {
        let selected: Vec<&RuleWithLine> = match self {
            RemovalCriteria::Index(index) => {
                return rules
                    .iter()
                    .find(|r| r.index == *index)
                    .map(|r| vec![r])
                    .ok_or(HbaError::NoRuleAtIndex {
                        index: *index,
                        total: rules.len(),
                    });
            }
            RemovalCriteria::User { user, database } => rules
                .iter()
                .filter(|r| r.rule.matches_user(user, database))
                .collect(),
            RemovalCriteria::Address(address) => rules
                .iter()
                .filter(|r| r.rule.matches_address(address))
                .collect(),
        };

        if selected.is_empty() {
            return Err(HbaError::NoMatchingRules {
                criteria: self.to_string(),
            });
        }
        Ok(selected)
    }
}

impl fmt::Display for RemovalCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemovalCriteria::Index(index) => write!(f, "index {index}"),
            RemovalCriteria::User { user, database } if database.is_empty() => {
                write!(f, "user {user:?}")
            }
            RemovalCriteria::User { user, database } => write!(f, "user {user:?} db {database:?}"),
            RemovalCriteria::Address(address) => write!(f, "addr {address:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::parse_str_with_line_numbers;

    const FILE: &str = "\
# header
local all all trust
host all app 10.0.1.7/32 md5

host sales app 10.0.1.8/32 md5
host all ops 10.0.1.7 255.255.255.255 trust
";

    #[test]
    fn test_from_options_combinations() {
        assert_eq!(
            RemovalCriteria::from_options(Some(2), None, None, None).unwrap(),
            RemovalCriteria::Index(2)
        );
        assert_eq!(
            RemovalCriteria::from_options(None, Some(" app "), Some("sales"), None).unwrap(),
            RemovalCriteria::User {
                user: "app".into(),
                database: "sales".into()
            }
        );
        assert!(RemovalCriteria::from_options(Some(0), None, None, None).is_err());
        assert!(RemovalCriteria::from_options(Some(1), Some("app"), None, None).is_err());
        assert!(RemovalCriteria::from_options(None, Some("app"), None, Some("10.0.0.1")).is_err());
        assert!(RemovalCriteria::from_options(None, Some("  "), None, None).is_err());
    }

    #[test]
    fn test_select_by_index() {
        let rules = parse_str_with_line_numbers(FILE);
        let selected = RemovalCriteria::Index(3).select(&rules).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].line_no, 5);

        let err = RemovalCriteria::Index(9).select(&rules).unwrap_err();
        assert!(matches!(err, HbaError::NoRuleAtIndex { index: 9, total: 4 }));
    }

    #[test]
    fn test_select_by_user_and_database() {
        let rules = parse_str_with_line_numbers(FILE);
        let all_app = RemovalCriteria::User {
            user: "app".into(),
            database: String::new(),
        };
        let lines: Vec<usize> = all_app.select(&rules).unwrap().iter().map(|r| r.line_no).collect();
        assert_eq!(lines, vec![3, 5]);

        let sales_only = RemovalCriteria::User {
            user: "app".into(),
            database: "sales".into(),
        };
        let lines: Vec<usize> = sales_only.select(&rules).unwrap().iter().map(|r| r.line_no).collect();
        assert_eq!(lines, vec![5]);
    }

    #[test]
    fn test_select_by_address_matches_both_forms() {
        let rules = parse_str_with_line_numbers(FILE);
        let lines: Vec<usize> = RemovalCriteria::Address("10.0.1.7".into())
            .select(&rules)
            .unwrap()
            .iter()
            .map(|r| r.line_no)
            .collect();
        assert_eq!(lines, vec![3, 6]);
    }

    #[test]
    fn test_select_no_match() {
        let rules = parse_str_with_line_numbers(FILE);
        let err = RemovalCriteria::Address("192.168.0.1".into())
            .select(&rules)
            .unwrap_err();
        assert_eq!(err.to_string(), "no rules matching addr \"192.168.0.1\"");
    }
}
