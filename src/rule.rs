use crate::error::HbaError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Connection type keyword in the first column of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionType {
    Local,
    Host,
    HostSsl,
    HostNoSsl,
    HostGssEnc,
    HostNoGssEnc,
}

impl ConnectionType {
    pub const ALL: [ConnectionType; 6] = [
        ConnectionType::Local,
        ConnectionType::Host,
        ConnectionType::HostSsl,
        ConnectionType::HostNoSsl,
        ConnectionType::HostGssEnc,
        ConnectionType::HostNoGssEnc,
    ];

    /// Case-insensitive keyword lookup.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(keyword))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionType::Local => "local",
            ConnectionType::Host => "host",
            ConnectionType::HostSsl => "hostssl",
            ConnectionType::HostNoSsl => "hostnossl",
            ConnectionType::HostGssEnc => "hostgssenc",
            ConnectionType::HostNoGssEnc => "hostnogssenc",
        }
    }

    /// Local rules carry no address column.
    pub fn is_local(self) -> bool {
        self == ConnectionType::Local
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionType {
    type Err = HbaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_keyword(s).ok_or_else(|| HbaError::InvalidRuleType(s.to_string()))
    }
}

/// One entry in pg_hba.conf.
///
/// Order matters: PostgreSQL applies the first rule that matches a
/// connection, so nothing here reorders rules on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Rule {
    /// Connection type keyword, lowercased by the parser
    #[serde(rename = "type")]
    pub kind: String,
    /// Database name, or `all`, `sameuser`, `samerole`, `replication`
    pub database: String,
    /// User name, `all`, or a `+group`
    pub user: String,
    /// CIDR, bare IP (legacy form), `samehost`, `samenet`; `-` for local
    pub address: String,
    /// Legacy netmask; empty when the address uses CIDR notation
    pub netmask: String,
    /// Auth method, possibly followed by space-joined options
    pub method: String,
}

impl Rule {
    pub fn connection_type(&self) -> Result<ConnectionType, HbaError> {
        self.kind.parse()
    }

    /// Render the rule as a single tab-separated pg_hba.conf line, without a
    /// trailing newline.
    pub fn line(&self) -> Result<String, HbaError> {
        let kind = self.connection_type()?;
        let database = quote_field(&self.database);
        let user = quote_field(&self.user);

        if kind.is_local() {
            return Ok(format!(
                "{}\t{}\t{}\t{}",
                self.kind, database, user, self.method
            ));
        }

        let address = quote_field(&self.address);
        if self.netmask.is_empty() {
            Ok(format!(
                "{}\t{}\t{}\t{}\t{}",
                self.kind, database, user, address, self.method
            ))
        } else {
            Ok(format!(
                "{}\t{}\t{}\t{}\t{}\t{}",
                self.kind, database, user, address, self.netmask, self.method
            ))
        }
    }

    /// Exact user match, narrowed by database when `db` is non-empty.
    ///
    /// An empty `user` never matches, so an empty criterion cannot select
    /// every rule in the file.
    pub fn matches_user(&self, user: &str, db: &str) -> bool {
        if user.is_empty() || self.user != user {
            return false;
        }
        db.is_empty() || self.database == db
    }

    /// Address match treating a bare address and its `/32` form as equal.
    pub fn matches_address(&self, addr: &str) -> bool {
        if self.address == addr {
            return true;
        }
        if !addr.contains('/') && self.address == format!("{addr}/32") {
            return true;
        }
        match addr.strip_suffix("/32") {
            Some(bare) => self.address == bare,
            None => false,
        }
    }
}

impl AsRef<Rule> for Rule {
    fn as_ref(&self) -> &Rule {
        self
    }
}

/// A parsed rule tied to its position in one snapshot of the file.
///
/// Only valid for the snapshot it was read from; re-read before using
/// `line_no` to edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleWithLine {
    /// 1-based ordinal among parsed rules
    pub index: usize,
    /// 1-based physical line number
    pub line_no: usize,
    #[serde(flatten)]
    pub rule: Rule,
}

impl AsRef<Rule> for RuleWithLine {
    fn as_ref(&self) -> &Rule {
        &self.rule
    }
}

// Fields holding whitespace or '#' would split or truncate on re-read.
fn quote_field(value: &str) -> std::borrow::Cow<'_, str> {
    if value.contains(|c: char| c == ' ' || c == '\t' || c == '#') {
        format!("\"{value}\"").into()
    } else {
        value.into()
    }
}
