//! Client identities attached to a request.

use serde::{Deserialize, Serialize};

/// An authenticated identity: the scheme that vouched for it and the id it
/// produced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Id {
    pub scheme: String,
    pub id: String,
}

impl Id {
    pub fn new(scheme: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.scheme, self.id)
    }
}

/// Comma-separated user ids for audit logging, or `None` if there are none.
///
/// The scheme is dropped and ids are not escaped, so an id containing a comma
/// is indistinguishable from two ids. This is a log convenience, not an
/// access-control input.
pub fn audit_users(auth_info: &[Id]) -> Option<String> {
    let users: Vec<&str> = auth_info
        .iter()
        .map(|id| id.id.as_str())
        .filter(|user| !user.is_empty())
        .collect();
    if users.is_empty() {
        None
    } else {
        Some(users.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_ids_in_order() {
        let auth = vec![
            Id::new("digest", "alice"),
            Id::new("ip", "10.0.0.1"),
            Id::new("sasl", "bob@EXAMPLE"),
        ];
        assert_eq!(
            audit_users(&auth).as_deref(),
            Some("alice,10.0.0.1,bob@EXAMPLE")
        );
    }

    #[test]
    fn empty_lists_report_nothing() {
        assert_eq!(audit_users(&[]), None);
        assert_eq!(audit_users(&[Id::new("digest", "")]), None);
    }

    #[test]
    fn separators_are_not_escaped() {
        let auth = vec![Id::new("digest", "a,b")];
        assert_eq!(audit_users(&auth).as_deref(), Some("a,b"));
    }
}
