//! Read-only gate for free-form SQL.
//!
//! This is a denylist, not a parser. It rejects statements that name a
//! mutating or administrative verb as a standalone word, that contain more
//! than one `;`-separated statement, or that do not start with `SELECT`.
//! Anything that slips past those three literal checks (comments hiding a
//! second statement, stored functions with side effects, ...) is not caught
//! here; the database account's own privileges are the real boundary.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

/// Verbs that may never appear as a standalone word in a free-form query.
pub const FORBIDDEN_OPERATIONS: [&str; 14] = [
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "TRUNCATE", "EXEC", "EXECUTE",
    "MERGE", "GRANT", "REVOKE", "COMMIT", "ROLLBACK",
];

static FORBIDDEN_PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();

fn forbidden_patterns() -> &'static [(&'static str, Regex)] {
    FORBIDDEN_PATTERNS.get_or_init(|| {
        FORBIDDEN_OPERATIONS
            .iter()
            .map(|op| {
                let pattern = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(op)))
                    .expect("forbidden operation pattern is a valid regex");
                (*op, pattern)
            })
            .collect()
    })
}

/// The rule a rejected query violated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A forbidden verb appears as a whole word.
    ForbiddenOperation(&'static str),
    /// More than one non-empty `;`-separated statement.
    MultipleStatements,
    /// The trimmed query does not begin with `SELECT`.
    NotSelect,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::ForbiddenOperation(op) => write!(
                f,
                "Forbidden operation detected: {}. Only SELECT queries are allowed.",
                op
            ),
            Violation::MultipleStatements => write!(
                f,
                "Multiple SQL statements are not allowed. Only single SELECT queries permitted."
            ),
            Violation::NotSelect => write!(f, "Only SELECT queries are allowed."),
        }
    }
}

impl std::error::Error for Violation {}

/// Serializable verdict, `{valid, error}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SqlValidation {
    pub valid: bool,
    pub error: Option<String>,
}

impl From<Result<(), Violation>> for SqlValidation {
    fn from(result: Result<(), Violation>) -> Self {
        match result {
            Ok(()) => Self { valid: true, error: None },
            Err(violation) => Self {
                valid: false,
                error: Some(violation.to_string()),
            },
        }
    }
}

/// Check a query against the read-only rules, in order. The first violation wins.
pub fn check_query(query: &str) -> Result<(), Violation> {
    if let Some((op, _)) = forbidden_patterns()
        .iter()
        .find(|(_, pattern)| pattern.is_match(query))
    {
        return Err(Violation::ForbiddenOperation(op));
    }

    let statements = query
        .trim()
        .split(';')
        .filter(|fragment| !fragment.trim().is_empty())
        .count();
    if statements > 1 {
        return Err(Violation::MultipleStatements);
    }

    if !query.trim().to_uppercase().starts_with("SELECT") {
        return Err(Violation::NotSelect);
    }

    Ok(())
}

/// Validate a query and return the `{valid, error}` verdict.
pub fn validate_sql_security(query: &str) -> SqlValidation {
    check_query(query).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_select_passes() {
        assert_eq!(check_query("SELECT * FROM sales WHERE org_id = 'org_123'"), Ok(()));
        assert_eq!(
            check_query("  select name, email from users where created_at > '2024-01-01'"),
            Ok(())
        );
    }

    #[test]
    fn test_every_forbidden_verb_is_named() {
        for op in FORBIDDEN_OPERATIONS {
            let query = format!("SELECT 1; {} something", op.to_lowercase());
            assert_eq!(check_query(&query), Err(Violation::ForbiddenOperation(op)));
            let verdict = validate_sql_security(&query);
            assert!(!verdict.valid);
            assert!(verdict.error.unwrap().contains(op));
        }
    }

    #[test]
    fn test_verb_inside_identifier_is_allowed() {
        assert_eq!(check_query("SELECT inserted_at, updated_by FROM orders"), Ok(()));
        assert_eq!(check_query("SELECT created_date, dropped FROM t"), Ok(()));
        assert_eq!(check_query("SELECT * FROM t WHERE col_delete_flag = 0"), Ok(()));
    }

    #[test]
    fn test_forbidden_verb_in_select_is_rejected() {
        assert_eq!(
            check_query("SELECT * FROM users WHERE note = 'please delete me'"),
            Err(Violation::ForbiddenOperation("DELETE"))
        );
    }

    #[test]
    fn test_multiple_statements_rejected() {
        assert_eq!(
            check_query("SELECT 1; SELECT 2"),
            Err(Violation::MultipleStatements)
        );
    }

    #[test]
    fn test_stacked_drop_reports_verb_first() {
        assert_eq!(
            check_query("SELECT * FROM users; DROP TABLE users;"),
            Err(Violation::ForbiddenOperation("DROP"))
        );
    }

    #[test]
    fn test_trailing_semicolon_allowed() {
        assert_eq!(check_query("SELECT 1;"), Ok(()));
        assert_eq!(check_query("SELECT 1 ;  ;  "), Ok(()));
    }

    #[test]
    fn test_non_select_rejected() {
        assert_eq!(check_query("SHOW TABLES"), Err(Violation::NotSelect));
        assert_eq!(check_query("WITH x AS (SELECT 1) SELECT * FROM x"), Err(Violation::NotSelect));
        let verdict = validate_sql_security("DESCRIBE users");
        assert_eq!(verdict.error.as_deref(), Some("Only SELECT queries are allowed."));
    }

    #[test]
    fn test_exec_rejected() {
        assert_eq!(
            check_query("EXEC sp_executesql N'SELECT * FROM users'"),
            Err(Violation::ForbiddenOperation("EXEC"))
        );
    }
}
