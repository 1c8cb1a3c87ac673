//! Query Validation
//!
//! Lexical checks applied before anything reaches the router. These are
//! heuristics over raw text, not a SQL parser: a semicolon inside a string
//! literal is rejected, and comment tricks are not detected.

use std::fmt;

use regex::{Regex, RegexBuilder};

use crate::config::GatewayConfig;
use crate::error::{Error, Result};

/// Operations that never pass the gateway
pub const DEFAULT_BLOCKED_PATTERNS: &[&str] = &[
    r"\bDROP\s+(TABLE|DATABASE|INDEX|VIEW|TRIGGER|PROCEDURE|FUNCTION)\b",
    r"\bALTER\s+(TABLE|DATABASE)\b",
    r"\bCREATE\s+(TABLE|DATABASE|INDEX|VIEW|TRIGGER|PROCEDURE|FUNCTION)\b",
    r"\bTRUNCATE\s+TABLE\b",
    r"\bGRANT\b",
    r"\bREVOKE\b",
    r"\bLOAD_FILE\s*\(",
    r"\bINTO\s+(OUTFILE|DUMPFILE)\b",
    r"\bSHUTDOWN\b",
];

/// Why a query was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    TooLong { max: usize },
    Empty,
    MultipleStatements,
    /// Carries the matched operation, normalized (`DROP TABLE`)
    Blocked { operation: String },
}

impl Rejection {
    /// Stable machine-readable reason code
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::TooLong { .. } => "too_long",
            Rejection::Empty => "empty",
            Rejection::MultipleStatements => "multiple_statements",
            Rejection::Blocked { .. } => "blocked",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::TooLong { max } => write!(f, "Query too long (max {} characters)", max),
            Rejection::Empty => f.write_str("Empty query"),
            Rejection::MultipleStatements => f.write_str("Multiple statements not allowed"),
            Rejection::Blocked { operation } => {
                write!(f, "Blocked operation detected: {}", operation)
            }
        }
    }
}

/// Ordered, short-circuiting query checks
#[derive(Debug, Clone)]
pub struct QueryValidator {
    max_length: usize,
    blocked: Vec<Regex>,
}

impl QueryValidator {
    /// Build a validator from case-insensitive regex patterns
    pub fn new<S: AsRef<str>>(max_length: usize, patterns: &[S]) -> Result<Self> {
        let blocked = patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p.as_ref())
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| Error::Config(format!("invalid blocked pattern '{}': {}", p.as_ref(), e)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            max_length,
            blocked,
        })
    }

    /// Validator with the built-in blocklist
    pub fn with_default_blocklist(max_length: usize) -> Result<Self> {
        Self::new(max_length, DEFAULT_BLOCKED_PATTERNS)
    }

    /// Validator for the gateway configuration; a configured blocklist
    /// replaces the built-in one
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        match &config.blocked_patterns {
            Some(patterns) => Self::new(config.max_query_length, patterns.as_slice()),
            None => Self::with_default_blocklist(config.max_query_length),
        }
    }

    pub fn validate(&self, query: &str) -> std::result::Result<(), Rejection> {
        if query.chars().count() > self.max_length {
            return Err(Rejection::TooLong {
                max: self.max_length,
            });
        }

        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(Rejection::Empty);
        }

        let body = trimmed.strip_suffix(';').unwrap_or(trimmed);
        if body.contains(';') {
            return Err(Rejection::MultipleStatements);
        }

        if let Some(found) = self.blocked.iter().find_map(|re| re.find(query)) {
            return Err(Rejection::Blocked {
                operation: normalize_operation(found.as_str()),
            });
        }

        Ok(())
    }
}

/// Uppercase and collapse whitespace: "drop\n  table" -> "DROP TABLE"
fn normalize_operation(matched: &str) -> String {
    matched
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> QueryValidator {
        QueryValidator::with_default_blocklist(10_000).unwrap()
    }

    #[test]
    fn test_accepts_ordinary_queries() {
        let v = validator();
        assert!(v.validate("SELECT 1").is_ok());
        assert!(v.validate("SELECT 1;").is_ok());
        assert!(v.validate("  SELECT * FROM sakila.actor WHERE actor_id = 4;  ").is_ok());
        assert!(v.validate("INSERT INTO t (a) VALUES (?)").is_ok());
        // word boundaries: column names containing keywords are fine
        assert!(v.validate("SELECT granted_at, dropped_tables FROM audit").is_ok());
    }

    #[test]
    fn test_rejects_multiple_statements() {
        let v = validator();
        assert_eq!(v.validate("SELECT 1; SELECT 2"), Err(Rejection::MultipleStatements));
        assert_eq!(v.validate("SELECT 1;;"), Err(Rejection::MultipleStatements));
        // lexical heuristic: semicolons inside literals are refused too
        assert_eq!(
            v.validate("SELECT * FROM t WHERE name = 'a;b'"),
            Err(Rejection::MultipleStatements)
        );
    }

    #[test]
    fn test_rejects_empty() {
        let v = validator();
        assert_eq!(v.validate(""), Err(Rejection::Empty));
        assert_eq!(v.validate(" \n\t "), Err(Rejection::Empty));
    }

    #[test]
    fn test_length_checked_first() {
        let v = QueryValidator::with_default_blocklist(10).unwrap();
        let err = v.validate("DROP TABLE a; DROP TABLE b").unwrap_err();
        assert_eq!(err, Rejection::TooLong { max: 10 });
        assert_eq!(err.code(), "too_long");
        assert!(v.validate("SELECT 1;").is_ok());
    }

    #[test]
    fn test_length_boundary_counts_characters() {
        let v = QueryValidator::with_default_blocklist(12).unwrap();
        let exact = format!("SELECT {}", "1".repeat(5));
        assert_eq!(exact.chars().count(), 12);
        assert!(v.validate(&exact).is_ok());

        let over = format!("{} ", exact);
        let err = v.validate(&over).unwrap_err();
        assert_eq!(err, Rejection::TooLong { max: 12 });
        assert_eq!(err.code(), "too_long");

        // multi-byte characters count once each
        let accented = "SELECT 'é'  ";
        assert_eq!(accented.chars().count(), 12);
        assert!(v.validate(accented).is_ok());
    }

    #[test]
    fn test_blocklist_anywhere_any_case() {
        let v = validator();
        let cases = [
            ("DROP TABLE foo", "DROP TABLE"),
            ("drop   database shop", "DROP DATABASE"),
            ("SELECT 1 FROM dual WHERE 1 = 1 OR (drop\nindex)", "DROP INDEX"),
            ("ALTER TABLE t ADD c INT", "ALTER TABLE"),
            ("create view v as select 1", "CREATE VIEW"),
            ("TRUNCATE TABLE t", "TRUNCATE TABLE"),
            ("GRANT ALL ON *.* TO x", "GRANT"),
            ("revoke select on t from x", "REVOKE"),
            ("SELECT load_file ('/etc/passwd')", "LOAD_FILE ("),
            ("SELECT * FROM t INTO OUTFILE '/tmp/x'", "INTO OUTFILE"),
            ("SELECT 1 into dumpfile '/tmp/y'", "INTO DUMPFILE"),
            ("shutdown", "SHUTDOWN"),
        ];

        for (query, operation) in cases {
            let err = v.validate(query).unwrap_err();
            assert_eq!(
                err,
                Rejection::Blocked {
                    operation: operation.to_string()
                },
                "{}",
                query
            );
            assert_eq!(err.code(), "blocked");
        }
    }

    #[test]
    fn test_blocked_message_names_operation() {
        let err = validator().validate("DROP TABLE foo").unwrap_err();
        assert_eq!(err.to_string(), "Blocked operation detected: DROP TABLE");
    }

    #[test]
    fn test_configured_blocklist_replaces_default() {
        let config = GatewayConfig {
            blocked_patterns: Some(vec![r"\bDELETE\b".to_string()]),
            ..Default::default()
        };
        let v = QueryValidator::from_config(&config).unwrap();
        assert!(v.validate("DROP TABLE foo").is_ok());
        assert!(matches!(v.validate("delete from t"), Err(Rejection::Blocked { .. })));
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let err = QueryValidator::new(100, &["(unclosed"]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
