//! Query Classification
//!
//! Decides whether a statement may be served by a replica.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Read/write label for a SQL statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    /// Plain SELECT, eligible for replicas
    Read,
    /// Anything that mutates or locks; primary only
    Write,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Read => "read",
            QueryType::Write => "write",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a statement.
///
/// A SELECT is a read unless it takes row locks (`FOR UPDATE` / `FOR SHARE`).
/// Everything else, including empty input, is a write.
pub fn classify(query: &str) -> QueryType {
    let upper = query.trim().to_uppercase();

    if upper.starts_with("SELECT") {
        if upper.contains("FOR UPDATE") || upper.contains("FOR SHARE") {
            return QueryType::Write;
        }
        return QueryType::Read;
    }

    QueryType::Write
}
