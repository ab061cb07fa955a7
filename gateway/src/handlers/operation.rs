//! Filter operation codes and their comparison semantics
//!
//! Filters arrive with a short operation code (`eq`, `ct`, `bt`, `neq`). The
//! query layer downstream only cares about the comparison it has to perform,
//! so every code, known or not, resolves to exactly one [`Comparison`].
//!
//! # Example
//!
//! ```rust
//! use handler_gateway::handlers::{Comparison, Operation};
//!
//! assert_eq!(Operation::parse("bt").comparison(), Comparison::Range);
//! assert_eq!(Operation::parse("whatever").comparison(), Comparison::Equals);
//! assert_eq!(Comparison::PatternMatch.as_str(), "pattern-match");
//! ```

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Operation requested by a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Operation {
    /// `eq`
    #[default]
    Equals,
    /// `ct`
    Contains,
    /// `bt`, takes two values as bounds
    Between,
    /// `neq`
    NotEquals,
}

impl Operation {
    /// Parse a wire code, falling back to [`Operation::Equals`] for anything unrecognized
    #[must_use]
    pub fn parse(code: &str) -> Self {
        match code {
            "ct" => Self::Contains,
            "bt" => Self::Between,
            "neq" => Self::NotEquals,
            _ => Self::Equals,
        }
    }

    /// Wire code for this operation
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Equals => "eq",
            Self::Contains => "ct",
            Self::Between => "bt",
            Self::NotEquals => "neq",
        }
    }

    /// Comparison the query layer should perform
    #[must_use]
    pub const fn comparison(&self) -> Comparison {
        match self {
            Self::Between => Comparison::Range,
            Self::Equals => Comparison::Equals,
            Self::NotEquals => Comparison::NotEquals,
            Self::Contains => Comparison::PatternMatch,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl From<&str> for Operation {
    fn from(code: &str) -> Self {
        Self::parse(code)
    }
}

impl Serialize for Operation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for Operation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Ok(Self::parse(&code))
    }
}

/// Comparison semantic consumed by the query layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    /// Value lies between two bounds
    Range,
    /// Value equals the operand
    Equals,
    /// Value differs from the operand
    NotEquals,
    /// Value matches a pattern
    PatternMatch,
}

impl Comparison {
    /// Resolve a raw operation code directly
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        Operation::parse(code).comparison()
    }

    /// Stable name of the comparison
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Range => "range",
            Self::Equals => "equals",
            Self::NotEquals => "not-equals",
            Self::PatternMatch => "pattern-match",
        }
    }

    /// SQL operator fragment
    ///
    /// ```rust
    /// use handler_gateway::handlers::Comparison;
    ///
    /// assert_eq!(Comparison::Range.as_sql(), "BETWEEN");
    /// assert_eq!(Comparison::NotEquals.as_sql(), "!=");
    /// ```
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Range => "BETWEEN",
            Self::Equals => "=",
            Self::NotEquals => "!=",
            Self::PatternMatch => "LIKE",
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
