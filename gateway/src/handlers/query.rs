//! Bracket-notation filter and sort parameters
//!
//! List endpoints accept structured filters and sorts flattened into the query
//! string:
//!
//! ```text
//! filters[0][k]=age&filters[0][o]=bt&filters[0][v]=18&filters[0][v]=30
//! sorts[a][k]=created_at&sorts[a][v]=desc
//! ```
//!
//! Tokens are grouped by their `filters[<group>]` / `sorts[<group>]` prefix. The
//! group name is opaque: it only has to be shared by the tokens of one group.
//! Inside a group the selector after the prefix says what the value is:
//! `k` (field key), `v` (value, repeatable) or `o` (operation, filters only).
//!
//! Groups come out in the order their first token appeared. Malformed tokens
//! (no `=`, no closing bracket, unknown selector) are skipped.
//!
//! # Example
//!
//! ```rust
//! use handler_gateway::handlers::{Comparison, FilterParams};
//! use handler_gateway::pagination::Paginator;
//!
//! let params = FilterParams::parse(
//!     "filters[0][k]=age&filters[0][o]=bt&filters[0][v]=18&filters[0][v]=30&sorts[0][k]=name",
//!     &Paginator::new(),
//! );
//!
//! let age = &params.filters()[0];
//! assert_eq!(age.key, "age");
//! assert_eq!(age.values, vec!["18", "30"]);
//! assert_eq!(age.comparison(), Comparison::Range);
//! assert_eq!(params.sorts()[0].key, "name");
//! assert_eq!(params.limit(), 10);
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::operation::{Comparison, Operation};
use crate::pagination::{Paginator, DEFAULT_PAGE, DEFAULT_PER_PAGE};

/// Marker opening a filter group
pub const FILTER_MARKER: &str = "filters[";

/// Marker opening a sort group
pub const SORT_MARKER: &str = "sorts[";

const FILTER_SELECTORS: &[char] = &['k', 'v', 'o'];
const SORT_SELECTORS: &[char] = &['k', 'v'];

/// Sort direction carried by a sort value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending
    #[default]
    Asc,
    /// Descending
    Desc,
}

impl SortOrder {
    /// Parse `asc` / `desc`, case-insensitively
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("asc") {
            Some(Self::Asc)
        } else if value.eq_ignore_ascii_case("desc") {
            Some(Self::Desc)
        } else {
            None
        }
    }

    /// SQL ORDER BY fragment
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "asc"),
            Self::Desc => write!(f, "desc"),
        }
    }
}

/// One filter reconstructed from a query group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    /// Field the filter applies to
    #[serde(rename = "k")]
    pub key: String,
    /// Requested operation, unset when the group carried none
    #[serde(rename = "op", default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<Operation>,
    /// Operands in query order (two bounds for ranges)
    #[serde(rename = "v", default)]
    pub values: Vec<String>,
}

impl Filter {
    /// Operation with the `eq` fallback applied
    #[must_use]
    pub fn operation(&self) -> Operation {
        self.operation.unwrap_or_default()
    }

    /// Comparison the query layer should perform
    #[must_use]
    pub fn comparison(&self) -> Comparison {
        self.operation().comparison()
    }

    /// First operand, if any
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }
}

/// One sort reconstructed from a query group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    /// Field to sort by
    #[serde(rename = "k")]
    pub key: String,
    /// Direction or ordinal; meaning is up to the caller
    #[serde(rename = "v", default)]
    pub value: Option<String>,
}

impl Sort {
    /// Interpret the value as a direction
    #[must_use]
    pub fn order(&self) -> Option<SortOrder> {
        self.value.as_deref().and_then(SortOrder::parse)
    }
}

/// Filters, sorts and pagination hints for one request
///
/// Built once per request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterParams {
    filters: Vec<Filter>,
    sorts: Vec<Sort>,
    page: u32,
    limit: u32,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self::empty()
    }
}

impl FilterParams {
    /// No filters or sorts, default page and page size
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            filters: Vec::new(),
            sorts: Vec::new(),
            page: DEFAULT_PAGE,
            limit: DEFAULT_PER_PAGE,
        }
    }

    /// Parse a percent-decoded query string
    #[must_use]
    pub fn parse(query: &str, paginator: &Paginator) -> Self {
        Self::from_tokens(query.split('&'), paginator)
    }

    /// Parse already split `key=value` tokens
    ///
    /// Page and limit are taken from the paginator's effective values, not
    /// from the tokens.
    pub fn from_tokens<I, S>(tokens: I, paginator: &Paginator) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens: Vec<S> = tokens.into_iter().collect();

        let mut filter_bucket = Vec::new();
        let mut sort_bucket = Vec::new();
        for token in &tokens {
            let token = token.as_ref();
            if token.contains(FILTER_MARKER) {
                filter_bucket.push(token);
            } else if token.contains(SORT_MARKER) {
                sort_bucket.push(token);
            }
        }

        let filters = group_tokens(&filter_bucket, FILTER_MARKER, FILTER_SELECTORS)
            .into_iter()
            .map(|parts| build_filter(&parts))
            .collect();
        let sorts = group_tokens(&sort_bucket, SORT_MARKER, SORT_SELECTORS)
            .into_iter()
            .map(|parts| build_sort(&parts))
            .collect();

        Self {
            filters,
            sorts,
            page: paginator.page(),
            limit: paginator.per_page(),
        }
    }

    /// Filters in first-appearance order
    #[must_use]
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Sorts in first-appearance order
    #[must_use]
    pub fn sorts(&self) -> &[Sort] {
        &self.sorts
    }

    /// Effective page at parse time
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Effective page size at parse time
    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// First filter on `key`
    #[must_use]
    pub fn filter(&self, key: &str) -> Option<&Filter> {
        self.filters.iter().find(|f| f.key == key)
    }

    /// Whether neither filters nor sorts were supplied
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty() && self.sorts.is_empty()
    }
}

/// A classified token: its group, selector character and value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Part<'a> {
    group: &'a str,
    selector: char,
    value: &'a str,
}

/// Split `<prefix><marker><group>][<selector>...]=<value>` into its parts
fn classify<'a>(token: &'a str, marker: &str) -> Option<Part<'a>> {
    let (key, value) = token.split_once('=')?;
    let start = key.find(marker)?;
    let index_start = start + marker.len();
    let close = index_start + key[index_start..].find(']')?;
    let group = &key[start..=close];
    let selector = key[close + 1..]
        .strip_prefix('[')?
        .chars()
        .next()
        .filter(|c| *c != ']')?;
    Some(Part {
        group,
        selector,
        value,
    })
}

/// Fold bucket tokens into groups, preserving first-appearance order
///
/// Tokens that fail to classify or carry a selector outside `selectors` never
/// open a group.
fn group_tokens<'a>(bucket: &[&'a str], marker: &str, selectors: &[char]) -> Vec<Vec<Part<'a>>> {
    let mut groups: Vec<Vec<Part<'a>>> = Vec::new();
    let mut positions: HashMap<&'a str, usize> = HashMap::new();

    let parts = bucket
        .iter()
        .filter_map(|token| classify(token, marker))
        .filter(|part| selectors.contains(&part.selector));

    for part in parts {
        match positions.get(part.group) {
            Some(&index) => groups[index].push(part),
            None => {
                positions.insert(part.group, groups.len());
                groups.push(vec![part]);
            }
        }
    }

    groups
}

fn build_filter(parts: &[Part<'_>]) -> Filter {
    let mut filter = Filter::default();
    for part in parts {
        match part.selector {
            'k' => filter.key = part.value.to_string(),
            'v' => filter.values.push(part.value.to_string()),
            'o' => filter.operation = Some(Operation::parse(part.value)),
            _ => {}
        }
    }
    filter
}

fn build_sort(parts: &[Part<'_>]) -> Sort {
    let mut sort = Sort::default();
    for part in parts {
        match part.selector {
            'k' => sort.key = part.value.to_string(),
            'v' => sort.value = Some(part.value.to_string()),
            _ => {}
        }
    }
    sort
}
