//! Request-scoped pagination state
//!
//! A [`Paginator`] carries the page, page size, and total item count for one
//! request. Page and page size use *lazy defaults*: a zero value reads back as
//! the default on every access, and setting zero explicitly "unsets" the value
//! again.
//!
//! # Example
//!
//! ```rust
//! use handler_gateway::pagination::Paginator;
//!
//! let mut paginator = Paginator::new();
//! assert_eq!(paginator.page(), 1);
//! assert_eq!(paginator.per_page(), 10);
//!
//! paginator.set_page(5);
//! paginator.set_limit(0);
//! assert_eq!(paginator.page(), 5);
//! assert_eq!(paginator.per_page(), 10);
//! ```

use serde::{Deserialize, Serialize};

/// Page returned while no page has been set
pub const DEFAULT_PAGE: u32 = 1;

/// Page size returned while no limit has been set
pub const DEFAULT_PER_PAGE: u32 = 10;

/// Query parameter carrying the page number
pub const PAGE_PARAM: &str = "page";

/// Query parameter carrying the page size
pub const LIMIT_PARAM: &str = "limit";

/// Page/limit/total state for a single request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginator {
    page: u32,
    limit: u32,
    total: u64,
}

impl Paginator {
    /// Create a paginator with nothing set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a paginator from the `page` and `limit` parameters of a raw query string
    ///
    /// Missing or non-numeric values are stored as zero, so they read back as
    /// the defaults. A repeated parameter uses its first occurrence.
    ///
    /// # Example
    ///
    /// ```rust
    /// use handler_gateway::pagination::Paginator;
    ///
    /// let paginator = Paginator::from_query("page=3&limit=abc");
    /// assert_eq!(paginator.page(), 3);
    /// assert_eq!(paginator.per_page(), 10);
    /// ```
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let first = |name: &str| {
            form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == name)
                .map_or(0, |(_, value)| parse_or_zero(&value))
        };
        let mut paginator = Self::new();
        paginator.set_page(first(PAGE_PARAM));
        paginator.set_limit(first(LIMIT_PARAM));
        paginator
    }

    /// Current page, `DEFAULT_PAGE` while unset
    #[must_use]
    pub fn page(&self) -> u32 {
        if self.page == 0 {
            DEFAULT_PAGE
        } else {
            self.page
        }
    }

    /// Current page size, `DEFAULT_PER_PAGE` while unset
    #[must_use]
    pub fn per_page(&self) -> u32 {
        if self.limit == 0 {
            DEFAULT_PER_PAGE
        } else {
            self.limit
        }
    }

    /// Set the page. Zero unsets it.
    pub fn set_page(&mut self, page: u32) {
        self.page = page;
    }

    /// Set the page size. Zero unsets it.
    pub fn set_limit(&mut self, limit: u32) {
        self.limit = limit;
    }

    /// Total number of items across all pages
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Record the total number of items across all pages
    pub fn set_total(&mut self, total: u64) {
        self.total = total;
    }

    /// Number of items to skip for the current page
    ///
    /// # Example
    ///
    /// ```rust
    /// use handler_gateway::pagination::Paginator;
    ///
    /// let mut paginator = Paginator::new();
    /// paginator.set_page(3);
    /// paginator.set_limit(20);
    /// assert_eq!(paginator.offset(), 40);
    /// ```
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page().saturating_sub(1)) * u64::from(self.per_page())
    }
}

fn parse_or_zero(value: &str) -> u32 {
    value.trim().parse().unwrap_or(0)
}
