//! Pagination types for query results.
//!
//! [`PaginationParams`] names a page of a larger result set; [`Page`] is one
//! such page together with the navigation metadata the collections compute
//! from a count plus a windowed query.

use serde::{Deserialize, Serialize};

/// A single page of paginated results.
///
/// # Example
///
/// ```ignore
/// let page: Page<String> = Page::builder(items)
///     .with_count(100)
///     .with_next_page(Some(2))
///     .build();
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// The items contained in this page.
    pub items: Vec<T>,
    /// Total count of items across all pages.
    pub count: usize,
    /// The next page number (if more pages exist).
    pub next_page: Option<usize>,
    /// The previous page number (if this is not the first page).
    pub previous_page: Option<usize>,
}

impl<T> Page<T> {
    /// Creates a builder for constructing a page with navigation metadata.
    pub fn builder(items: Vec<T>) -> PageBuilder<T> {
        PageBuilder::new(items)
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            count: 0,
            next_page: None,
            previous_page: None,
        }
    }
}

/// Builder for [`Page`] instances.
pub struct PageBuilder<T> {
    items: Vec<T>,
    count: usize,
    next_page: Option<usize>,
    previous_page: Option<usize>,
}

impl<T> PageBuilder<T> {
    /// Creates a new builder with the given items.
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            count: 0,
            next_page: None,
            previous_page: None,
        }
    }

    /// Sets the total count of items across all pages.
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Sets the next page number (or `None` if this is the last page).
    pub fn with_next_page(mut self, next_page: Option<usize>) -> Self {
        self.next_page = next_page;
        self
    }

    /// Sets the previous page number (or `None` if this is the first page).
    pub fn with_previous_page(mut self, previous_page: Option<usize>) -> Self {
        self.previous_page = previous_page;
        self
    }

    /// Builds and returns the final [`Page`].
    pub fn build(self) -> Page<T> {
        Page {
            items: self.items,
            count: self.count,
            next_page: self.next_page,
            previous_page: self.previous_page,
        }
    }
}

/// Parameters naming one page of a larger result set.
///
/// Pages are 1-indexed: page 1 is the first page.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PaginationParams {
    /// The page number (1-indexed).
    pub page: usize,
    /// Number of items per page.
    pub per_page: usize,
}

impl PaginationParams {
    /// Creates new pagination parameters.
    pub fn new(page: usize, per_page: usize) -> Self {
        Self { page, per_page }
    }

    /// The number of items to skip to reach this page.
    ///
    /// ```ignore
    /// assert_eq!(PaginationParams::new(3, 20).offset(), 40);
    /// ```
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1) * self.per_page
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 1, per_page: 10 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_is_zero_based_from_one_indexed_pages() {
        assert_eq!(PaginationParams::new(1, 10).offset(), 0);
        assert_eq!(PaginationParams::new(2, 10).offset(), 10);
        assert_eq!(PaginationParams::new(3, 25).offset(), 50);
        // Page 0 is treated like page 1 instead of underflowing.
        assert_eq!(PaginationParams::new(0, 10).offset(), 0);
    }

    #[test]
    fn builder_assembles_navigation() {
        let page = Page::builder(vec![1, 2, 3])
            .with_count(10)
            .with_next_page(Some(2))
            .build();

        assert_eq!(page.items, vec![1, 2, 3]);
        assert_eq!(page.count, 10);
        assert_eq!(page.next_page, Some(2));
        assert_eq!(page.previous_page, None);
    }
}
