//! Page-number pagination shared by every list endpoint.
//!
//! Pages are 1-based. Callers must pair pagination with a total order on
//! the underlying rows, otherwise consecutive pages can overlap.

use serde::Serialize;

use crate::error::CoreError;

/// Page size used when a request does not specify one.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Largest page size a request may ask for.
pub const MAX_PAGE_SIZE: i64 = 100;

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    /// Validate raw query values, filling in defaults.
    ///
    /// `page` must be `>= 1`; `page_size` must be in `1..=max_page_size`.
    pub fn new(
        page: Option<i64>,
        page_size: Option<i64>,
        default_page_size: i64,
        max_page_size: i64,
    ) -> Result<Self, CoreError> {
        let page = page.unwrap_or(1);
        let page_size = page_size.unwrap_or(default_page_size.min(max_page_size));

        if page < 1 {
            return Err(CoreError::Validation(format!(
                "page must be >= 1, got {page}"
            )));
        }
        if !(1..=max_page_size).contains(&page_size) {
            return Err(CoreError::Validation(format!(
                "page_size must be between 1 and {max_page_size}, got {page_size}"
            )));
        }

        Ok(Self { page, page_size })
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of results plus the total row count across all pages.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T: Serialize> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

impl<T: Serialize> Page<T> {
    pub fn new(items: Vec<T>, total: i64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page,
            page_size: request.page_size,
        }
    }

    /// Transform every item, keeping the paging metadata.
    pub fn map<U: Serialize>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let req = PageRequest::new(None, None, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE).unwrap();
        assert_eq!(req, PageRequest::default());
        assert_eq!(req.offset(), 0);
    }

    #[test]
    fn offset_is_zero_based() {
        let req = PageRequest::new(Some(3), Some(10), 20, 100).unwrap();
        assert_eq!(req.offset(), 20);
        assert_eq!(req.limit(), 10);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(PageRequest::new(Some(0), None, 20, 100).is_err());
        assert!(PageRequest::new(None, Some(0), 20, 100).is_err());
        assert!(PageRequest::new(None, Some(101), 20, 100).is_err());
        assert!(PageRequest::new(None, Some(100), 20, 100).is_ok());
    }

    #[test]
    fn default_is_capped_by_max() {
        let req = PageRequest::new(None, None, 50, 25).unwrap();
        assert_eq!(req.page_size, 25);
    }

    #[test]
    fn map_keeps_metadata() {
        let page = Page::new(vec![1, 2], 7, PageRequest { page: 2, page_size: 2 });
        let mapped = page.map(|n| n * 10);
        assert_eq!(mapped.items, vec![10, 20]);
        assert_eq!(mapped.total, 7);
        assert_eq!(mapped.page, 2);
    }
}
