//! Offset/limit pagination for list-style actions.
//!
//! Out-of-range page numbers and sizes coming from clients are normalized
//! against a [`PageBounds`] instead of being rejected.

use serde::{Deserialize, Serialize};

/// Limits applied when normalizing client-supplied pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageBounds {
    /// Page size used when the client sends none, zero, or too large a size.
    pub default_page_size: u64,
    /// Largest page size accepted as-is.
    pub max_page_size: u64,
}

impl Default for PageBounds {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

/// Resolved `OFFSET`/`LIMIT` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: u64,
    pub limit: u64,
}

/// Client pagination request with an action-specific search option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pagination<T> {
    /// 1-based page number. Values `<= 0` mean the first page.
    #[serde(default)]
    pub page_no: i64,
    /// Requested page size. Values `<= 0` or above the bound fall back to the default.
    #[serde(default)]
    pub page_size: i64,
    /// Filter criteria interpreted by the action.
    pub search_option: T,
}

impl<T> Pagination<T> {
    #[must_use]
    pub fn new(page_no: i64, page_size: i64, search_option: T) -> Self {
        Self {
            page_no,
            page_size,
            search_option,
        }
    }

    /// Normalizes the page against `bounds` and returns the resulting window.
    #[must_use]
    pub fn window_with(&self, bounds: &PageBounds) -> PageWindow {
        let page_no = u64::try_from(self.page_no).ok().filter(|n| *n > 0).unwrap_or(1);
        let limit = u64::try_from(self.page_size)
            .ok()
            .filter(|size| *size > 0 && *size <= bounds.max_page_size)
            .unwrap_or(bounds.default_page_size);
        PageWindow {
            offset: (page_no - 1).saturating_mul(limit),
            limit,
        }
    }

    /// Row offset under the default bounds.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.window_with(&PageBounds::default()).offset
    }

    /// Row limit under the default bounds.
    #[must_use]
    pub fn limit(&self) -> u64 {
        self.window_with(&PageBounds::default()).limit
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    #[test]
    fn third_page_of_twenty() {
        let page = Pagination::new(3, 20, ());
        assert_eq!(page.offset(), 40);
        assert_eq!(page.limit(), 20);
    }

    #[test]
    fn non_positive_values_fall_back_to_defaults() {
        let page = Pagination::new(0, -5, ());
        assert_eq!(page.window_with(&PageBounds::default()), PageWindow { offset: 0, limit: 10 });
    }

    #[test]
    fn oversized_page_uses_default_size() {
        let bounds = PageBounds {
            default_page_size: 25,
            max_page_size: 50,
        };
        let page = Pagination::new(2, 51, ());
        assert_eq!(page.window_with(&bounds), PageWindow { offset: 25, limit: 25 });
    }

    #[test]
    fn deserializes_with_missing_numbers() {
        let page: Pagination<serde_json::Value> =
            serde_json::from_value(json!({"search_option": {"name": "kim"}})).unwrap();
        assert_eq!(page.page_no, 0);
        assert_eq!(page.limit(), 10);
        assert_eq!(page.search_option, json!({"name": "kim"}));
    }

    proptest! {
        #[test]
        fn window_stays_within_bounds(page_no in -1_000i64..1_000_000, page_size in any::<i64>()) {
            let bounds = PageBounds::default();
            let window = Pagination::new(page_no, page_size, ()).window_with(&bounds);
            prop_assert!(window.limit >= 1 && window.limit <= bounds.max_page_size);
            prop_assert_eq!(window.offset % window.limit, 0);
        }
    }
}
