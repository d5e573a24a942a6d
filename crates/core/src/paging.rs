//! Pagination value type and input clamping.

use serde::Serialize;

/// Smallest valid page number (pages are 1-based).
pub const MIN_PAGE: i64 = 1;

/// Default number of items per page.
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Maximum number of items per page.
pub const MAX_PAGE_SIZE: i64 = 500;

/// Clamp a requested page number to `>= 1`.
pub fn clamp_page(page: i64) -> i64 {
    page.max(MIN_PAGE)
}

/// Clamp a requested page size to `1..=MAX_PAGE_SIZE`.
pub fn clamp_page_size(page_size: i64) -> i64 {
    page_size.clamp(1, MAX_PAGE_SIZE)
}

/// Row offset for a (clamped) page, saturating at `i64::MAX`.
pub fn page_offset(page: i64, page_size: i64) -> i64 {
    (clamp_page(page) - 1).saturating_mul(clamp_page_size(page_size))
}

/// One page of results plus the total number of matching items.
///
/// Everything other than the four stored fields is derived on demand.
#[derive(Debug, Clone, Serialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub total_count: i64,
    pub page: i64,
    pub page_size: i64,
}

impl<T> PagedResult<T> {
    pub fn total_pages(&self) -> i64 {
        if self.page_size <= 0 {
            return 0;
        }
        self.total_count.saturating_add(self.page_size - 1) / self.page_size
    }

    pub fn has_previous_page(&self) -> bool {
        self.page > 1
    }

    pub fn has_next_page(&self) -> bool {
        self.page < self.total_pages()
    }

    /// 1-based index of the first item on this page, or 0 when empty.
    pub fn start_item(&self) -> i64 {
        if self.total_count == 0 {
            0
        } else {
            (self.page - 1)
                .saturating_mul(self.page_size)
                .saturating_add(1)
        }
    }

    /// 1-based index of the last item on this page.
    pub fn end_item(&self) -> i64 {
        self.page.saturating_mul(self.page_size).min(self.total_count)
    }

    /// Convert the items while keeping the paging metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            page: self.page,
            page_size: self.page_size,
        }
    }
}
