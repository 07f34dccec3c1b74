//! # Pagination
//!
//! Slices any list into pages for presentation layers.
//!
//! Out-of-range pages clamp to the nearest valid page instead of returning an
//! empty window, so a caller left on page 7 after a filter shrinks the list to
//! two pages lands on page 2.

use serde::{Deserialize, Serialize};

/// One window of a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based, already clamped.
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

/// `max(1, ceil(total_items / page_size))`, with `page_size` clamped to 1.
pub fn total_pages(total_items: usize, page_size: usize) -> usize {
    let size = page_size.max(1);
    total_items.div_ceil(size).max(1)
}

/// Returns page `page` of `list`.
pub fn paginate<T: Clone>(list: &[T], page_size: usize, page: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_items = list.len();
    let total_pages = total_pages(total_items, page_size);
    let page = page.clamp(1, total_pages);

    let start = (page - 1) * page_size;
    let end = (start + page_size).min(total_items);
    let items = list.get(start..end).map(<[T]>::to_vec).unwrap_or_default();

    Page {
        items,
        page,
        page_size,
        total_pages,
        total_items,
    }
}

/// Remembers the current page while the list underneath changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationCursor {
    page: usize,
    page_size: usize,
}

impl PaginationCursor {
    pub fn new(page_size: usize) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Changes the page size and goes back to the first page.
    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
        self.page = 1;
    }

    /// Moves forward one page, stopping at the last page of `total_items`.
    pub fn next(&mut self, total_items: usize) -> usize {
        self.go_to(self.page.saturating_add(1), total_items)
    }

    /// Moves back one page, stopping at page 1.
    pub fn prev(&mut self, total_items: usize) -> usize {
        self.go_to(self.page.saturating_sub(1), total_items)
    }

    pub fn go_to(&mut self, page: usize, total_items: usize) -> usize {
        self.page = page.clamp(1, total_pages(total_items, self.page_size));
        self.page
    }

    /// Current window of `list`, re-clamping the cursor if the list shrank.
    pub fn window<T: Clone>(&mut self, list: &[T]) -> Page<T> {
        let page = paginate(list, self.page_size, self.page);
        self.page = page.page;
        page
    }
}

impl Default for PaginationCursor {
    fn default() -> Self {
        Self::new(50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_window() {
        let list: Vec<u32> = (1..=7).collect();
        let page = paginate(&list, 3, 2);
        assert_eq!(page.items, vec![4, 5, 6]);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_items, 7);
    }

    #[test]
    fn test_out_of_range_clamps_to_last_page() {
        let list: Vec<u32> = (1..=7).collect();
        let page = paginate(&list, 3, 99);
        assert_eq!(page.page, 3);
        assert_eq!(page.items, vec![7]);

        let first = paginate(&list, 3, 0);
        assert_eq!(first.page, 1);
        assert_eq!(first.items, vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_list_has_one_page() {
        let page = paginate::<u32>(&[], 10, 4);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.page, 1);
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_zero_page_size_is_clamped() {
        let page = paginate(&[1, 2], 0, 2);
        assert_eq!(page.page_size, 1);
        assert_eq!(page.items, vec![2]);
    }

    #[test]
    fn test_conservation() {
        for total in 0..25usize {
            for size in 1..8usize {
                let list: Vec<usize> = (0..total).collect();
                let pages = total_pages(total, size);
                let mut seen = Vec::new();
                for p in 1..=pages {
                    seen.extend(paginate(&list, size, p).items);
                }
                assert_eq!(seen, list, "total={total} size={size}");
            }
        }
    }

    #[test]
    fn test_cursor_follows_shrinking_list() {
        let mut cursor = PaginationCursor::new(2);
        let long: Vec<u32> = (0..10).collect();
        cursor.go_to(5, long.len());
        assert_eq!(cursor.window(&long).items, vec![8, 9]);

        let short: Vec<u32> = (0..3).collect();
        let page = cursor.window(&short);
        assert_eq!(page.page, 2);
        assert_eq!(cursor.page(), 2);

        assert_eq!(cursor.next(short.len()), 2);
        assert_eq!(cursor.prev(short.len()), 1);
        assert_eq!(cursor.prev(short.len()), 1);
    }
}
