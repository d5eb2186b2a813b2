/// Shared types used across the codebase
use serde::{Deserialize, Serialize};

/// Page envelope returned by every paginated listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub size: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, page: i64, size: i64, total: i64) -> Self {
        let total_pages = if size > 0 { (total + size - 1) / size } else { 1 };
        Self {
            items,
            page,
            size,
            total,
            total_pages,
        }
    }
}

/// Query-string pagination parameters, clamped before use
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub size: Option<i64>,
}

impl PageParams {
    /// Normalize to (page >= 1, size within [1, max_size], offset)
    pub fn clamp(&self, default_size: i64, max_size: i64) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let size = self.size.unwrap_or(default_size).clamp(1, max_size);
        (page, size, (page - 1) * size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_page_and_size() {
        let p = PageParams {
            page: Some(0),
            size: Some(999),
        };
        assert_eq!(p.clamp(10, 100), (1, 100, 0));

        let p = PageParams {
            page: Some(3),
            size: Some(0),
        };
        assert_eq!(p.clamp(10, 100), (3, 1, 2));

        let p = PageParams {
            page: None,
            size: None,
        };
        assert_eq!(p.clamp(10, 100), (1, 10, 0));
    }

    #[test]
    fn total_pages_rounds_up() {
        let p: Paginated<i32> = Paginated::new(vec![], 1, 10, 31);
        assert_eq!(p.total_pages, 4);
        let p: Paginated<i32> = Paginated::new(vec![], 1, 10, 30);
        assert_eq!(p.total_pages, 3);
        let p: Paginated<i32> = Paginated::new(vec![], 1, 10, 0);
        assert_eq!(p.total_pages, 0);
    }
}
