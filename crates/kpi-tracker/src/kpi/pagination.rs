use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_LIMIT: usize = 10;

/// 1-based page request. Zero values fall back to the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: usize,
    pub limit: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    pub fn new(page: Option<usize>, limit: Option<usize>) -> Self {
        Self {
            page: page.filter(|p| *p > 0).unwrap_or(DEFAULT_PAGE),
            limit: limit.filter(|l| *l > 0).unwrap_or(DEFAULT_LIMIT),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page.max(1) - 1).saturating_mul(self.limit)
    }

    pub fn meta(&self, total: usize) -> PageMeta {
        let limit = self.limit.max(1);
        let total_pages = total.div_ceil(limit);
        PageMeta {
            page: self.page,
            limit,
            total,
            total_pages,
            has_next_page: self.page < total_pages,
            has_previous_page: self.page > 1,
        }
    }

    /// Slices an already ordered list.
    pub fn apply<T: Clone>(&self, items: &[T]) -> Page<T> {
        let docs = items
            .iter()
            .skip(self.offset())
            .take(self.limit.max(1))
            .cloned()
            .collect();
        Page {
            docs,
            meta: self.meta(items.len()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub docs: Vec<T>,
    #[serde(flatten)]
    pub meta: PageMeta,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            docs: self.docs.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_values_fall_back_to_defaults() {
        let request = PageRequest::new(Some(0), Some(0));
        assert_eq!(request, PageRequest::default());
    }

    #[test]
    fn slices_and_reports_navigation() {
        let items: Vec<u32> = (1..=25).collect();
        let page = PageRequest::new(Some(3), Some(10)).apply(&items);

        assert_eq!(page.docs, vec![21, 22, 23, 24, 25]);
        assert_eq!(page.meta.total_pages, 3);
        assert!(!page.meta.has_next_page);
        assert!(page.meta.has_previous_page);
    }

    #[test]
    fn pages_past_the_end_are_empty() {
        let items = vec!["a", "b"];
        let page = PageRequest::new(Some(4), Some(2)).apply(&items);
        assert!(page.docs.is_empty());
        assert_eq!(page.meta.total, 2);
    }
}
