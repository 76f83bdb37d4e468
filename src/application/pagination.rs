//! Offset pagination shared by every list endpoint.

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginationError {
    #[error("page must be at least 1, got {0}")]
    InvalidPage(i64),
    #[error("page_size must be between 1 and {MAX_PAGE_SIZE}, got {0}")]
    InvalidPageSize(i64),
}

/// Raw `page` / `page_size` query parameters as sent by clients.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// A validated page window: `page >= 1` and `1 <= page_size <= 100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl PageRequest {
    pub fn new(page: i64, page_size: i64) -> Result<Self, PaginationError> {
        let page = u32::try_from(page)
            .ok()
            .filter(|page| *page >= 1)
            .ok_or(PaginationError::InvalidPage(page))?;
        let page_size = u32::try_from(page_size)
            .ok()
            .filter(|size| (1..=MAX_PAGE_SIZE).contains(size))
            .ok_or(PaginationError::InvalidPageSize(page_size))?;
        Ok(Self { page, page_size })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Number of rows to skip: `(page - 1) * page_size`.
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    /// Slice an already ordered in-memory collection the same way SQL would.
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .skip(usize::try_from(self.offset()).unwrap_or(usize::MAX))
            .take(self.page_size as usize)
            .cloned()
            .collect()
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

impl TryFrom<PageQuery> for PageRequest {
    type Error = PaginationError;

    fn try_from(query: PageQuery) -> Result<Self, Self::Error> {
        Self::new(
            query.page.unwrap_or(1),
            query.page_size.unwrap_or(i64::from(DEFAULT_PAGE_SIZE)),
        )
    }
}
