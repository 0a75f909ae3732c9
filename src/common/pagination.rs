use serde::{Deserialize, Serialize};

use super::error::AppError;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Raw `?page=&page_size=` query. Values are parsed leniently: an unusable
/// `page_size` falls back to the default, an unusable `page` is rejected.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
}

impl PageQuery {
    pub fn page_size(&self) -> i64 {
        match self.page_size.as_deref().map(|s| s.trim().parse::<i64>()) {
            Some(Ok(n)) if n > 0 => n.min(MAX_PAGE_SIZE),
            _ => DEFAULT_PAGE_SIZE,
        }
    }

    fn page(&self) -> Option<i64> {
        match self.page.as_deref() {
            None => Some(1),
            Some(s) => s.trim().parse::<i64>().ok().filter(|n| *n >= 1),
        }
    }

    /// Resolves the query against the total number of rows.
    pub fn resolve(&self, count: i64) -> Result<PageRequest, AppError> {
        let page_size = self.page_size();
        let page = self.page().ok_or_else(invalid_page)?;
        let last_page = ((count + page_size - 1) / page_size).max(1);
        if page > last_page {
            return Err(invalid_page());
        }
        Ok(PageRequest { page, page_size })
    }
}

fn invalid_page() -> AppError {
    AppError::NotFound("Invalid page.".into())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

#[derive(Debug, Serialize)]
pub struct Paged<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Paged<T> {
    /// `path` is the collection path the links point back to, e.g. `/users`.
    pub fn new(path: &str, req: PageRequest, count: i64, results: Vec<T>) -> Self {
        let link = |page: i64| format!("{}?page={}&page_size={}", path, page, req.page_size);
        let next = (req.offset() + (results.len() as i64) < count).then(|| link(req.page + 1));
        let previous = (req.page > 1).then(|| link(req.page - 1));
        Self {
            count,
            next,
            previous,
            results,
        }
    }
}
