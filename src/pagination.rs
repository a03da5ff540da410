//! Paginated - One page of results with derived paging fields.
//!
//! Every setter ends with [`Paginated::sync`], the only place derived fields
//! are computed, so `pages`, `offset`, `paging_counter` and the next/prev
//! flags always agree with the latest `total`, `limit` and `page`.
//!
//! ## Example
//!
//! ```ignore
//! use sifted_rust::{Paginated, QueryDescriptor};
//!
//! let query = QueryDescriptor::new().set_paging(2, 10);
//! let mut page = Paginated::from_query(&query);
//! page.set_total(25);
//! page.set_docs(docs);
//!
//! assert_eq!(page.pages(), 3);
//! assert!(page.has_next_page());
//! ```

use serde::Serialize;

use crate::config::DEFAULT_PAGE_SIZE;
use crate::query::QueryDescriptor;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    docs: Vec<T>,
    total: u64,
    /// `0` means unbounded: everything is on one page.
    limit: u64,
    page: u64,
    pages: u64,
    offset: u64,
    paging_counter: u64,
    has_next_page: bool,
    has_prev_page: bool,
    next_page: Option<u64>,
    prev_page: Option<u64>,
    #[serde(skip)]
    default_limit: u64,
}

impl<T> Default for Paginated<T> {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl<T> Paginated<T> {
    /// An empty first page with `default_limit` as page size.
    pub fn new(default_limit: u64) -> Self {
        let mut paginated = Self {
            docs: Vec::new(),
            total: 0,
            limit: default_limit,
            page: 1,
            pages: 0,
            offset: 0,
            paging_counter: 0,
            has_next_page: false,
            has_prev_page: false,
            next_page: None,
            prev_page: None,
            default_limit,
        };
        paginated.sync();
        paginated
    }

    /// An empty page matching the paging of `query`.
    pub fn from_query(query: &QueryDescriptor) -> Self {
        let mut paginated = Self::new(query.config().default_page_size);
        paginated.limit = query.limit().unwrap_or(0);
        paginated.page = query.page();
        paginated.sync();
        paginated
    }

    pub fn with_docs(mut self, docs: Vec<T>) -> Self {
        self.set_docs(docs);
        self
    }

    pub fn with_total(mut self, total: u64) -> Self {
        self.set_total(total);
        self
    }

    pub fn set_docs(&mut self, docs: Vec<T>) {
        self.docs = docs;
        self.sync();
    }

    pub fn set_total(&mut self, total: u64) {
        self.total = total;
        self.sync();
    }

    /// Negative limits reset to the default page size.
    pub fn set_limit(&mut self, limit: i64) {
        self.limit = u64::try_from(limit).unwrap_or(self.default_limit);
        self.sync();
    }

    /// Pages are 1-based; `0` clamps to the first page.
    pub fn set_page(&mut self, page: u64) {
        self.page = page.max(1);
        self.sync();
    }

    /// Recompute every derived field.
    pub fn sync(&mut self) {
        let found = u64::try_from(self.docs.len()).unwrap_or(u64::MAX);
        if found > self.total {
            self.total = found;
        }
        self.page = self.page.max(1);

        if self.limit > 0 {
            self.pages = self.total.div_ceil(self.limit);
            self.offset = (self.page - 1).saturating_mul(self.limit);
        } else {
            self.pages = 1;
            self.offset = 0;
        }
        self.paging_counter = self.offset.saturating_add(1);

        self.has_prev_page = self.page > 1;
        self.has_next_page = self.page < self.pages;
        self.prev_page = self.has_prev_page.then(|| self.page - 1);
        self.next_page = self.has_next_page.then(|| self.page.saturating_add(1));
    }

    pub fn docs(&self) -> &[T] {
        &self.docs
    }

    pub fn into_docs(self) -> Vec<T> {
        self.docs
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn pages(&self) -> u64 {
        self.pages
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn paging_counter(&self) -> u64 {
        self.paging_counter
    }

    pub fn has_next_page(&self) -> bool {
        self.has_next_page
    }

    pub fn has_prev_page(&self) -> bool {
        self.has_prev_page
    }

    pub fn next_page(&self) -> Option<u64> {
        self.next_page
    }

    pub fn prev_page(&self) -> Option<u64> {
        self.prev_page
    }
}
