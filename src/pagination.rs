//! Splits an ordered collection into fixed-size pages.

use serde::Deserialize;

pub const PAGE_SIZE: usize = 10;

/// `?page=N` as sent by the client. Kept as a raw string so junk falls back to page 1.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page number actually served.
    pub number: usize,
    pub num_pages: usize,
    /// Size of the whole collection.
    pub count: usize,
}

impl<T> Page<T> {
    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn previous_page_number(&self) -> usize {
        self.number.saturating_sub(1).max(1)
    }

    pub fn next_page_number(&self) -> usize {
        (self.number + 1).min(self.num_pages)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Requested page number; missing, unparsable, or zero means page 1.
pub fn parse_page_number(raw: Option<&str>) -> usize {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|n| *n >= 1)
        .unwrap_or(1)
}

/// Cut page `raw_page` out of `items` using [`PAGE_SIZE`].
pub fn paginate<T>(items: Vec<T>, raw_page: Option<&str>) -> Page<T> {
    paginate_by(items, raw_page, PAGE_SIZE)
}

/// Pages past the end are clamped to the last one. An empty collection
/// still has a single (empty) page.
pub fn paginate_by<T>(items: Vec<T>, raw_page: Option<&str>, per_page: usize) -> Page<T> {
    let number = clamp_page_number(raw_page, items.len(), per_page);
    page_at(items, number, per_page)
}

fn num_pages(count: usize, per_page: usize) -> usize {
    count.div_ceil(per_page.max(1)).max(1)
}

/// Page number actually served for `raw_page` over `count` items.
pub fn clamp_page_number(raw_page: Option<&str>, count: usize, per_page: usize) -> usize {
    parse_page_number(raw_page).min(num_pages(count, per_page))
}

/// Page `number` of `items`, clamped into range.
pub fn page_at<T>(items: Vec<T>, number: usize, per_page: usize) -> Page<T> {
    let per_page = per_page.max(1);
    let count = items.len();
    let num_pages = num_pages(count, per_page);
    let number = number.clamp(1, num_pages);

    let start = (number - 1) * per_page;
    let items = items.into_iter().skip(start).take(per_page).collect();

    Page {
        items,
        number,
        num_pages,
        count,
    }
}
