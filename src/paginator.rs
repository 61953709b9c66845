//! Fixed-size page slicing for post listings.
//!
//! The paginator only does arithmetic: the store runs `COUNT(*)`, the
//! paginator resolves the requested page number against it, and the store
//! fetches that window with `LIMIT`/`OFFSET`.

use serde::Serialize;

/// Posts per page unless the configuration says otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Paginator {
    count: usize,
    per_page: usize,
}

impl Paginator {
    /// A `per_page` of zero is treated as one.
    pub fn new(count: usize, per_page: usize) -> Self {
        Self { count, per_page: per_page.max(1) }
    }

    pub fn count(&self) -> usize { self.count }
    pub fn per_page(&self) -> usize { self.per_page }

    /// Number of pages. An empty listing still has one (empty) page.
    pub fn num_pages(&self) -> usize {
        self.count.div_ceil(self.per_page).max(1)
    }

    /// Resolves the raw `?page=` value to a page that exists.
    ///
    /// Missing, non-numeric and non-positive values give page 1; values past
    /// the end give the last page.
    pub fn page_number(&self, raw: Option<&str>) -> usize {
        match raw.map(str::trim).and_then(|s| s.parse::<usize>().ok()) {
            Some(0) | None => 1,
            Some(n) => n.min(self.num_pages()),
        }
    }

    /// Row offset of the first item on page `number`.
    pub fn offset(&self, number: usize) -> usize {
        (number.max(1) - 1) * self.per_page
    }

    /// Wraps the fetched rows of page `number`.
    pub fn page<T>(&self, number: usize, items: Vec<T>) -> Page<T> {
        let num_pages = self.num_pages();
        Page {
            items,
            number,
            num_pages,
            count: self.count,
            has_previous: number > 1,
            has_next: number < num_pages,
            previous_page_number: (number > 1).then(|| number - 1),
            next_page_number: (number < num_pages).then(|| number + 1),
        }
    }
}

/// One page of a listing, serialized as the `page_obj` of listing views.
#[derive(Clone, Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub num_pages: usize,
    pub count: usize,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous_page_number: Option<usize>,
    pub next_page_number: Option<usize>,
}

impl<T> Page<T> {
    pub fn len(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirteen_posts_make_two_pages() {
        let p = Paginator::new(13, DEFAULT_PAGE_SIZE);
        assert_eq!(p.num_pages(), 2);
        assert_eq!(p.offset(1), 0);
        assert_eq!(p.offset(2), 10);

        let second = p.page(2, vec![(); 3]);
        assert_eq!(second.len(), 3);
        assert!(second.has_previous);
        assert!(!second.has_next);
        assert_eq!(second.previous_page_number, Some(1));
        assert_eq!(second.next_page_number, None);
    }

    #[test]
    fn empty_listing_has_one_page() {
        let p = Paginator::new(0, 10);
        assert_eq!(p.num_pages(), 1);
        assert_eq!(p.page_number(Some("3")), 1);
        let page = p.page::<()>(1, Vec::new());
        assert!(page.is_empty());
        assert!(!page.has_next);
    }

    #[test]
    fn bad_page_numbers_are_clamped() {
        let p = Paginator::new(25, 10);
        assert_eq!(p.page_number(None), 1);
        assert_eq!(p.page_number(Some("abc")), 1);
        assert_eq!(p.page_number(Some("0")), 1);
        assert_eq!(p.page_number(Some("-2")), 1);
        assert_eq!(p.page_number(Some(" 2 ")), 2);
        assert_eq!(p.page_number(Some("99")), 3);
    }

    #[test]
    fn exact_multiple_does_not_add_a_page() {
        assert_eq!(Paginator::new(20, 10).num_pages(), 2);
        assert_eq!(Paginator::new(21, 10).num_pages(), 3);
    }
}
