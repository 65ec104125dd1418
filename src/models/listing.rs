//! Post listing parameters and pagination
//!
//! Raw query-string values are collected into [`PostListQuery`] and then
//! interpreted into a typed [`PostFilter`]. Unknown or malformed values are
//! ignored rather than rejected, so any URL renders a listing.

use serde::{Deserialize, Serialize};

/// Fixed page size of every post listing
pub const POSTS_PER_PAGE: u32 = 6;

/// Raw listing parameters as they arrive in the query string.
///
/// Spanish parameter names from the original URLs are accepted next to the
/// English ones; when a key repeats, the last value wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostListQuery {
    pub category: Option<String>,
    pub fecha: Option<String>,
    pub q: Option<String>,
    pub orden: Option<String>,
    pub page: Option<String>,
}

impl PostListQuery {
    /// Build from decoded `key=value` pairs
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut query = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "category" | "categoria" => query.category = Some(value),
                "fecha" => query.fecha = Some(value),
                "q" => query.q = Some(value),
                "orden" => query.orden = Some(value),
                "page" => query.page = Some(value),
                _ => {}
            }
        }
        query
    }
}

/// Ordering selected by the `fecha` parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateOrder {
    Recent,
    Oldest,
}

impl DateOrder {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "recent" | "recientes" => Some(Self::Recent),
            "oldest" | "antiguos" => Some(Self::Oldest),
            _ => None,
        }
    }
}

/// Ordering selected by the `orden` parameter; overrides [`DateOrder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostOrder {
    Comments,
    Date,
}

impl PostOrder {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "comments" | "comentarios" => Some(Self::Comments),
            "date" | "fecha" => Some(Self::Date),
            _ => None,
        }
    }
}

/// The sort actually applied to a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingSort {
    NewestFirst,
    OldestFirst,
    MostCommented,
    /// No ordering requested; rows come back in insertion order
    Unordered,
}

/// Typed listing filter
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PostFilter {
    pub category_id: Option<i64>,
    pub date_order: Option<DateOrder>,
    pub search: Option<String>,
    pub order: Option<PostOrder>,
}

impl PostFilter {
    /// Interpret raw parameters; values that do not parse are dropped
    pub fn from_query(query: &PostListQuery) -> Self {
        let category_id = query
            .category
            .as_deref()
            .filter(|v| !v.is_empty() && v.chars().all(|c| c.is_ascii_digit()))
            .and_then(|v| v.parse::<i64>().ok());

        Self {
            category_id,
            date_order: query.fecha.as_deref().and_then(DateOrder::parse),
            search: query.q.clone().filter(|q| !q.is_empty()),
            order: query.orden.as_deref().and_then(PostOrder::parse),
        }
    }

    /// Resolve the sort, letting `orden` take precedence over `fecha`
    pub fn sort(&self) -> ListingSort {
        match (self.order, self.date_order) {
            (Some(PostOrder::Comments), _) => ListingSort::MostCommented,
            (Some(PostOrder::Date), _) => ListingSort::NewestFirst,
            (None, Some(DateOrder::Recent)) => ListingSort::NewestFirst,
            (None, Some(DateOrder::Oldest)) => ListingSort::OldestFirst,
            (None, None) => ListingSort::Unordered,
        }
    }

    /// The active filter as a query string without `page`, for pager links
    pub fn to_query_string(&self) -> String {
        let mut parts = Vec::new();
        if let Some(id) = self.category_id {
            parts.push(format!("categoria={}", id));
        }
        if let Some(order) = self.date_order {
            let token = match order {
                DateOrder::Recent => "recientes",
                DateOrder::Oldest => "antiguos",
            };
            parts.push(format!("fecha={}", token));
        }
        if let Some(q) = &self.search {
            parts.push(format!("q={}", urlencoding::encode(q)));
        }
        if let Some(order) = self.order {
            let token = match order {
                PostOrder::Comments => "comentarios",
                PostOrder::Date => "fecha",
            };
            parts.push(format!("orden={}", token));
        }
        parts.join("&")
    }
}

/// Resolve a requested page number against the number of results.
///
/// A missing or non-numeric page is the first page; a number below 1 or
/// past the end is the last page. An empty listing still has page 1.
pub fn resolve_page(requested: Option<&str>, total: i64, per_page: u32) -> u32 {
    let num_pages = total_pages(total, per_page);
    match requested.and_then(|raw| raw.trim().parse::<i64>().ok()) {
        None => 1,
        Some(n) if n < 1 || n > num_pages as i64 => num_pages,
        Some(n) => n as u32,
    }
}

/// Number of pages, never less than one
pub fn total_pages(total: i64, per_page: u32) -> u32 {
    if per_page == 0 || total <= 0 {
        return 1;
    }
    let per_page = per_page as i64;
    ((total + per_page - 1) / per_page) as u32
}

/// Pagination parameters for list queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: POSTS_PER_PAGE,
        }
    }
}

impl ListParams {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    /// Calculate the offset for database queries
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }

    /// Get the limit for database queries
    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    /// Items in the current page
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    /// Current page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
        }
    }

    pub fn total_pages(&self) -> u32 {
        total_pages(self.total, self.per_page)
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Page navigation data for templates
    pub fn pager(&self) -> Pager {
        Pager {
            page: self.page,
            total_pages: self.total_pages(),
            total: self.total,
            has_next: self.has_next(),
            has_prev: self.has_prev(),
            next_page: self.page + 1,
            prev_page: self.page.saturating_sub(1).max(1),
        }
    }
}

/// Serializable page navigation state
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Pager {
    pub page: u32,
    pub total_pages: u32,
    pub total: i64,
    pub has_next: bool,
    pub has_prev: bool,
    pub next_page: u32,
    pub prev_page: u32,
}
