//! Post listing SQL
//!
//! Builds the `WHERE` and `ORDER BY` clauses of every post listing from a
//! [`PostQuery`]. The output only uses `?` placeholders and portable SQL, so
//! SQLite and MySQL share it.

use crate::models::{DateOrder, ListingSort, PostFilter};

/// Which posts a listing draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostScope {
    /// Every published post
    Public,
    /// Published posts carrying a tag
    Tag(i64),
    /// All posts of one author, published or not
    Author(i64),
}

/// A listing request: scope plus the user-facing filter
#[derive(Debug, Clone, PartialEq)]
pub struct PostQuery {
    pub scope: PostScope,
    pub filter: PostFilter,
}

impl PostQuery {
    pub fn public(filter: PostFilter) -> Self {
        Self {
            scope: PostScope::Public,
            filter,
        }
    }

    /// Published posts, newest first
    pub fn latest() -> Self {
        Self::public(newest_first())
    }

    /// Published posts of a category, newest first
    pub fn in_category(category_id: i64) -> Self {
        Self::public(PostFilter {
            category_id: Some(category_id),
            ..newest_first()
        })
    }

    /// Published posts of a tag, newest first
    pub fn tagged(tag_id: i64) -> Self {
        Self {
            scope: PostScope::Tag(tag_id),
            filter: newest_first(),
        }
    }

    /// Everything an author wrote, newest first
    pub fn by_author(author_id: i64) -> Self {
        Self {
            scope: PostScope::Author(author_id),
            filter: newest_first(),
        }
    }
}

fn newest_first() -> PostFilter {
    PostFilter {
        date_order: Some(DateOrder::Recent),
        ..PostFilter::default()
    }
}

/// A value bound to a `?` placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Int(i64),
    Text(String),
}

/// Clauses for a listing query. Binds are in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingSql {
    pub where_clause: String,
    pub order_clause: String,
    pub binds: Vec<SqlValue>,
}

/// Columns of a [`PostCard`](crate::models::PostCard) row
pub const POST_CARD_SELECT: &str = r#"
    SELECT p.id, p.title, p.content, p.author_id, p.created_at, p.image,
           p.category_id, p.published,
           u.username AS author_username,
           c.name AS category_name,
           (SELECT COUNT(*) FROM comments cm WHERE cm.post_id = p.id) AS comment_count
    FROM posts p
    INNER JOIN users u ON u.id = p.author_id
    LEFT JOIN categories c ON c.id = p.category_id
"#;

/// Escape `%`, `_` and the escape character itself for `LIKE ... ESCAPE '!'`
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '!' | '%' | '_') {
            escaped.push('!');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Compose the listing clauses.
///
/// Conditions are applied in a fixed order: scope, category, search. The
/// sort comes from [`PostFilter::sort`]; every sort ends with `p.id` so
/// pages never overlap.
pub fn build_listing_sql(query: &PostQuery) -> ListingSql {
    let mut conditions = Vec::new();
    let mut binds = Vec::new();

    match query.scope {
        PostScope::Public => conditions.push("p.published = 1".to_string()),
        PostScope::Tag(tag_id) => {
            conditions.push("p.published = 1".to_string());
            conditions.push(
                "EXISTS (SELECT 1 FROM post_tags pt WHERE pt.post_id = p.id AND pt.tag_id = ?)"
                    .to_string(),
            );
            binds.push(SqlValue::Int(tag_id));
        }
        PostScope::Author(author_id) => {
            conditions.push("p.author_id = ?".to_string());
            binds.push(SqlValue::Int(author_id));
        }
    }

    if let Some(category_id) = query.filter.category_id {
        conditions.push("p.category_id = ?".to_string());
        binds.push(SqlValue::Int(category_id));
    }

    if let Some(search) = &query.filter.search {
        conditions.push(
            "(p.title LIKE ? ESCAPE '!' OR p.content LIKE ? ESCAPE '!')".to_string(),
        );
        let pattern = escape_like(search);
        binds.push(SqlValue::Text(pattern.clone()));
        binds.push(SqlValue::Text(pattern));
    }

    let order_clause = match query.filter.sort() {
        ListingSort::NewestFirst => "ORDER BY p.created_at DESC, p.id DESC",
        ListingSort::OldestFirst => "ORDER BY p.created_at ASC, p.id ASC",
        ListingSort::MostCommented => "ORDER BY comment_count DESC, p.id DESC",
        ListingSort::Unordered => "ORDER BY p.id ASC",
    };

    ListingSql {
        where_clause: format!("WHERE {}", conditions.join(" AND ")),
        order_clause: order_clause.to_string(),
        binds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PostOrder;

    #[test]
    fn test_public_listing_is_published_only() {
        let sql = build_listing_sql(&PostQuery::public(PostFilter::default()));
        assert_eq!(sql.where_clause, "WHERE p.published = 1");
        assert_eq!(sql.order_clause, "ORDER BY p.id ASC");
        assert!(sql.binds.is_empty());
    }

    #[test]
    fn test_category_then_search_bind_order() {
        let filter = PostFilter {
            category_id: Some(3),
            search: Some("zelda".to_string()),
            ..PostFilter::default()
        };
        let sql = build_listing_sql(&PostQuery::public(filter));
        assert_eq!(
            sql.where_clause,
            "WHERE p.published = 1 AND p.category_id = ? AND (p.title LIKE ? ESCAPE '!' OR p.content LIKE ? ESCAPE '!')"
        );
        assert_eq!(
            sql.binds,
            vec![
                SqlValue::Int(3),
                SqlValue::Text("%zelda%".to_string()),
                SqlValue::Text("%zelda%".to_string()),
            ]
        );
    }

    #[test]
    fn test_order_override() {
        let filter = PostFilter {
            date_order: Some(DateOrder::Oldest),
            order: Some(PostOrder::Comments),
            ..PostFilter::default()
        };
        let sql = build_listing_sql(&PostQuery::public(filter));
        assert_eq!(sql.order_clause, "ORDER BY comment_count DESC, p.id DESC");

        let filter = PostFilter {
            date_order: Some(DateOrder::Oldest),
            ..PostFilter::default()
        };
        let sql = build_listing_sql(&PostQuery::public(filter));
        assert_eq!(sql.order_clause, "ORDER BY p.created_at ASC, p.id ASC");
    }

    #[test]
    fn test_author_scope_includes_unpublished() {
        let sql = build_listing_sql(&PostQuery::by_author(9));
        assert_eq!(sql.where_clause, "WHERE p.author_id = ?");
        assert_eq!(sql.binds, vec![SqlValue::Int(9)]);
        assert_eq!(sql.order_clause, "ORDER BY p.created_at DESC, p.id DESC");
    }

    #[test]
    fn test_tag_scope() {
        let sql = build_listing_sql(&PostQuery::tagged(4));
        assert!(sql.where_clause.starts_with("WHERE p.published = 1 AND EXISTS"));
        assert_eq!(sql.binds, vec![SqlValue::Int(4)]);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("100%"), "%100!%%");
        assert_eq!(escape_like("a_b"), "%a!_b%");
        assert_eq!(escape_like("hola!"), "%hola!!%");
        assert_eq!(escape_like("acción"), "%acción%");
    }
}
