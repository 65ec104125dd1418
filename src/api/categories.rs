//! Category page (`GET /categoria/{name}`)

use axum::{
    extract::{Path, Query, State},
    response::Response,
};
use tera::Context as TeraContext;

use crate::api::middleware::{ApiError, AppState};
use crate::api::render::PageRequest;
use crate::services::LATEST_POSTS_LIMIT;

/// `?page=` of the paginated archive pages
#[derive(Debug, Default)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    /// A repeated `page` keeps its last value
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let page = pairs
            .into_iter()
            .filter(|(key, _)| key == "page")
            .map(|(_, value)| value)
            .last();
        Self { page }
    }
}

/// Published posts of a category, looked up by its exact name, with the
/// latest posts of the whole blog beside them
pub async fn category_posts(
    State(state): State<AppState>,
    page: PageRequest,
    Path(name): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let query = PageQuery::from_pairs(pairs);
    let category = state.category_service.get_by_name(&name).await?;
    let posts = state
        .post_service
        .category_page(category.id, query.page.as_deref())
        .await?;
    let latest = state.post_service.latest(LATEST_POSTS_LIMIT).await?;

    let mut context = TeraContext::new();
    context.insert("category", &category);
    context.insert("posts", &posts.items);
    context.insert("pager", &posts.pager());
    context.insert("latest_posts", &latest);
    page.render(&state, "category_posts.html", &mut context)
}
