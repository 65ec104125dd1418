//! Tag page (`GET /tags/{name}`)

use axum::{
    extract::{Path, Query, State},
    response::Response,
};
use tera::Context as TeraContext;

use crate::api::categories::PageQuery;
use crate::api::middleware::{ApiError, AppState};
use crate::api::render::PageRequest;

/// Published posts carrying a tag; the name matches regardless of case
pub async fn tag_posts(
    State(state): State<AppState>,
    page: PageRequest,
    Path(name): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let query = PageQuery::from_pairs(pairs);
    let tag = state.tag_service.get_by_name(&name).await?;
    let posts = state
        .post_service
        .tag_page(tag.id, query.page.as_deref())
        .await?;

    let mut context = TeraContext::new();
    context.insert("tag", &tag);
    context.insert("posts", &posts.items);
    context.insert("pager", &posts.pager());
    page.render(&state, "tag_posts.html", &mut context)
}
