//! Data models
//!
//! Models represent:
//! - Database entities (Post, Category, Tag, User, Session, Comment, GalleryImage)
//! - Listing parameters and pagination
//! - Internal data transfer objects

mod category;
mod comment;
mod listing;
mod post;
mod session;
mod tag;
mod user;

pub use category::Category;
pub use comment::{Comment, CommentWithAuthor, CreateCommentInput};
pub use listing::{
    resolve_page, total_pages, DateOrder, ListParams, ListingSort, PagedResult, Pager,
    PostFilter, PostListQuery, PostOrder, POSTS_PER_PAGE,
};
pub use post::{
    CreatePostInput, GalleryImage, ImageChange, NewGalleryImage, Post, PostCard, PostDetail,
    UpdatePostInput,
};
pub use session::Session;
pub use tag::{tag_key, Tag, TagWithCount};
pub use user::{CreateUserInput, User};
