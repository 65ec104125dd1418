//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the operations for one entity; listing SQL lives
//! in `post_query` so both backends share it.

pub mod category;
pub mod comment;
pub mod post;
pub mod post_query;
pub mod session;
pub mod tag;
pub mod user;

pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use comment::{CommentRepository, SqlxCommentRepository};
pub use post::{PostRepository, SqlxPostRepository};
pub use post_query::{PostQuery, PostScope};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use tag::{SqlxTagRepository, TagRepository};
pub use user::{SqlxUserRepository, UserRepository};
