//! Services layer - Business logic
//!
//! Services are responsible for:
//! - Enforcing who may do what (staff, authors, signed-in users)
//! - Coordinating repositories, the cache and media storage
//! - Turning storage results into typed errors the HTTP layer can map

pub mod category;
pub mod comment;
pub mod media;
pub mod password;
pub mod post;
pub mod tag;
pub mod user;

pub use category::{CategoryService, CategoryServiceError};
pub use comment::{CommentService, CommentServiceError};
pub use media::{MediaStore, UploadedFile};
pub use password::{hash_password, verify_password};
pub use post::{PostListing, PostService, PostServiceError, PostSubmission, LATEST_POSTS_LIMIT};
pub use tag::{normalize_tags, TagService, TagServiceError};
pub use user::{UserService, UserServiceError};
