//! Category model

use serde::{Deserialize, Serialize};

/// A flat post category. Posts keep working when their category is removed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

impl Category {
    /// The ID will be set to 0 and should be assigned by the database.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
        }
    }
}
