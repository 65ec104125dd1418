//! Bitácora - a small server-rendered blog
//!
//! Staff publish posts with categories, tags and image galleries; visitors
//! browse, filter and comment.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod forms;
pub mod models;
pub mod services;
pub mod theme;
