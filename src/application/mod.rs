//! Application services layer.

pub mod accounts;
pub mod comments;
pub mod error;
pub mod pagination;
pub mod passwords;
pub mod posts;
pub mod repos;
pub mod sentiment;
pub mod stats;
pub mod tokens;
pub mod validation;
