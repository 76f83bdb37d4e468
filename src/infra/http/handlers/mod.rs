//! API handlers organized by resource type.

mod auth;
mod comments;
mod media;
mod posts;
mod sentiment;
mod stats;
mod system;
mod users;

pub use auth::*;
pub use comments::*;
pub use media::*;
pub use posts::*;
pub use sentiment::*;
pub use stats::*;
pub use system::*;
pub use users::*;
