//! Bearer-token authentication.

pub mod middleware;
pub mod models;

pub use middleware::{auth_middleware, AuthState};
pub use models::{CallerContext, Claims, SYSTEM_ADMIN_ROLE};
