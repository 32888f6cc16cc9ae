pub mod auth;

pub use auth::{AdminUser, CurrentUser, MaybeUser, optional_auth, require_auth};
