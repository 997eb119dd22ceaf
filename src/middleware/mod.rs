pub mod auth;
pub mod request;

pub use auth::RequireOperatorKey;
pub use request::{ApiJson, ApiQuery, BODY_LIMIT};
