pub mod auth;
pub mod security_headers;

pub use auth::{Authenticated, RequireSession};
pub use security_headers::SecurityHeaders;
