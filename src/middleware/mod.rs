//! Middleware components for HTTP request processing.
//!
//! Cross-cutting response handling that is independent of individual route
//! handlers. Authentication is not middleware here; it is implemented as the
//! [`crate::auth::AuthorizedUser`] extractor so that routes with anonymous
//! read access stay trivial.

pub mod security_headers;
