//! Session tokens and request gates.
//!
//! Tokens are stateless HS256 JWTs. [`AuthUser`] verifies the bearer token
//! on a request; [`AdminUser`] additionally re-reads the caller's role from
//! the store on every request.

pub mod extract;
pub mod tokens;

pub use extract::{require_admin, AdminUser, AuthUser};
pub use tokens::{issue_session_token, Claims, IssueError, SessionTokens, TokenError};
