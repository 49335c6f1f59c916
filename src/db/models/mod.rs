//! Typed views over stored documents and API payloads.

pub mod cart;
pub mod user;

pub use cart::*;
pub use user::*;
