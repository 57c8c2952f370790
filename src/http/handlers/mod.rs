//! Route handlers, one module per resource.

pub mod auth;
pub mod conversations;
pub mod health;
pub mod me;
pub mod media;
