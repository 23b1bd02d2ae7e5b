//! HTTP handlers for resources.

pub mod resource;
pub use resource::*;
