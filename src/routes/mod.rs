//! Route tables: resource CRUD plus the fixed endpoints.

pub mod common;
pub mod resource;
pub use common::common_routes;
pub use resource::resource_routes;
