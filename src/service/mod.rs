//! Document operations: list queries and CRUD with relation handling.

mod crud;
pub mod query;
pub use crud::{generate_id, CrudService};
pub use query::{ListQuery, Page, Pagination};
