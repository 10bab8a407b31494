//! Public APIs consumed by the excluded admin tooling.

pub mod admin;

pub use admin::AdminApi;
