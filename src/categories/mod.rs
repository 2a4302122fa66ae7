pub mod repo;

pub use repo::{normalize_name, Category};
