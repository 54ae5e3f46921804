//! Shared request types

pub mod pagination;

pub use pagination::PaginationParams;
