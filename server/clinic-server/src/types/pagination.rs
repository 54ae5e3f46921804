//! Pagination types for list endpoints

use database_layer::PageRequest;
use serde::Deserialize;
use utoipa::IntoParams;

/// Standard pagination parameters for list endpoints
///
/// List filters that carry their own fields embed `page` and `page_size`
/// directly and convert through [`page_request`].
#[derive(Debug, Deserialize, IntoParams, Clone, Copy, Default)]
pub struct PaginationParams {
    #[param(example = 1, minimum = 1)]
    pub page: Option<u32>,

    #[param(example = 20, minimum = 1, maximum = 100)]
    pub page_size: Option<u32>,
}

impl PaginationParams {
    /// Get the page number (defaults to 1, minimum 1)
    pub fn page(&self) -> u32 {
        self.to_page_request().page
    }

    /// Get the page size (defaults to 20, clamped between 1 and 100)
    pub fn page_size(&self) -> u32 {
        self.to_page_request().page_size
    }

    pub fn to_page_request(&self) -> PageRequest {
        page_request(self.page, self.page_size)
    }
}

/// Clamp raw `page` / `page_size` query values
pub fn page_request(page: Option<u32>, page_size: Option<u32>) -> PageRequest {
    PageRequest::new(page, page_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults() {
        let params = PaginationParams { page: None, page_size: None };
        assert_eq!(params.page(), 1);
        assert_eq!(params.page_size(), 20);
    }

    #[test]
    fn test_pagination_with_values() {
        let params = PaginationParams { page: Some(2), page_size: Some(50) };
        assert_eq!(params.to_page_request().offset(), 50);
    }

    #[test]
    fn test_page_min_clamp() {
        let params = PaginationParams { page: Some(0), page_size: Some(20) };
        assert_eq!(params.page(), 1);
    }

    #[test]
    fn test_page_size_clamps() {
        assert_eq!(PaginationParams { page: Some(1), page_size: Some(200) }.page_size(), 100);
        assert_eq!(PaginationParams { page: Some(1), page_size: Some(0) }.page_size(), 1);
    }
}
