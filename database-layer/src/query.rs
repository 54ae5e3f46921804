//! Query builder utilities for filtered, paginated list queries
//!
//! List endpoints run the same filters twice: once for the page of rows and
//! once for the total count. Repositories describe their filters in a single
//! function and apply it to both builders.

use sqlx::postgres::PgArguments;
use sqlx::query::{QueryAs, QueryScalar};
use sqlx::{Postgres, QueryBuilder};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Requested page of a list query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// Clamp raw query parameters: page >= 1, 1 <= page_size <= 100
    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of rows plus the unpaginated total
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub request: PageRequest,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            request: self.request,
        }
    }
}

/// Paginated query builder for consistent query construction
///
/// ```rust
/// use database_layer::query::{PaginatedQuery, PageRequest};
///
/// let mut query = PaginatedQuery::new("SELECT * FROM payments WHERE 1=1");
/// query
///     .filter_eq("patient_id", Some(uuid::Uuid::new_v4()))
///     .order_by("created_at DESC")
///     .paginate(PageRequest::new(Some(2), Some(10)));
/// assert!(query.sql().ends_with("LIMIT $2 OFFSET $3"));
/// ```
pub struct PaginatedQuery<'a> {
    query: QueryBuilder<'a, Postgres>,
}

impl<'a> PaginatedQuery<'a> {
    /// The base query must already contain a WHERE clause; filters append `AND ...`
    pub fn new(base_query: &str) -> Self {
        Self {
            query: QueryBuilder::new(base_query),
        }
    }

    /// Add an equality filter (only if value is Some)
    pub fn filter_eq<T>(&mut self, column: &str, value: Option<T>) -> &mut Self
    where
        T: 'a + sqlx::Encode<'a, Postgres> + sqlx::Type<Postgres> + Send,
    {
        if let Some(val) = value {
            self.query.push(format!(" AND {} = ", column));
            self.query.push_bind(val);
        }
        self
    }

    /// Add a lower bound filter (only if value is Some)
    pub fn filter_gte<T>(&mut self, column: &str, value: Option<T>) -> &mut Self
    where
        T: 'a + sqlx::Encode<'a, Postgres> + sqlx::Type<Postgres> + Send,
    {
        if let Some(val) = value {
            self.query.push(format!(" AND {} >= ", column));
            self.query.push_bind(val);
        }
        self
    }

    /// Add a strict upper bound filter (only if value is Some)
    pub fn filter_lt<T>(&mut self, column: &str, value: Option<T>) -> &mut Self
    where
        T: 'a + sqlx::Encode<'a, Postgres> + sqlx::Type<Postgres> + Send,
    {
        if let Some(val) = value {
            self.query.push(format!(" AND {} < ", column));
            self.query.push_bind(val);
        }
        self
    }

    /// Append a raw condition that binds one value, `{}` marks the placeholder
    pub fn filter_raw<T>(&mut self, condition: &str, value: T) -> &mut Self
    where
        T: 'a + sqlx::Encode<'a, Postgres> + sqlx::Type<Postgres> + Send,
    {
        let (before, after) = condition.split_once("{}").unwrap_or((condition, ""));
        self.query.push(" AND ");
        self.query.push(before);
        self.query.push_bind(value);
        self.query.push(after);
        self
    }

    /// Add ORDER BY clause
    pub fn order_by(&mut self, ordering: &str) -> &mut Self {
        self.query.push(format!(" ORDER BY {}", ordering));
        self
    }

    /// Apply pagination
    pub fn paginate(&mut self, page: PageRequest) -> &mut Self {
        self.query.push(" LIMIT ");
        self.query.push_bind(page.limit());
        self.query.push(" OFFSET ");
        self.query.push_bind(page.offset());
        self
    }

    /// Build the final query as a typed query for fetching specific types
    pub fn build_query_as<T>(&mut self) -> QueryAs<'_, Postgres, T, PgArguments>
    where
        T: for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow>,
    {
        self.query.build_query_as()
    }

    /// Build a single-column query, used for `COUNT(*)`
    pub fn build_query_scalar<T>(&mut self) -> QueryScalar<'_, Postgres, T, PgArguments>
    where
        T: sqlx::Type<Postgres> + for<'r> sqlx::Decode<'r, Postgres>,
        (T,): for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow>,
    {
        self.query.build_query_scalar()
    }

    /// SQL generated so far
    pub fn sql(&self) -> &str {
        self.query.sql()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_page_request_defaults() {
        let page = PageRequest::new(None, None);
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 20);
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn test_page_request_clamps() {
        assert_eq!(PageRequest::new(Some(0), Some(0)), PageRequest { page: 1, page_size: 1 });
        assert_eq!(PageRequest::new(Some(3), Some(500)).page_size, 100);
        assert_eq!(PageRequest::new(Some(3), Some(50)).offset(), 100);
    }

    #[test]
    fn test_filter_eq_with_none() {
        let mut query = PaginatedQuery::new("SELECT * FROM appointments a WHERE 1=1");
        query.filter_eq("a.status", None::<String>);
        assert_eq!(query.sql(), "SELECT * FROM appointments a WHERE 1=1");
    }

    #[test]
    fn test_chaining_filters() {
        let mut query = PaginatedQuery::new("SELECT * FROM appointments a WHERE 1=1");
        query
            .filter_eq("a.patient_id", Some(Uuid::new_v4()))
            .filter_gte("a.scheduled_at", Some(chrono::Utc::now()))
            .order_by("a.scheduled_at ASC")
            .paginate(PageRequest::new(Some(2), Some(25)));

        assert_eq!(
            query.sql(),
            "SELECT * FROM appointments a WHERE 1=1 AND a.patient_id = $1 AND a.scheduled_at >= $2 \
             ORDER BY a.scheduled_at ASC LIMIT $3 OFFSET $4"
        );
    }

    #[test]
    fn test_filter_raw_places_binding() {
        let mut query = PaginatedQuery::new("SELECT COUNT(*) FROM users u WHERE 1=1");
        query.filter_raw("EXISTS (SELECT 1 FROM appointments a WHERE a.patient_id = u.id AND a.doctor_id = {})", Uuid::new_v4());
        assert!(query.sql().ends_with("a.doctor_id = $1)"));
    }

    #[test]
    fn test_page_map_keeps_total() {
        let page = Page { items: vec![1, 2], total: 7, request: PageRequest::default() };
        let mapped = page.map(|n| n * 10);
        assert_eq!(mapped.items, vec![10, 20]);
        assert_eq!(mapped.total, 7);
    }
}
