pub mod api;
pub mod query;


pub use api::{SearchApiClient, SearchTransport, TokenSource};
pub use query::{QueryBuilder, QueryOptions, SearchQuery, DEFAULT_FIELDS, DEFAULT_MAX_RESULTS};
