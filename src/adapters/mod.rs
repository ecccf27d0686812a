pub mod file_cache;
pub mod http_request;

/// Re-export commonly used types from adapters
pub use file_cache::FileRouteCache;
pub use http_request::{PathOptions, describe_request};
