pub mod action_handler;
pub mod route_cache;

pub use action_handler::ActionHandler;
pub use route_cache::{CacheError, CacheResult, RouteCache};
