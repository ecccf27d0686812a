pub mod builder;
pub mod loader;
pub mod models;
pub mod validation;

pub use builder::{build_route_table, placeholder_filters, route_cache};
pub use loader::load_config;
pub use models::*;
pub use validation::{DispatchConfigValidator, ValidationError, ValidationResult};
