//! restroute - controller/action request dispatch with inherited access policy.
//!
//! Requests are resolved to exactly one action of a registered controller, then
//! checked against that action's policy before any application code runs. The
//! policy covers HTTPS enforcement, IP allow and deny lists, response content
//! negotiation and named pre-dispatch filters. Each controller inherits from the
//! table defaults, and each action from its controller.
//!
//! # Features
//! - Registration-order first-match routing with `<name>` path variables and
//!   per-variable regex constraints
//! - Write-once, copy-on-create policy inheritance (table → controller → action)
//! - IPv4 allow/deny lists: single address, wildcard, CIDR and inclusive range
//! - `Accept`-driven content negotiation
//! - Build-time diagnostic for ambiguous routes
//! - Optional file cache of the compiled table
//! - TOML / YAML / JSON configuration with environment overrides
//!
//! # Quick Example
//! ```no_run
//! use restroute::{Dispatcher, RequestDescriptor, RouteTable};
//!
//! # fn main() -> eyre::Result<()> {
//! let mut table = RouteTable::new();
//! table
//!     .add_controller("users", "users")?
//!     .add_action("GET", "<id>", "show")?
//!     .parameter("id", r"\d+")?;
//!
//! let mut dispatcher = Dispatcher::new(table.freeze(), table.filters());
//! dispatcher.register_handler_fn("users", "show", |ctx| {
//!     let id = ctx.route.param("id").unwrap_or_default();
//!     Ok(http::Response::new(bytes::Bytes::from(format!("{{\"id\":{id}}}"))))
//! })?;
//!
//! let response = dispatcher.handle(&RequestDescriptor::new("GET", "users/7"))?;
//! assert_eq!(response.status(), http::StatusCode::OK);
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! The crate separates **ports** (traits) from **adapters** (implementations) while keeping
//! the routing logic inside `core`. Registration happens on a mutable [`RouteTable`];
//! [`RouteTable::freeze`] produces an immutable [`CompiledTable`] that request workers
//! share without locking.
//!
//! # Error Handling
//! Registration problems are [`RouteError`]s and must abort startup. Request-time outcomes
//! are plain values ([`DispatchOutcome`], `Option`). Application-level APIs return
//! `eyre::Result<T>` with context attached using `WrapErr`.
pub mod config;
pub mod ports;
pub mod tracing_setup;

pub mod adapters;
pub mod core;

// Re-export the types most embedders need
pub use crate::{
    adapters::{FileRouteCache, PathOptions, describe_request},
    core::{
        CompiledTable, DispatchContext, DispatchOutcome, Dispatcher, FilterRegistry,
        FilterRejection, RequestDescriptor, RouteError, RouteFilter, RouteMatch, RouteTable,
        negotiate, network_matches,
    },
    ports::{ActionHandler, RouteCache},
};
