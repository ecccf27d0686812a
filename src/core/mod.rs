pub mod compiled;
pub mod diagnostics;
pub mod dispatcher;
pub mod error;
pub mod filters;
pub mod mime;
pub mod negotiation;
pub mod network;
pub mod pattern;
pub mod policy;
pub mod request;
pub mod route_table;

pub use compiled::{CompiledAction, CompiledController, CompiledTable, RouteMatch};
pub use dispatcher::{DispatchContext, DispatchOutcome, Dispatcher};
pub use error::{RouteError, RouteResult};
pub use filters::{FilterRegistry, FilterRejection, RouteFilter};
pub use negotiation::negotiate;
pub use network::{NetworkSpec, network_matches};
pub use policy::{Policy, PolicyRecord};
pub use request::RequestDescriptor;
pub use route_table::{ActionEntry, ControllerEntry, RouteTable, SUPPORTED_METHODS};
