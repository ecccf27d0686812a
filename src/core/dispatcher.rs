//! Request dispatch over a frozen route table.
//!
//! The dispatcher owns everything it needs at request time: the compiled
//! table, a snapshot of the filter registry and the bound handlers. None of it
//! changes after construction, so `resolve` and `handle` take `&self` and can be
//! called from any number of workers.

use std::{collections::HashMap, sync::Arc};

use bytes::Bytes;
use eyre::{Result, WrapErr};
use http::{HeaderValue, Response, StatusCode, header};

use super::{
    compiled::{CompiledTable, RouteMatch},
    error::{RouteError, RouteResult},
    filters::{FilterRejection, FilterRegistry, RouteFilter},
    mime,
    negotiation::negotiate,
    request::RequestDescriptor,
};
use crate::ports::action_handler::{ActionHandler, FnHandler};

/// Everything a handler gets to see about a dispatched request.
#[derive(Debug, Clone, Copy)]
pub struct DispatchContext<'a> {
    pub request: &'a RequestDescriptor,
    pub route: &'a RouteMatch<'a>,
    /// Negotiated response content type
    pub content_type: &'a str,
}

/// Result of running a request through the route checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome<'a> {
    Routed {
        route: RouteMatch<'a>,
        content_type: String,
    },
    NotFound,
    HttpsRequired,
    Forbidden,
    NotAcceptable,
    Rejected(FilterRejection),
}

impl DispatchOutcome<'_> {
    /// Status code used when the outcome is answered without a handler.
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchOutcome::Routed { .. } => StatusCode::OK,
            DispatchOutcome::NotFound => StatusCode::NOT_FOUND,
            DispatchOutcome::HttpsRequired | DispatchOutcome::Forbidden => StatusCode::FORBIDDEN,
            DispatchOutcome::NotAcceptable => StatusCode::NOT_ACCEPTABLE,
            DispatchOutcome::Rejected(rejection) => rejection.status,
        }
    }
}

type HandlerKey = (String, String);

pub struct Dispatcher {
    table: Arc<CompiledTable>,
    filters: HashMap<String, Arc<dyn RouteFilter>>,
    handlers: HashMap<HandlerKey, Arc<dyn ActionHandler>>,
}

impl Dispatcher {
    pub fn new(table: Arc<CompiledTable>, filters: &FilterRegistry) -> Self {
        Self {
            table,
            filters: filters.snapshot(),
            handlers: HashMap::new(),
        }
    }

    pub fn table(&self) -> &Arc<CompiledTable> {
        &self.table
    }

    /// Bind a handler to an existing `controller::action` route.
    pub fn register_handler(
        &mut self,
        controller: &str,
        action: &str,
        handler: impl ActionHandler + 'static,
    ) -> RouteResult<()> {
        self.bind(controller, action, Arc::new(handler))
    }

    /// Bind a closure as the handler of an existing route.
    pub fn register_handler_fn<F>(&mut self, controller: &str, action: &str, handler: F) -> RouteResult<()>
    where
        F: Fn(&DispatchContext<'_>) -> Result<Response<Bytes>> + Send + Sync + 'static,
    {
        self.bind(controller, action, Arc::new(FnHandler(handler)))
    }

    fn bind(&mut self, controller: &str, action: &str, handler: Arc<dyn ActionHandler>) -> RouteResult<()> {
        if !self.table.controllers.iter().any(|c| c.name == controller) {
            return Err(RouteError::UnknownController {
                name: controller.to_string(),
            });
        }
        if self.table.action(controller, action).is_none() {
            return Err(RouteError::UnknownAction {
                controller: controller.to_string(),
                action: action.to_string(),
            });
        }

        let key = (controller.to_string(), action.to_string());
        if self.handlers.contains_key(&key) {
            return Err(RouteError::DuplicateName {
                kind: "handler",
                name: format!("{controller}::{action}"),
            });
        }

        tracing::debug!(controller, action, "Bound action handler");
        self.handlers.insert(key, handler);
        Ok(())
    }

    /// Routes that have no handler bound, as `controller::action`.
    pub fn unbound_actions(&self) -> Vec<String> {
        self.table
            .routes()
            .filter(|(c, a)| !self.handlers.contains_key(&(c.name.clone(), a.name.clone())))
            .map(|(c, a)| format!("{}::{}", c.name, a.name))
            .collect()
    }

    /// Match a request and apply its route policy.
    pub fn resolve(&self, request: &RequestDescriptor) -> DispatchOutcome<'_> {
        let Some(route) = self.table.match_route(&request.method, &request.path) else {
            return DispatchOutcome::NotFound;
        };

        if route.https_only() && !request.secure {
            return DispatchOutcome::HttpsRequired;
        }

        let policy = route.policy;
        if let Some(network) = policy
            .ip_deny
            .iter()
            .find(|network| network.matches(&request.client_ip))
        {
            tracing::debug!(client_ip = %request.client_ip, network = %network, "Client denied");
            return DispatchOutcome::Forbidden;
        }
        if !policy.ip_allow.is_empty()
            && !policy
                .ip_allow
                .iter()
                .any(|network| network.matches(&request.client_ip))
        {
            tracing::debug!(client_ip = %request.client_ip, "Client not in allow list");
            return DispatchOutcome::Forbidden;
        }

        let Some(content_type) = negotiate(&request.accept, route.allowed_content_types()) else {
            return DispatchOutcome::NotAcceptable;
        };

        for name in route.filters() {
            let Some(filter) = self.filters.get(name) else {
                tracing::warn!(filter = %name, "Route refers to an unregistered filter");
                return DispatchOutcome::Rejected(FilterRejection::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("filter '{name}' is not available"),
                ));
            };
            if let Err(rejection) = filter.check(request, &route) {
                tracing::debug!(filter = %name, status = %rejection.status, "Request rejected by filter");
                return DispatchOutcome::Rejected(rejection);
            }
        }

        DispatchOutcome::Routed {
            route,
            content_type,
        }
    }

    /// Resolve a request and turn the outcome into a response.
    pub fn handle(&self, request: &RequestDescriptor) -> Result<Response<Bytes>> {
        let outcome = self.resolve(request);
        let status = outcome.status();
        let (route, content_type) = match outcome {
            DispatchOutcome::Routed {
                route,
                content_type,
            } => (route, content_type),
            DispatchOutcome::Rejected(rejection) => {
                return plain_response(status, &rejection.message);
            }
            _ => return plain_response(status, status.canonical_reason().unwrap_or_default()),
        };

        let key = (route.controller.to_string(), route.action.to_string());
        let Some(handler) = self.handlers.get(&key) else {
            tracing::warn!(controller = route.controller, action = route.action, "No handler bound");
            return plain_response(StatusCode::NOT_IMPLEMENTED, "No handler bound to this route");
        };

        let ctx = DispatchContext {
            request,
            route: &route,
            content_type: &content_type,
        };
        let mut response = handler.handle(&ctx)?;
        if !response.headers().contains_key(header::CONTENT_TYPE) {
            response
                .headers_mut()
                .insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_str(&content_type).wrap_err("Invalid negotiated content type")?,
                );
        }
        Ok(response)
    }
}

fn plain_response(status: StatusCode, message: &str) -> Result<Response<Bytes>> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, mime::TEXT_PLAIN)
        .body(Bytes::from(message.to_string()))
        .wrap_err_with(|| format!("Failed to build {status} response"))
}
