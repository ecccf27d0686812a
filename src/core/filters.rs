//! Named pre-dispatch hooks.
//!
//! A route policy refers to filters by name only. The names are checked against
//! this registry when the policy is configured, and the dispatcher takes an
//! immutable snapshot of the registry once the table is frozen.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicBool, Ordering},
    },
};

use http::StatusCode;

use super::{
    compiled::RouteMatch,
    error::{RouteError, RouteResult},
    request::RequestDescriptor,
};

/// Reason a filter refused to let a request reach its action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRejection {
    pub status: StatusCode,
    pub message: String,
}

impl FilterRejection {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl fmt::Display for FilterRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status.as_u16(), self.message)
    }
}

/// Hook executed before the target action runs.
pub trait RouteFilter: Send + Sync {
    /// Inspect a matched request.
    ///
    /// # Returns
    /// * `Ok(())` to continue with the next filter (or the action)
    /// * `Err(FilterRejection)` to stop dispatch with the given status
    fn check(&self, request: &RequestDescriptor, route: &RouteMatch<'_>)
    -> Result<(), FilterRejection>;
}

struct FnFilter<F>(F);

impl<F> RouteFilter for FnFilter<F>
where
    F: Fn(&RequestDescriptor, &RouteMatch<'_>) -> Result<(), FilterRejection> + Send + Sync,
{
    fn check(
        &self,
        request: &RequestDescriptor,
        route: &RouteMatch<'_>,
    ) -> Result<(), FilterRejection> {
        (self.0)(request, route)
    }
}

/// Name to filter mapping shared between the route table and the dispatcher.
#[derive(Default)]
pub struct FilterRegistry {
    filters: RwLock<HashMap<String, Arc<dyn RouteFilter>>>,
    sealed: AtomicBool,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a filter under a unique name.
    pub fn register(&self, name: &str, filter: impl RouteFilter + 'static) -> RouteResult<()> {
        self.insert(name, Arc::new(filter))
    }

    /// Register a closure as a filter.
    pub fn register_fn<F>(&self, name: &str, filter: F) -> RouteResult<()>
    where
        F: Fn(&RequestDescriptor, &RouteMatch<'_>) -> Result<(), FilterRejection>
            + Send
            + Sync
            + 'static,
    {
        self.insert(name, Arc::new(FnFilter(filter)))
    }

    fn insert(&self, name: &str, filter: Arc<dyn RouteFilter>) -> RouteResult<()> {
        if name.is_empty() {
            return Err(RouteError::EmptyName { kind: "filter" });
        }

        let mut filters = self.filters.write().unwrap_or_else(PoisonError::into_inner);
        if self.is_sealed() {
            return Err(RouteError::AlreadyFrozen);
        }
        if filters.contains_key(name) {
            return Err(RouteError::DuplicateFilter {
                name: name.to_string(),
            });
        }

        tracing::debug!(filter = name, "Registered route filter");
        filters.insert(name.to_string(), filter);
        Ok(())
    }

    /// Refuse any further registration. Called when a table using this
    /// registry is frozen.
    pub(crate) fn seal(&self) {
        let _filters = self.filters.write().unwrap_or_else(PoisonError::into_inner);
        self.sealed.store(true, Ordering::Release);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.filters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current registrations, for lock-free use at request time.
    pub fn snapshot(&self) -> HashMap<String, Arc<dyn RouteFilter>> {
        self.filters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let filters = self.filters.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<&String> = filters.keys().collect();
        names.sort();
        f.debug_struct("FilterRegistry").field("filters", &names).finish()
    }
}
