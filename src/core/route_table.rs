//! Route registry: build phase and the one-time freeze.
//!
//! Registration takes `&mut self` and is expected to run once at startup.
//! [`RouteTable::freeze`] takes `&self`, so request workers holding a shared
//! reference may race to trigger it; a mutex scoped to the transition makes
//! sure exactly one of them compiles (or loads) the table. After that every
//! read goes through the published [`CompiledTable`] without locking.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, OnceLock, PoisonError},
};

use http::Method;
use once_cell::sync::Lazy;
use regex::Regex;
use sha1::{Digest, Sha1};

use super::{
    compiled::{CompiledAction, CompiledController, CompiledTable, RouteMatch},
    error::{RouteError, RouteResult},
    filters::{FilterRegistry, FilterRejection, RouteFilter},
    pattern::{PathPattern, Segment},
    policy::{Policy, PolicyRecord},
    request::RequestDescriptor,
};
use crate::ports::route_cache::RouteCache;

/// HTTP methods an action may be registered for.
pub const SUPPORTED_METHODS: &[Method] = &[
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::HEAD,
    Method::OPTIONS,
];

static PREFIX_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z0-9_-]+/?)+$").expect("valid prefix regex"));

fn parse_method(method: &str) -> RouteResult<Method> {
    let unsupported = || RouteError::UnsupportedMethod {
        method: method.to_string(),
    };
    let parsed = Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| unsupported())?;
    if SUPPORTED_METHODS.contains(&parsed) {
        Ok(parsed)
    } else {
        Err(unsupported())
    }
}

/// One `(method, pattern)` route inside a controller.
#[derive(Debug)]
pub struct ActionEntry {
    name: String,
    method: Method,
    pattern: PathPattern,
    policy: PolicyRecord,
    constrained: HashSet<String>,
    filters: Arc<FilterRegistry>,
}

impl ActionEntry {
    /// Constrain a pattern variable with a regular expression.
    ///
    /// Each variable may be constrained once; the expression must match the
    /// whole (URL-decoded) segment.
    pub fn parameter(&mut self, name: &str, regex: &str) -> RouteResult<&mut Self> {
        if self.constrained.contains(name) {
            return Err(RouteError::InvalidPatternParameter {
                pattern: self.pattern.raw().to_string(),
                name: name.to_string(),
                reason: "variable is already constrained".to_string(),
            });
        }
        self.pattern.constrain(name, regex)?;
        self.constrained.insert(name.to_string());
        Ok(self)
    }

    pub fn set_allowed_content_types<I, S>(&mut self, content_types: I) -> RouteResult<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.policy.set_allowed_content_types(content_types)?;
        Ok(self)
    }

    pub fn set_https_only(&mut self, https_only: bool) -> RouteResult<&mut Self> {
        self.policy.set_https_only(https_only)?;
        Ok(self)
    }

    pub fn set_ip_allow<I, S>(&mut self, networks: I) -> RouteResult<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.policy.set_ip_allow(networks)?;
        Ok(self)
    }

    pub fn set_ip_deny<I, S>(&mut self, networks: I) -> RouteResult<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.policy.set_ip_deny(networks)?;
        Ok(self)
    }

    pub fn set_filters<I, S>(&mut self, names: I) -> RouteResult<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.policy.set_filters(names, &self.filters)?;
        Ok(self)
    }

    /// Direct access to the write-once policy overrides.
    pub fn policy_mut(&mut self) -> &mut PolicyRecord {
        &mut self.policy
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn policy(&self) -> Policy {
        self.policy.resolve()
    }
}

/// A named URI-prefix grouping of actions with shared policy defaults.
#[derive(Debug)]
pub struct ControllerEntry {
    name: String,
    prefix: String,
    actions: Vec<ActionEntry>,
    policy: PolicyRecord,
    filters: Arc<FilterRegistry>,
}

impl ControllerEntry {
    /// Register an action. Actions are matched in the order they are added.
    pub fn add_action(&mut self, method: &str, uri: &str, name: &str) -> RouteResult<&mut ActionEntry> {
        let method = parse_method(method)?;
        if name.is_empty() {
            return Err(RouteError::EmptyName { kind: "action" });
        }
        if self.actions.iter().any(|a| a.name == name) {
            return Err(RouteError::DuplicateName {
                kind: "action",
                name: name.to_string(),
            });
        }
        let pattern = PathPattern::parse(uri)?;

        tracing::debug!(
            controller = %self.name,
            action = name,
            method = %method,
            pattern = %pattern,
            "Registered action"
        );

        let index = self.actions.len();
        self.actions.push(ActionEntry {
            name: name.to_string(),
            method,
            pattern,
            policy: PolicyRecord::inheriting(self.policy.resolve()),
            constrained: HashSet::new(),
            filters: Arc::clone(&self.filters),
        });
        Ok(&mut self.actions[index])
    }

    pub fn action_mut(&mut self, name: &str) -> RouteResult<&mut ActionEntry> {
        let controller = &self.name;
        self.actions
            .iter_mut()
            .find(|a| a.name == name)
            .ok_or_else(|| RouteError::UnknownAction {
                controller: controller.clone(),
                action: name.to_string(),
            })
    }

    pub fn set_allowed_content_types<I, S>(&mut self, content_types: I) -> RouteResult<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.policy.set_allowed_content_types(content_types)?;
        Ok(self)
    }

    pub fn set_https_only(&mut self, https_only: bool) -> RouteResult<&mut Self> {
        self.policy.set_https_only(https_only)?;
        Ok(self)
    }

    pub fn set_ip_allow<I, S>(&mut self, networks: I) -> RouteResult<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.policy.set_ip_allow(networks)?;
        Ok(self)
    }

    pub fn set_ip_deny<I, S>(&mut self, networks: I) -> RouteResult<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.policy.set_ip_deny(networks)?;
        Ok(self)
    }

    pub fn set_filters<I, S>(&mut self, names: I) -> RouteResult<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.policy.set_filters(names, &self.filters)?;
        Ok(self)
    }

    /// Direct access to the write-once policy overrides. Only actions added
    /// afterwards see the changes.
    pub fn policy_mut(&mut self) -> &mut PolicyRecord {
        &mut self.policy
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn actions(&self) -> &[ActionEntry] {
        &self.actions
    }

    pub fn policy(&self) -> Policy {
        self.policy.resolve()
    }
}

/// The full registry of controllers for one server process.
pub struct RouteTable {
    controllers: Vec<ControllerEntry>,
    defaults: PolicyRecord,
    filters: Arc<FilterRegistry>,
    cache: Option<Arc<dyn RouteCache>>,
    compiled: OnceLock<Arc<CompiledTable>>,
    freeze_lock: Mutex<()>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteTable {
    pub fn new() -> Self {
        Self::with_filters(Arc::new(FilterRegistry::new()))
    }

    /// Create a table whose policies resolve filter names against `filters`.
    pub fn with_filters(filters: Arc<FilterRegistry>) -> Self {
        Self {
            controllers: Vec::new(),
            defaults: PolicyRecord::default(),
            filters,
            cache: None,
            compiled: OnceLock::new(),
            freeze_lock: Mutex::new(()),
        }
    }

    /// Attach a cache consulted (and refreshed) by [`RouteTable::freeze`].
    pub fn with_cache(mut self, cache: Arc<dyn RouteCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn filters(&self) -> &Arc<FilterRegistry> {
        &self.filters
    }

    pub fn is_frozen(&self) -> bool {
        self.compiled.get().is_some()
    }

    fn ensure_building(&self) -> RouteResult<()> {
        if self.is_frozen() {
            Err(RouteError::AlreadyFrozen)
        } else {
            Ok(())
        }
    }

    /// Root policy that controllers inherit when they are created.
    pub fn defaults_mut(&mut self) -> RouteResult<&mut PolicyRecord> {
        self.ensure_building()?;
        Ok(&mut self.defaults)
    }

    pub fn register_filter(&mut self, name: &str, filter: impl RouteFilter + 'static) -> RouteResult<()> {
        self.ensure_building()?;
        self.filters.register(name, filter)
    }

    pub fn register_filter_fn<F>(&mut self, name: &str, filter: F) -> RouteResult<()>
    where
        F: Fn(&RequestDescriptor, &RouteMatch<'_>) -> Result<(), FilterRejection>
            + Send
            + Sync
            + 'static,
    {
        self.ensure_building()?;
        self.filters.register_fn(name, filter)
    }

    /// Register a controller. An empty prefix makes it a root controller.
    pub fn add_controller(&mut self, prefix: &str, name: &str) -> RouteResult<&mut ControllerEntry> {
        self.ensure_building()?;

        let prefix = prefix.trim_matches('/');
        if !prefix.is_empty() && !PREFIX_FORMAT.is_match(prefix) {
            return Err(RouteError::InvalidPrefix {
                prefix: prefix.to_string(),
            });
        }
        if name.is_empty() {
            return Err(RouteError::EmptyName { kind: "controller" });
        }
        if self.controllers.iter().any(|c| c.name == name) {
            return Err(RouteError::DuplicateName {
                kind: "controller",
                name: name.to_string(),
            });
        }

        tracing::debug!(controller = name, prefix, "Registered controller");

        let index = self.controllers.len();
        self.controllers.push(ControllerEntry {
            name: name.to_string(),
            prefix: prefix.to_string(),
            actions: Vec::new(),
            policy: PolicyRecord::inheriting(self.defaults.resolve()),
            filters: Arc::clone(&self.filters),
        });
        Ok(&mut self.controllers[index])
    }

    pub fn controller_mut(&mut self, name: &str) -> RouteResult<&mut ControllerEntry> {
        self.ensure_building()?;
        self.controllers
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| RouteError::UnknownController {
                name: name.to_string(),
            })
    }

    pub fn controllers(&self) -> &[ControllerEntry] {
        &self.controllers
    }

    /// Switch to the query phase and return the compiled table.
    ///
    /// The first call compiles (or loads from the attached cache); every later
    /// call returns the same table.
    pub fn freeze(&self) -> Arc<CompiledTable> {
        Arc::clone(self.frozen())
    }

    /// The compiled table, if the table has been frozen.
    pub fn compiled(&self) -> Option<Arc<CompiledTable>> {
        self.compiled.get().cloned()
    }

    fn frozen(&self) -> &Arc<CompiledTable> {
        if let Some(table) = self.compiled.get() {
            return table;
        }

        let _guard = self
            .freeze_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(table) = self.compiled.get() {
            return table;
        }

        let table = Arc::new(self.load_or_compile());
        self.filters.seal();
        tracing::info!(
            controllers = table.controllers.len(),
            routes = table.route_count(),
            "Route table frozen"
        );
        self.compiled.get_or_init(|| table)
    }

    fn load_or_compile(&self) -> CompiledTable {
        let Some(cache) = &self.cache else {
            return self.compile();
        };

        let fingerprint = self.fingerprint();
        match cache.load(&fingerprint) {
            Ok(Some(table)) => {
                tracing::info!(fingerprint = %fingerprint, "Loaded compiled route table from cache");
                return table;
            }
            Ok(None) => tracing::debug!(fingerprint = %fingerprint, "Route cache miss"),
            Err(e) => tracing::warn!(error = %e, "Route cache unavailable, compiling"),
        }

        let table = self.compile();
        if let Err(e) = cache.save(&fingerprint, &table) {
            tracing::warn!(error = %e, "Failed to persist compiled route table");
        }
        table
    }

    fn compile(&self) -> CompiledTable {
        CompiledTable {
            controllers: self
                .controllers
                .iter()
                .map(|controller| CompiledController {
                    name: controller.name.clone(),
                    prefix: controller.prefix.clone(),
                    actions: controller
                        .actions
                        .iter()
                        .map(|action| CompiledAction {
                            name: action.name.clone(),
                            method: action.method.clone(),
                            pattern: action.pattern.clone(),
                            policy: action.policy.resolve(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    /// Digest of everything that influences the compiled table.
    pub fn fingerprint(&self) -> String {
        fn feed(hasher: &mut Sha1, value: &str) {
            hasher.update(value.as_bytes());
            hasher.update([0u8]);
        }

        let mut hasher = Sha1::new();
        feed(&mut hasher, env!("CARGO_PKG_VERSION"));
        for controller in &self.controllers {
            feed(&mut hasher, &controller.name);
            feed(&mut hasher, &controller.prefix);
            for action in &controller.actions {
                feed(&mut hasher, &action.name);
                feed(&mut hasher, action.method.as_str());
                feed(&mut hasher, action.pattern.raw());
                for segment in action.pattern.segments() {
                    if let Segment::Variable { name, source, .. } = segment {
                        feed(&mut hasher, name);
                        feed(&mut hasher, source);
                    }
                }
                feed(&mut hasher, &format!("{:?}", action.policy.resolve()));
            }
        }
        format!("{:x}", hasher.finalize())
    }

    /// Resolve a request, freezing the table first if needed.
    pub fn match_route(&self, method: &str, uri: &str) -> Option<RouteMatch<'_>> {
        self.frozen().match_route(method, uri)
    }

    /// Conflict report over the frozen table.
    pub fn diagnose(&self) -> Vec<String> {
        self.frozen().diagnose()
    }
}
