//! Frozen, query-only form of the route table.
//!
//! A `CompiledTable` is immutable and `Send + Sync`; request workers share it
//! through an `Arc` and match against it without locking. It is also the unit
//! persisted by the route cache, so everything in it is serializable.

use http::Method;
use serde::{Deserialize, Serialize};

use super::{diagnostics, pattern::PathPattern, policy::Policy};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledAction {
    pub name: String,
    #[serde(with = "method_serde")]
    pub method: Method,
    pub pattern: PathPattern,
    pub policy: Policy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledController {
    pub name: String,
    pub prefix: String,
    pub actions: Vec<CompiledAction>,
}

impl CompiledController {
    /// `prefix` + `pattern`, joined with `/` when both are non-empty.
    pub fn full_path(&self, action: &CompiledAction) -> String {
        match (self.prefix.is_empty(), action.pattern.raw().is_empty()) {
            (true, _) => action.pattern.raw().to_string(),
            (false, true) => self.prefix.clone(),
            (false, false) => format!("{}/{}", self.prefix, action.pattern.raw()),
        }
    }

    /// Path left after removing this controller's prefix, if the prefix applies.
    fn strip_prefix<'u>(&self, uri: &'u str) -> Option<&'u str> {
        if self.prefix.is_empty() {
            return Some(uri);
        }
        if uri.is_empty() {
            return None;
        }
        if uri == self.prefix {
            return Some("");
        }
        uri.strip_prefix(self.prefix.as_str())?.strip_prefix('/')
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledTable {
    pub controllers: Vec<CompiledController>,
}

/// A request resolved to exactly one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'a> {
    pub controller: &'a str,
    pub action: &'a str,
    /// Variable values in left-to-right pattern order
    pub parameters: Vec<String>,
    pub policy: &'a Policy,
    pattern: &'a PathPattern,
}

impl RouteMatch<'_> {
    /// Look up an extracted parameter by variable name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.pattern
            .variable_names()
            .position(|n| n == name)
            .and_then(|i| self.parameters.get(i))
            .map(String::as_str)
    }

    pub fn https_only(&self) -> bool {
        self.policy.https_only
    }

    pub fn allowed_content_types(&self) -> &[String] {
        &self.policy.allowed_content_types
    }

    pub fn ip_allow(&self) -> Vec<String> {
        self.policy.ip_allow.iter().map(ToString::to_string).collect()
    }

    pub fn ip_deny(&self) -> Vec<String> {
        self.policy.ip_deny.iter().map(ToString::to_string).collect()
    }

    pub fn filters(&self) -> &[String] {
        &self.policy.filters
    }
}

impl CompiledTable {
    /// Resolve a request to an action.
    ///
    /// Controllers and their actions are tried in registration order and the
    /// first action that fits wins; a more specific route registered later is
    /// never considered once an earlier one matches.
    pub fn match_route(&self, method: &str, uri: &str) -> Option<RouteMatch<'_>> {
        let method = Method::from_bytes(method.as_bytes()).ok()?;
        let uri = uri.trim_matches('/');

        for controller in &self.controllers {
            let Some(residual) = controller.strip_prefix(uri) else {
                continue;
            };

            for action in controller.actions.iter().filter(|a| a.method == method) {
                if let Some(parameters) = action.pattern.match_path(residual) {
                    tracing::trace!(
                        controller = %controller.name,
                        action = %action.name,
                        "Matched route"
                    );
                    return Some(RouteMatch {
                        controller: &controller.name,
                        action: &action.name,
                        parameters,
                        policy: &action.policy,
                        pattern: &action.pattern,
                    });
                }
            }
        }

        None
    }

    /// Human-readable descriptions of ambiguous routes. Empty when none.
    pub fn diagnose(&self) -> Vec<String> {
        diagnostics::diagnose(self)
    }

    pub fn action(&self, controller: &str, action: &str) -> Option<&CompiledAction> {
        self.controllers
            .iter()
            .find(|c| c.name == controller)?
            .actions
            .iter()
            .find(|a| a.name == action)
    }

    /// Every `(controller, action)` pair in match order.
    pub fn routes(&self) -> impl Iterator<Item = (&CompiledController, &CompiledAction)> {
        self.controllers
            .iter()
            .flat_map(|c| c.actions.iter().map(move |a| (c, a)))
    }

    pub fn route_count(&self) -> usize {
        self.controllers.iter().map(|c| c.actions.len()).sum()
    }
}

mod method_serde {
    use http::Method;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(method: &Method, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(method.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Method, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Method::from_bytes(raw.as_bytes()).map_err(D::Error::custom)
    }
}
