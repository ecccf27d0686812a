//! Inheritable route policy.
//!
//! A [`PolicyRecord`] starts as a copy of its parent's resolved [`Policy`] and
//! lets each field be overridden exactly once. Children copy the parent at the
//! moment they are created, so later changes to a parent never reach existing
//! children.

use serde::{Deserialize, Serialize};

use super::{
    error::{RouteError, RouteResult},
    filters::FilterRegistry,
    mime,
    network::NetworkSpec,
};

/// Resolved policy attached to a compiled action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Response content types the action can produce, most preferred first
    pub allowed_content_types: Vec<String>,
    /// Reject requests that did not arrive over HTTPS
    pub https_only: bool,
    /// When non-empty, only these networks may call the action
    pub ip_allow: Vec<NetworkSpec>,
    /// Networks that may never call the action
    pub ip_deny: Vec<NetworkSpec>,
    /// Filter names, run in order before the action
    pub filters: Vec<String>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            allowed_content_types: vec![mime::APPLICATION_JSON.to_string()],
            https_only: false,
            ip_allow: Vec::new(),
            ip_deny: Vec::new(),
            filters: Vec::new(),
        }
    }
}

/// Write-once overrides on top of an inherited policy.
#[derive(Debug, Clone, Default)]
pub struct PolicyRecord {
    inherited: Policy,
    content_types: Option<Vec<String>>,
    https_only: Option<bool>,
    ip_allow: Option<Vec<NetworkSpec>>,
    ip_deny: Option<Vec<NetworkSpec>>,
    filters: Option<Vec<String>>,
}

impl PolicyRecord {
    /// Start a record from the parent's resolved policy.
    pub fn inheriting(parent: Policy) -> Self {
        Self {
            inherited: parent,
            ..Self::default()
        }
    }

    /// Effective policy: overrides where set, inherited values elsewhere.
    pub fn resolve(&self) -> Policy {
        Policy {
            allowed_content_types: self
                .content_types
                .clone()
                .unwrap_or_else(|| self.inherited.allowed_content_types.clone()),
            https_only: self.https_only.unwrap_or(self.inherited.https_only),
            ip_allow: self.resolved_ip_allow().to_vec(),
            ip_deny: self.resolved_ip_deny().to_vec(),
            filters: self
                .filters
                .clone()
                .unwrap_or_else(|| self.inherited.filters.clone()),
        }
    }

    fn resolved_ip_allow(&self) -> &[NetworkSpec] {
        self.ip_allow.as_deref().unwrap_or(&self.inherited.ip_allow)
    }

    fn resolved_ip_deny(&self) -> &[NetworkSpec] {
        self.ip_deny.as_deref().unwrap_or(&self.inherited.ip_deny)
    }

    pub fn set_allowed_content_types<I, S>(&mut self, content_types: I) -> RouteResult<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ensure_unset(&self.content_types, "content_types")?;

        let content_types = dedup(content_types);
        if let Some(unknown) = content_types.iter().find(|ct| !mime::is_supported(ct)) {
            return Err(RouteError::UnknownValue {
                field: "content_types",
                value: unknown.clone(),
            });
        }
        if content_types.is_empty() {
            return Err(RouteError::EmptyValue {
                field: "content_types",
            });
        }

        self.content_types = Some(content_types);
        Ok(self)
    }

    pub fn set_https_only(&mut self, https_only: bool) -> RouteResult<&mut Self> {
        ensure_unset(&self.https_only, "https_only")?;
        self.https_only = Some(https_only);
        Ok(self)
    }

    pub fn set_ip_allow<I, S>(&mut self, networks: I) -> RouteResult<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ensure_unset(&self.ip_allow, "ip_allow")?;
        let networks = classify_all(networks)?;
        if !networks.is_empty() && !self.resolved_ip_deny().is_empty() {
            return Err(RouteError::ConflictingPolicy);
        }
        self.ip_allow = Some(networks);
        Ok(self)
    }

    pub fn set_ip_deny<I, S>(&mut self, networks: I) -> RouteResult<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ensure_unset(&self.ip_deny, "ip_deny")?;
        let networks = classify_all(networks)?;
        if !networks.is_empty() && !self.resolved_ip_allow().is_empty() {
            return Err(RouteError::ConflictingPolicy);
        }
        self.ip_deny = Some(networks);
        Ok(self)
    }

    pub fn set_filters<I, S>(&mut self, names: I, registry: &FilterRegistry) -> RouteResult<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ensure_unset(&self.filters, "filters")?;

        let names = dedup(names);
        if let Some(unknown) = names.iter().find(|name| !registry.contains(name)) {
            return Err(RouteError::UnknownValue {
                field: "filters",
                value: unknown.clone(),
            });
        }

        self.filters = Some(names);
        Ok(self)
    }
}

fn ensure_unset<T>(slot: &Option<T>, field: &'static str) -> RouteResult<()> {
    match slot {
        Some(_) => Err(RouteError::AlreadySet { field }),
        None => Ok(()),
    }
}

// Keeps the first occurrence of each value.
fn dedup<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for value in values {
        let value = value.as_ref().trim();
        if !out.iter().any(|seen| seen == value) {
            out.push(value.to_string());
        }
    }
    out
}

fn classify_all<I, S>(networks: I) -> RouteResult<Vec<NetworkSpec>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<NetworkSpec> = Vec::new();
    for network in networks {
        let spec = NetworkSpec::classify(network.as_ref())?;
        if !out.contains(&spec) {
            out.push(spec);
        }
    }
    Ok(out)
}
