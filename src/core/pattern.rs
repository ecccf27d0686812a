//! URI patterns with named variable segments.
//!
//! A pattern is split on `/`. A segment written as `<name>` is a variable bound
//! to a regular expression (default [`DEFAULT_PARAMETER_REGEX`]); every other
//! segment is a literal. Expressions are anchored at both ends, so a constraint
//! always has to cover the whole segment.

use std::{collections::BTreeMap, fmt};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::{RouteError, RouteResult};

/// Expression used for a variable segment that has no explicit constraint.
pub const DEFAULT_PARAMETER_REGEX: &str = "[^/]+";

static VARIABLE_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<([A-Za-z_][A-Za-z0-9_]*)>$").expect("valid variable regex"));

#[derive(Debug, Clone)]
pub enum Segment {
    Literal(String),
    Variable {
        name: String,
        /// Expression as written, without anchors
        source: String,
        regex: Regex,
    },
}

impl Segment {
    fn variable(name: &str, source: &str) -> Result<Self, regex::Error> {
        Ok(Segment::Variable {
            name: name.to_string(),
            source: source.to_string(),
            regex: Regex::new(&format!("^(?:{source})$"))?,
        })
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Segment::Variable { .. })
    }

    /// Literal text, or `None` for a variable.
    pub fn literal(&self) -> Option<&str> {
        match self {
            Segment::Literal(text) => Some(text),
            Segment::Variable { .. } => None,
        }
    }
}

impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Segment::Literal(a), Segment::Literal(b)) => a == b,
            (
                Segment::Variable {
                    name: a, source: sa, ..
                },
                Segment::Variable {
                    name: b, source: sb, ..
                },
            ) => a == b && sa == sb,
            _ => false,
        }
    }
}

impl Eq for Segment {}

/// A parsed action URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PatternRepr", into = "PatternRepr")]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parse a URI pattern. Leading and trailing `/` are ignored.
    pub fn parse(uri: &str) -> RouteResult<Self> {
        let raw = uri.trim_matches('/').to_string();
        let mut segments = Vec::new();

        if !raw.is_empty() {
            for part in raw.split('/') {
                let Some(captures) = VARIABLE_SEGMENT.captures(part) else {
                    if part.len() > 1 && part.starts_with('<') && part.ends_with('>') {
                        return Err(RouteError::InvalidPatternParameter {
                            pattern: raw.clone(),
                            name: part[1..part.len() - 1].to_string(),
                            reason: "variable names use letters, digits and '_' and must not start with a digit"
                                .to_string(),
                        });
                    }
                    segments.push(Segment::Literal(part.to_string()));
                    continue;
                };

                let name = &captures[1];
                if segments
                    .iter()
                    .any(|s: &Segment| matches!(s, Segment::Variable { name: n, .. } if n == name))
                {
                    return Err(RouteError::InvalidPatternParameter {
                        pattern: raw.clone(),
                        name: name.to_string(),
                        reason: "variable appears more than once".to_string(),
                    });
                }

                let segment = Segment::variable(name, DEFAULT_PARAMETER_REGEX).map_err(|e| {
                    RouteError::InvalidPatternParameter {
                        pattern: raw.clone(),
                        name: name.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                segments.push(segment);
            }
        }

        Ok(Self { raw, segments })
    }

    /// Bind a variable to a custom expression.
    pub fn constrain(&mut self, name: &str, source: &str) -> RouteResult<()> {
        let error = |reason: String| RouteError::InvalidPatternParameter {
            pattern: self.raw.clone(),
            name: name.to_string(),
            reason,
        };

        let Some(index) = self
            .segments
            .iter()
            .position(|s| matches!(s, Segment::Variable { name: n, .. } if n == name))
        else {
            return Err(error("no such variable in pattern".to_string()));
        };

        let segment = Segment::variable(name, source).map_err(|e| error(e.to_string()))?;
        self.segments[index] = segment;
        Ok(())
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn has_variables(&self) -> bool {
        self.segments.iter().any(Segment::is_variable)
    }

    pub fn contains_variable(&self, name: &str) -> bool {
        self.variable_names().any(|n| n == name)
    }

    /// Variable names in left-to-right order.
    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Variable { name, .. } => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Match a prefix-stripped path.
    ///
    /// Returns the URL-decoded variable values in pattern order, or `None` when
    /// the path does not fit the pattern.
    pub fn match_path(&self, path: &str) -> Option<Vec<String>> {
        if !self.has_variables() {
            return (path == self.raw).then(Vec::new);
        }

        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut values = Vec::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(text) => {
                    if text != part {
                        return None;
                    }
                }
                Segment::Variable { regex, .. } => {
                    let decoded = urlencoding::decode(part).ok()?;
                    if !regex.is_match(&decoded) {
                        return None;
                    }
                    values.push(decoded.into_owned());
                }
            }
        }
        Some(values)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Serialized form: the raw pattern plus non-default constraints.
#[derive(Serialize, Deserialize)]
struct PatternRepr {
    raw: String,
    #[serde(default)]
    constraints: BTreeMap<String, String>,
}

impl From<PathPattern> for PatternRepr {
    fn from(pattern: PathPattern) -> Self {
        let constraints = pattern
            .segments
            .into_iter()
            .filter_map(|s| match s {
                Segment::Variable { name, source, .. } if source != DEFAULT_PARAMETER_REGEX => {
                    Some((name, source))
                }
                _ => None,
            })
            .collect();
        Self {
            raw: pattern.raw,
            constraints,
        }
    }
}

impl TryFrom<PatternRepr> for PathPattern {
    type Error = RouteError;

    fn try_from(repr: PatternRepr) -> Result<Self, Self::Error> {
        let mut pattern = PathPattern::parse(&repr.raw)?;
        for (name, source) in &repr.constraints {
            pattern.constrain(name, source)?;
        }
        Ok(pattern)
    }
}
