//! Build-verification check for ambiguous routes.
//!
//! Matching is first-match-wins in registration order, so a route can silently
//! shadow a later one. This check compares the shape of every pair of routes
//! with the same method: equal segment counts, and at each position either side
//! is a variable or both literals are equal. Regex constraints are ignored, so
//! two routes with disjoint constraints are still reported.

use std::borrow::Cow;

use super::{
    compiled::{CompiledAction, CompiledController, CompiledTable},
    pattern::Segment,
};

struct RouteShape<'a> {
    controller: &'a CompiledController,
    action: &'a CompiledAction,
    /// `None` marks a variable position
    segments: Vec<Option<Cow<'a, str>>>,
}

impl<'a> RouteShape<'a> {
    fn new(controller: &'a CompiledController, action: &'a CompiledAction) -> Self {
        let prefix = controller
            .prefix
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| Some(Cow::Borrowed(s)));
        let pattern = action.pattern.segments().iter().map(|segment| match segment {
            Segment::Literal(text) => Some(Cow::Borrowed(text.as_str())),
            Segment::Variable { .. } => None,
        });

        Self {
            controller,
            action,
            segments: prefix.chain(pattern).collect(),
        }
    }

    fn overlaps(&self, other: &RouteShape<'_>) -> bool {
        self.action.method == other.action.method
            && self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (Some(a), Some(b)) => a == b,
                    _ => true,
                })
    }

    fn describe(&self) -> String {
        format!(
            "{} /{} ({}::{})",
            self.action.method,
            self.controller.full_path(self.action),
            self.controller.name,
            self.action.name
        )
    }
}

/// Report every pair of routes that can match the same request.
pub fn diagnose(table: &CompiledTable) -> Vec<String> {
    let shapes: Vec<RouteShape<'_>> = table
        .routes()
        .map(|(controller, action)| RouteShape::new(controller, action))
        .collect();

    let mut conflicts = Vec::new();
    for (i, first) in shapes.iter().enumerate() {
        for second in shapes.iter().skip(i + 1) {
            if first.overlaps(second) {
                conflicts.push(format!(
                    "Route {} conflicts with {}",
                    first.describe(),
                    second.describe()
                ));
            }
        }
    }

    if !conflicts.is_empty() {
        tracing::debug!(count = conflicts.len(), "Route conflicts detected");
    }
    conflicts
}
