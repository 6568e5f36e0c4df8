//! Dependency resolution
//!
//! Expands suites into a topologically ordered execution plan.

use std::collections::HashSet;

use crate::error::{EntityKind, NotFoundError, ResolveError};
use crate::registry::SuiteRegistry;

/// Computes prerequisite order over a suite registry
pub struct DependencyResolver<'a> {
    suites: &'a SuiteRegistry,
}

#[derive(Default)]
struct Walk {
    in_progress: Vec<String>,
    done: HashSet<String>,
    order: Vec<String>,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(suites: &'a SuiteRegistry) -> Self {
        Self { suites }
    }

    /// Dependencies of `suite_id` in run order, ending with `suite_id` itself
    pub fn resolve(&self, suite_id: &str) -> Result<Vec<String>, ResolveError> {
        self.resolve_many(&[suite_id.to_string()])
    }

    /// Combined plan for several roots.
    ///
    /// Roots are expanded in the given order; the dependencies of one suite are
    /// visited in registration order. Each suite appears once.
    pub fn resolve_many(&self, roots: &[String]) -> Result<Vec<String>, ResolveError> {
        let mut walk = Walk::default();
        for root in roots {
            self.visit(root, &mut walk)?;
        }
        Ok(walk.order)
    }

    fn visit(&self, id: &str, walk: &mut Walk) -> Result<(), ResolveError> {
        if walk.done.contains(id) {
            return Ok(());
        }
        if let Some(pos) = walk.in_progress.iter().position(|n| n == id) {
            let mut path = walk.in_progress[pos..].to_vec();
            path.push(id.to_string());
            return Err(ResolveError::CyclicDependency { path });
        }

        let suite = self.suites.get(id)?;

        let mut deps: Vec<(usize, &str)> = Vec::with_capacity(suite.dependencies.len());
        for dep in &suite.dependencies {
            let position = self
                .suites
                .position(dep)
                .ok_or_else(|| NotFoundError::new(EntityKind::Suite, dep.as_str()))?;
            deps.push((position, dep.as_str()));
        }
        deps.sort_by_key(|(position, _)| *position);

        walk.in_progress.push(id.to_string());
        for (_, dep) in deps {
            self.visit(dep, walk)?;
        }
        walk.in_progress.pop();

        walk.done.insert(id.to_string());
        walk.order.push(id.to_string());
        Ok(())
    }
}
