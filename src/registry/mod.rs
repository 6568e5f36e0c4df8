//! Suite and pipeline registries
//!
//! Definitions are validated on registration and read-only afterwards.

mod pipelines;
mod suites;

pub use pipelines::PipelineRegistry;
pub use suites::SuiteRegistry;

use std::collections::{HashMap, HashSet};

use crate::error::RegistryError;
use crate::models::TestSuite;

/// Depth-first search for a cycle reachable from `start`.
///
/// Returns the cycle path (first and last element equal) if one exists.
pub(crate) fn find_cycle<'a, F>(start: &str, deps: F) -> Option<Vec<String>>
where
    F: Fn(&str) -> Option<&'a [String]>,
{
    fn visit<'a, F>(
        node: &str,
        deps: &F,
        in_progress: &mut Vec<String>,
        done: &mut HashSet<String>,
    ) -> Option<Vec<String>>
    where
        F: Fn(&str) -> Option<&'a [String]>,
    {
        if let Some(pos) = in_progress.iter().position(|n| n == node) {
            let mut path = in_progress[pos..].to_vec();
            path.push(node.to_string());
            return Some(path);
        }
        if done.contains(node) {
            return None;
        }

        in_progress.push(node.to_string());
        for dep in deps(node).unwrap_or(&[]) {
            if let Some(path) = visit(dep, deps, in_progress, done) {
                return Some(path);
            }
        }
        in_progress.pop();
        done.insert(node.to_string());
        None
    }

    visit(start, &deps, &mut Vec::new(), &mut HashSet::new())
}

/// Order declared suites so every dependency is registered before its dependents.
///
/// Declaration order is kept wherever dependencies allow. Dependencies may point
/// at suites already in `existing`.
pub fn order_for_registration(
    declared: Vec<TestSuite>,
    existing: &SuiteRegistry,
) -> Result<Vec<TestSuite>, RegistryError> {
    let mut index: HashMap<String, usize> = HashMap::new();
    for (i, suite) in declared.iter().enumerate() {
        if existing.contains(&suite.id) || index.insert(suite.id.clone(), i).is_some() {
            return Err(RegistryError::DuplicateSuite(suite.id.clone()));
        }
    }

    let mut order = Vec::with_capacity(declared.len());
    let mut done = vec![false; declared.len()];
    let mut stack: Vec<usize> = Vec::new();

    fn visit(
        i: usize,
        declared: &[TestSuite],
        index: &HashMap<String, usize>,
        existing: &SuiteRegistry,
        done: &mut [bool],
        stack: &mut Vec<usize>,
        order: &mut Vec<usize>,
    ) -> Result<(), RegistryError> {
        if done[i] {
            return Ok(());
        }
        if let Some(pos) = stack.iter().position(|&s| s == i) {
            let mut path: Vec<String> = stack[pos..]
                .iter()
                .map(|&s| declared[s].id.clone())
                .collect();
            path.push(declared[i].id.clone());
            return Err(RegistryError::CyclicDependency { path });
        }

        stack.push(i);
        for dep in &declared[i].dependencies {
            match index.get(dep) {
                Some(&d) => visit(d, declared, index, existing, done, stack, order)?,
                None if existing.contains(dep) => {}
                None => {
                    return Err(RegistryError::InvalidDependency {
                        suite: declared[i].id.clone(),
                        dependency: dep.clone(),
                    })
                }
            }
        }
        stack.pop();
        done[i] = true;
        order.push(i);
        Ok(())
    }

    for i in 0..declared.len() {
        visit(
            i,
            &declared,
            &index,
            existing,
            &mut done,
            &mut stack,
            &mut order,
        )?;
    }

    let mut slots: Vec<Option<TestSuite>> = declared.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
}
